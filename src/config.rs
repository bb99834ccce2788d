use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WordSort {
    #[default]
    Alpha,
    Count,
}

impl FromStr for WordSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alpha" => Ok(WordSort::Alpha),
            "count" => Ok(WordSort::Count),
            _ => Err(format!("Unknown sort order: {}", s)),
        }
    }
}

impl fmt::Display for WordSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordSort::Alpha => write!(f, "alpha"),
            WordSort::Count => write!(f, "count"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Language used when the book does not declare a valid one.
    pub language: String,
    /// Locations shown per word in text output.
    pub max_locations: usize,
    pub sort: WordSort,
    pub show_locations: bool,
}

/// One configuration file. Only the keys it sets override earlier layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub language: Option<String>,
    pub max_locations: Option<usize>,
    pub sort: Option<WordSort>,
    pub show_locations: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            max_locations: 5,
            sort: WordSort::Alpha,
            show_locations: false,
        }
    }
}

impl Config {
    /// Load configuration with priority: CLI args > local config > global config > defaults
    pub fn load(language: Option<String>, sort: Option<WordSort>, show_locations: bool) -> Result<Self> {
        let mut config = Self::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                config = config.merge(ConfigFile::from_file(&global_path)?);
            }
        }

        let local_path = PathBuf::from(".epubspell.toml");
        if local_path.exists() {
            config = config.merge(ConfigFile::from_file(&local_path)?);
        }

        if let Some(language) = language {
            config.language = language;
        }
        if let Some(sort) = sort {
            config.sort = sort;
        }
        if show_locations {
            config.show_locations = true;
        }

        Ok(config)
    }

    fn merge(mut self, file: ConfigFile) -> Self {
        if let Some(language) = file.language {
            self.language = language;
        }
        if let Some(max_locations) = file.max_locations {
            self.max_locations = max_locations;
        }
        if let Some(sort) = file.sort {
            self.sort = sort;
        }
        if let Some(show_locations) = file.show_locations {
            self.show_locations = show_locations;
        }
        self
    }

    pub fn global_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "epubspell").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

impl ConfigFile {
    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn file(contents: &str) -> ConfigFile {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).unwrap();
        ConfigFile::from_file(&path).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.max_locations, 5);
        assert_eq!(config.sort, WordSort::Alpha);
        assert!(!config.show_locations);
    }

    #[test]
    fn test_merge_configs() {
        let merged = Config::default()
            .merge(file("max_locations = 9\n"))
            .merge(file("language = \"fr\"\nsort = \"count\"\n"));
        assert_eq!(merged.language, "fr");
        assert_eq!(merged.sort, WordSort::Count);
        assert_eq!(merged.max_locations, 9);
    }

    #[test]
    fn test_local_file_can_restore_defaults() {
        let global = file("sort = \"count\"\nshow_locations = true\nmax_locations = 2\n");
        let local = file("sort = \"alpha\"\nshow_locations = false\nmax_locations = 5\n");
        let merged = Config::default().merge(global).merge(local);
        assert_eq!(merged, Config::default());
    }

    #[test]
    fn test_from_file_partial() {
        let partial = file("sort = \"count\"\nmax_locations = 2\n");
        assert_eq!(partial.language, None);
        assert_eq!(partial.show_locations, None);

        let config = Config::default().merge(partial);
        assert_eq!(config.language, "en");
        assert_eq!(config.sort, WordSort::Count);
        assert_eq!(config.max_locations, 2);
    }

    #[test]
    fn test_from_file_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "sort = \"sideways\"").unwrap();
        assert!(ConfigFile::from_file(&path).is_err());
    }
}
