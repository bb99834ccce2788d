use crate::checker::index::{Location, WordIndex, WordKey};
use crate::config::{Config, WordSort};
use anyhow::Result;
use colored::*;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonLocation {
    file: String,
    line: usize,
}

#[derive(Debug, Serialize)]
struct JsonWord {
    word: String,
    locale: String,
    count: usize,
    locations: Vec<JsonLocation>,
}

#[derive(Debug, Serialize)]
struct JsonOutput {
    book: String,
    total_words: usize,
    unique_words: usize,
    words: Vec<JsonWord>,
}

/// Word list entries in display order.
pub fn sorted_entries(index: &WordIndex, sort: WordSort) -> Vec<(&WordKey, &[Location])> {
    let mut entries: Vec<(&WordKey, &[Location])> = index
        .words
        .iter()
        .map(|(key, locations)| (key, locations.as_slice()))
        .collect();
    match sort {
        WordSort::Alpha => entries.sort_by(|(a, _), (b, _)| {
            a.word
                .to_lowercase()
                .cmp(&b.word.to_lowercase())
                .then_with(|| a.cmp(b))
        }),
        WordSort::Count => {
            entries.sort_by(|(a, la), (b, lb)| lb.len().cmp(&la.len()).then_with(|| a.cmp(b)))
        }
    }
    entries
}

/// `(file, line)` pairs with repeats on the same line collapsed.
pub fn distinct_lines(locations: &[Location]) -> Vec<(&str, usize)> {
    let mut seen = HashSet::new();
    locations
        .iter()
        .map(|l| (l.file_name.as_str(), l.sourceline))
        .filter(|pair| seen.insert(*pair))
        .collect()
}

pub fn print_words(
    book_path: &Path,
    index: &WordIndex,
    config: &Config,
    colored_output: bool,
    format: &OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Text => {
            print_text_words(book_path, index, config, colored_output);
            Ok(())
        }
        OutputFormat::Json => print_json_words(book_path, index, config),
    }
}

fn print_text_words(book_path: &Path, index: &WordIndex, config: &Config, colored_output: bool) {
    let book_name = book_path.display().to_string();
    if colored_output {
        println!("\n{}", book_name.bold().underline());
    } else {
        println!("\n{}", book_name);
    }

    for (key, locations) in sorted_entries(index, config.sort) {
        let locale = format!("[{}]", key.locale);
        if colored_output {
            println!(
                "  {} {} {}",
                key.word.bold(),
                locale.dimmed(),
                locations.len().to_string().blue()
            );
        } else {
            println!("  {} {} {}", key.word, locale, locations.len());
        }

        if config.show_locations {
            let lines = distinct_lines(locations);
            let mut shown = lines
                .iter()
                .take(config.max_locations)
                .map(|(file, line)| format!("{}:{}", file, line))
                .collect::<Vec<_>>()
                .join(", ");
            if lines.len() > config.max_locations {
                shown.push_str(&format!(" (+{} more)", lines.len() - config.max_locations));
            }
            if colored_output {
                println!("    {} {}", "→".dimmed(), shown.dimmed());
            } else {
                println!("    → {}", shown);
            }
        }
    }

    println!();
    let summary = format!(
        "{} {}, {} unique",
        index.total,
        if index.total == 1 { "word" } else { "words" },
        index.unique_words()
    );
    if colored_output {
        println!("{}", summary.green().bold());
    } else {
        println!("{}", summary);
    }
}

fn print_json_words(book_path: &Path, index: &WordIndex, config: &Config) -> Result<()> {
    let words = sorted_entries(index, config.sort)
        .into_iter()
        .map(|(key, locations)| JsonWord {
            word: key.word.clone(),
            locale: key.locale.to_string(),
            count: locations.len(),
            locations: distinct_lines(locations)
                .into_iter()
                .map(|(file, line)| JsonLocation {
                    file: file.to_string(),
                    line,
                })
                .collect(),
        })
        .collect();

    let output = JsonOutput {
        book: book_path.display().to_string(),
        total_words: index.total,
        unique_words: index.unique_words(),
        words,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn print_not_found(words: &[String], colored: bool) {
    let list = words.join(", ");
    if colored {
        println!("{} {}", "No occurrences of".yellow().bold(), list.yellow());
    } else {
        println!("No occurrences of {}", list);
    }
}

/// Report a finished replacement.
///
/// `replaced` holds only the locations whose text was rewritten, already
/// carrying the new word.
pub fn print_replace_summary(
    changed: &BTreeSet<String>,
    replaced: &[Location],
    dry_run: bool,
    colored: bool,
) {
    for loc in replaced {
        if colored {
            println!("  {} {}", "✓".green(), loc);
        } else {
            println!("  ✓ {}", loc);
        }
    }

    println!();
    if changed.is_empty() {
        if colored {
            println!("{}", "Nothing replaced, the book has changed since it was read.".yellow());
        } else {
            println!("Nothing replaced, the book has changed since it was read.");
        }
        return;
    }

    let verb = if dry_run { "would change" } else { "changed" };
    let file_word = if changed.len() == 1 { "file" } else { "files" };
    if colored {
        println!(
            "{} {} {} {}",
            "✓".green().bold(),
            verb,
            changed.len().to_string().green().bold(),
            file_word
        );
    } else {
        println!("✓ {} {} {}", verb, changed.len(), file_word);
    }
}
