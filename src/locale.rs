//! Language tags and per-node language resolution.

use crate::book::tree::{DocumentTree, NodeId, XML_NS};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use unic_langid::LanguageIdentifier;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid language code: {0:?}")]
pub struct LocaleError(pub String);

/// A language with optional script and region.
///
/// The language is always the three-letter ISO 639-2/T code (`fra`, `eng`),
/// so `fr`, `fre` and `fra` all compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Locale {
    pub langcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countrycode: Option<String>,
}

impl Locale {
    pub fn is_french(&self) -> bool {
        self.langcode == "fra"
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.langcode)?;
        if let Some(script) = &self.script {
            write!(f, "-{}", script)?;
        }
        if let Some(country) = &self.countrycode {
            write!(f, "-{}", country)?;
        }
        Ok(())
    }
}

impl FromStr for Locale {
    type Err = LocaleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_lang_code(s)
    }
}

/// Parse a language tag such as `fr`, `en_US`, `sr-Latn-RS` or `fra`.
pub fn parse_lang_code(raw: &str) -> Result<Locale, LocaleError> {
    let candidate = raw.trim().replace('_', "-");
    if candidate.is_empty() {
        return Err(LocaleError(raw.to_string()));
    }
    let id = LanguageIdentifier::from_str(&candidate).map_err(|_| LocaleError(raw.to_string()))?;
    let language = id.language.as_str();
    if language == "und" {
        return Err(LocaleError(raw.to_string()));
    }

    Ok(Locale {
        langcode: canonical_langcode(language),
        script: id.script.map(|s| s.as_str().to_string()),
        countrycode: id.region.map(|r| r.as_str().to_string()),
    })
}

fn canonical_langcode(code: &str) -> String {
    let code = code.to_ascii_lowercase();
    let mapped = match code.len() {
        2 => ISO639_1.iter().find(|(two, _)| *two == code).map(|(_, three)| *three),
        3 => BIBLIOGRAPHIC
            .iter()
            .find(|(b, _)| *b == code)
            .map(|(_, t)| *t),
        _ => None,
    };
    mapped.map(str::to_string).unwrap_or(code)
}

const ISO639_1: &[(&str, &str)] = &[
    ("af", "afr"), ("ar", "ara"), ("be", "bel"), ("bg", "bul"), ("bn", "ben"),
    ("bo", "bod"), ("br", "bre"), ("ca", "cat"), ("cs", "ces"), ("cy", "cym"),
    ("da", "dan"), ("de", "deu"), ("el", "ell"), ("en", "eng"), ("eo", "epo"),
    ("es", "spa"), ("et", "est"), ("eu", "eus"), ("fa", "fas"), ("fi", "fin"),
    ("fo", "fao"), ("fr", "fra"), ("ga", "gle"), ("gd", "gla"), ("gl", "glg"),
    ("gu", "guj"), ("he", "heb"), ("hi", "hin"), ("hr", "hrv"), ("hu", "hun"),
    ("hy", "hye"), ("id", "ind"), ("is", "isl"), ("it", "ita"), ("ja", "jpn"),
    ("ka", "kat"), ("kk", "kaz"), ("ko", "kor"), ("la", "lat"), ("lt", "lit"),
    ("lv", "lav"), ("mk", "mkd"), ("ml", "mal"), ("mr", "mar"), ("ms", "msa"),
    ("mt", "mlt"), ("nb", "nob"), ("nl", "nld"), ("nn", "nno"), ("no", "nor"),
    ("oc", "oci"), ("pa", "pan"), ("pl", "pol"), ("pt", "por"), ("ro", "ron"),
    ("ru", "rus"), ("sk", "slk"), ("sl", "slv"), ("sq", "sqi"), ("sr", "srp"),
    ("sv", "swe"), ("sw", "swa"), ("ta", "tam"), ("te", "tel"), ("th", "tha"),
    ("tr", "tur"), ("uk", "ukr"), ("ur", "urd"), ("vi", "vie"), ("yi", "yid"),
    ("zh", "zho"),
];

const BIBLIOGRAPHIC: &[(&str, &str)] = &[
    ("alb", "sqi"), ("arm", "hye"), ("baq", "eus"), ("bur", "mya"), ("chi", "zho"),
    ("cze", "ces"), ("dut", "nld"), ("fre", "fra"), ("geo", "kat"), ("ger", "deu"),
    ("gre", "ell"), ("ice", "isl"), ("mac", "mkd"), ("mao", "mri"), ("may", "msa"),
    ("per", "fas"), ("rum", "ron"), ("slo", "slk"), ("tib", "bod"), ("wel", "cym"),
];

/// Language declared directly on `node`, if any.
///
/// A plain `lang` attribute wins over `xml:lang`; a value that does not
/// parse counts as absent.
pub fn locale_from_node(tree: &DocumentTree, node: NodeId) -> Option<Locale> {
    let plain = tree.attribute(node, "lang");
    let xml = tree.attribute_ns(node, XML_NS, "lang").map(|a| a.value.as_str());
    [plain, xml]
        .into_iter()
        .flatten()
        .find_map(|value| parse_lang_code(value).ok())
}

/// Effective language of the text owned by `node`.
pub fn resolve(tree: &DocumentTree, node: NodeId, inherited: &Locale) -> Locale {
    locale_from_node(tree, node).unwrap_or_else(|| inherited.clone())
}
