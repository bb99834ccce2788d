use crate::locale::Locale;
use regex::Regex;

/// Compiled patterns used while extracting words.
///
/// Build once and share by reference for the whole pass.
#[derive(Debug, Clone)]
pub struct Patterns {
    invisible: Regex,
    digits: Regex,
    fr_elision: Regex,
}

impl Patterns {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            // Soft hyphen, zero width (non-)joiners and spaces, BOM, and C0/C1
            // controls other than tab, newline and carriage return.
            invisible: Regex::new(
                r"[\x{00ad}\x{200b}\x{200c}\x{200d}\x{feff}\x00-\x08\x0b\x0c\x0e-\x1f\x7f-\x{9f}]",
            )?,
            digits: Regex::new(r"^\d+$")?,
            fr_elision: Regex::new(r"(?i)^(?:lorsqu|puisqu|quoiqu|qu|l|d|m|t|s|j|c|ç)['’]")?,
        })
    }

    /// True if `word` is worth spell checking at all.
    pub fn is_checkable(&self, word: &str) -> bool {
        !word.is_empty() && !self.digits.is_match(word)
    }

    /// Reduce a raw token to its stem, returning `(stem, elided_prefix)`.
    ///
    /// French elisions such as `l'` or `qu’` are split off so that `l'arbre`
    /// and `arbre` share one entry; the prefix is kept verbatim so the
    /// original text can be rebuilt on replacement.
    pub fn sanitize(&self, raw: &str, locale: &Locale) -> (String, String) {
        let word = self.invisible.replace_all(raw, "").into_owned();
        if locale.is_french() {
            if let Some(m) = self.fr_elision.find(&word) {
                if m.end() < word.len() {
                    return (word[m.end()..].to_string(), m.as_str().to_string());
                }
            }
        }
        (word, String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locale::parse_lang_code;

    fn patterns() -> Patterns {
        Patterns::new().unwrap()
    }

    #[test]
    fn test_strips_invisible_characters() {
        let eng = parse_lang_code("en").unwrap();
        let (stem, prefix) = patterns().sanitize("co\u{ad}op\u{200b}er\u{feff}ate\u{7}", &eng);
        assert_eq!(stem, "cooperate");
        assert!(prefix.is_empty());
    }

    #[test]
    fn test_french_elision() {
        let fra = parse_lang_code("fra").unwrap();
        let p = patterns();
        assert_eq!(p.sanitize("l'arbre", &fra), ("arbre".into(), "l'".into()));
        assert_eq!(p.sanitize("L’Arbre", &fra), ("Arbre".into(), "L’".into()));
        assert_eq!(p.sanitize("lorsqu'il", &fra), ("il".into(), "lorsqu'".into()));
        assert_eq!(p.sanitize("Qu'est", &fra), ("est".into(), "Qu'".into()));
        assert_eq!(p.sanitize("ç'a", &fra), ("a".into(), "ç'".into()));
    }

    #[test]
    fn test_elision_only_for_french() {
        let eng = parse_lang_code("en").unwrap();
        assert_eq!(patterns().sanitize("l'arbre", &eng), ("l'arbre".into(), String::new()));
    }

    #[test]
    fn test_elision_needs_a_stem() {
        let fra = parse_lang_code("fr").unwrap();
        assert_eq!(patterns().sanitize("l'", &fra), ("l'".into(), String::new()));
        assert_eq!(patterns().sanitize("arbre", &fra), ("arbre".into(), String::new()));
    }

    #[test]
    fn test_is_checkable() {
        let p = patterns();
        assert!(!p.is_checkable(""));
        assert!(!p.is_checkable("1234"));
        assert!(!p.is_checkable("١٢٣"));
        assert!(p.is_checkable("1984s"));
        assert!(p.is_checkable("word"));
    }
}
