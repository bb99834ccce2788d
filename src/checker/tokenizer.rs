// Word boundary detection shared by extraction and replacement, so a word
// found by one is always findable by the other.

use std::collections::HashSet;
use std::iter;
use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Error)]
#[error("cannot split text into words for language {language}: {reason}")]
pub struct BreakError {
    pub language: String,
    pub reason: String,
}

pub trait WordBreaker {
    /// Split `text` into raw word tokens, keeping every character of each token.
    fn split_into_words(&self, text: &str, language: &str) -> Result<Vec<String>, BreakError>;

    /// Byte offset of the first occurrence of `needle` in `haystack` that
    /// starts and ends on a word boundary. Matching is case-exact.
    fn index_of(&self, needle: &str, haystack: &str, language: &str) -> Option<usize>;
}

/// Unicode (UAX #29) word boundaries.
///
/// Apostrophes between letters do not break a word, so `l'arbre` stays one
/// token, and format characters such as the soft hyphen stay inside it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeWordBreaker;

impl WordBreaker for UnicodeWordBreaker {
    fn split_into_words(&self, text: &str, _language: &str) -> Result<Vec<String>, BreakError> {
        Ok(text.unicode_words().map(str::to_string).collect())
    }

    fn index_of(&self, needle: &str, haystack: &str, _language: &str) -> Option<usize> {
        if needle.is_empty() {
            return None;
        }
        let bounds: HashSet<usize> = haystack
            .split_word_bound_indices()
            .map(|(i, _)| i)
            .chain(iter::once(haystack.len()))
            .collect();

        haystack
            .match_indices(needle)
            .map(|(i, _)| i)
            .find(|&i| bounds.contains(&i) && bounds.contains(&(i + needle.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_into_words() {
        let words = UnicodeWordBreaker
            .split_into_words("Hello, world! It's 1984.", "eng")
            .unwrap();
        assert_eq!(words, vec!["Hello", "world", "It's", "1984"]);
    }

    #[test]
    fn test_elided_word_is_one_token() {
        let words = UnicodeWordBreaker
            .split_into_words("Voir l'arbre et l’eau", "fra")
            .unwrap();
        assert_eq!(words, vec!["Voir", "l'arbre", "et", "l’eau"]);
    }

    #[test]
    fn test_soft_hyphen_stays_inside_word() {
        let words = UnicodeWordBreaker
            .split_into_words("co\u{ad}operate now", "eng")
            .unwrap();
        assert_eq!(words, vec!["co\u{ad}operate", "now"]);
    }

    #[test]
    fn test_empty_text() {
        assert!(UnicodeWordBreaker.split_into_words("", "eng").unwrap().is_empty());
    }

    #[test]
    fn test_index_of_respects_word_boundaries() {
        let b = UnicodeWordBreaker;
        assert_eq!(b.index_of("cat", "category cat", "eng"), Some(9));
        assert_eq!(b.index_of("cat", "concat", "eng"), None);
        assert_eq!(b.index_of("Cat", "cat", "eng"), None);
        assert_eq!(b.index_of("", "cat", "eng"), None);
        assert_eq!(b.index_of("l'arbre", "voir l'arbre.", "fra"), Some(5));
    }
}
