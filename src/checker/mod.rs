pub mod extract;
pub mod index;
pub mod replace;
pub mod sanitize;
pub mod tokenizer;

use crate::book::Book;
use crate::locale::Locale;
use anyhow::{Context, Result};
use index::{Location, WordIndex, WordKey};
use sanitize::Patterns;
use std::collections::BTreeSet;
use tokenizer::{UnicodeWordBreaker, WordBreaker};

/// Word extraction and replacement over one book, with the patterns and
/// word breaker shared by both directions.
pub struct SpellChecker<B = UnicodeWordBreaker> {
    patterns: Patterns,
    breaker: B,
}

impl SpellChecker<UnicodeWordBreaker> {
    pub fn new() -> Result<Self> {
        Self::with_breaker(UnicodeWordBreaker)
    }
}

impl<B: WordBreaker> SpellChecker<B> {
    pub fn with_breaker(breaker: B) -> Result<Self> {
        let patterns = Patterns::new().context("Failed to compile word patterns")?;
        Ok(Self { patterns, breaker })
    }

    pub fn patterns(&self) -> &Patterns {
        &self.patterns
    }

    /// Index every checkable word of `book`. Run again after any edit.
    pub fn get_all_words(&self, book: &Book, book_locale: &Locale) -> WordIndex {
        extract::get_all_words(book, book_locale, &self.patterns, &self.breaker)
    }

    /// The index key a word typed by the user is filed under.
    pub fn word_key(&self, word: &str, locale: &Locale) -> WordKey {
        let (stem, _) = self.patterns.sanitize(word.trim(), locale);
        WordKey::new(stem, locale.clone())
    }

    pub fn replace_word(
        &self,
        book: &mut Book,
        new_word: &str,
        locations: &[Location],
        locale: &Locale,
    ) -> BTreeSet<String> {
        replace::replace_word(book, new_word, locations, locale, &self.breaker)
    }

    /// Like [`SpellChecker::replace_word`], with one outcome per location.
    pub fn replace_each(
        &self,
        book: &mut Book,
        new_word: &str,
        locations: &[Location],
        locale: &Locale,
    ) -> Vec<bool> {
        replace::replace_each(book, new_word, locations, locale, &self.breaker)
    }
}
