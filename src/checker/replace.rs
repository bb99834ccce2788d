use super::index::{Location, NodeItem};
use super::tokenizer::WordBreaker;
use crate::book::tree::{DocumentTree, NodeId};
use crate::book::Book;
use crate::locale::Locale;
use log::debug;
use std::collections::BTreeSet;

/// Replace every whole-word occurrence of `original` in `text` with `new_word`.
///
/// Matches are found left to right without overlap and the text is never
/// rescanned after a substitution, so rewriting from the last match back to
/// the first keeps every earlier offset valid. Returns `None` when there is
/// no match.
pub fn replace_in_text<B>(text: &str, original: &str, new_word: &str, language: &str, breaker: &B) -> Option<String>
where
    B: WordBreaker + ?Sized,
{
    let mut indices = Vec::new();
    let mut offset = 0;
    while let Some(idx) = breaker.index_of(original, &text[offset..], language) {
        indices.push(offset + idx);
        offset += idx + original.len();
    }
    if indices.is_empty() {
        return None;
    }

    let mut out = text.to_string();
    for idx in indices.into_iter().rev() {
        out.replace_range(idx..idx + original.len(), new_word);
    }
    Some(out)
}

fn field<'t>(tree: &'t DocumentTree, node: NodeId, item: &NodeItem) -> Option<&'t str> {
    match item {
        NodeItem::Text => tree.text(node),
        NodeItem::Tail => tree.tail(node),
        NodeItem::Attribute(key) => tree.attribute(node, key),
    }
}

fn set_field(tree: &mut DocumentTree, node: NodeId, item: &NodeItem, value: String) {
    match item {
        NodeItem::Text => tree.set_text(node, value),
        NodeItem::Tail => tree.set_tail(node, value),
        NodeItem::Attribute(key) => tree.set_attribute(node, key, value),
    }
}

/// Rewrite the word at each of `locations` to `new_word`.
///
/// A location whose text no longer contains its word is skipped. Returns
/// the names of the files that changed; they are marked dirty in `book`.
/// The locations themselves are left untouched.
pub fn replace_word<B>(book: &mut Book, new_word: &str, locations: &[Location], locale: &Locale, breaker: &B) -> BTreeSet<String>
where
    B: WordBreaker + ?Sized,
{
    replace_each(book, new_word, locations, locale, breaker)
        .into_iter()
        .zip(locations)
        .filter(|(rewritten, _)| *rewritten)
        .map(|(_, loc)| loc.file_name.clone())
        .collect()
}

/// Same as [`replace_word`], reporting for each location whether its text
/// was rewritten.
///
/// A location reads `false` when its text has changed since extraction, or
/// when an earlier location on the same text already replaced its word.
pub fn replace_each<B>(book: &mut Book, new_word: &str, locations: &[Location], locale: &Locale, breaker: &B) -> Vec<bool>
where
    B: WordBreaker + ?Sized,
{
    locations
        .iter()
        .map(|loc| replace_one(book, new_word, loc, locale, breaker))
        .collect()
}

fn replace_one<B>(book: &mut Book, new_word: &str, loc: &Location, locale: &Locale, breaker: &B) -> bool
where
    B: WordBreaker + ?Sized,
{
    let Some(tree) = book.parsed_mut(&loc.file_name) else {
        debug!("{} is gone, skipping {}", loc.file_name, loc);
        return false;
    };
    let Some(text) = field(tree, loc.node, &loc.node_item) else {
        debug!("no text left for {}", loc);
        return false;
    };
    let replacement = format!("{}{}", loc.elided_prefix, new_word);
    let Some(text) = replace_in_text(text, &loc.original_word, &replacement, &locale.langcode, breaker) else {
        debug!("{} no longer found", loc);
        return false;
    };
    set_field(tree, loc.node, &loc.node_item, text);
    book.mark_dirty(&loc.file_name);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::tests::sample_book;
    use crate::checker::extract::get_all_words;
    use crate::checker::index::{WordIndex, WordKey};
    use crate::checker::sanitize::Patterns;
    use crate::checker::tokenizer::UnicodeWordBreaker;
    use crate::locale::parse_lang_code;

    const B: UnicodeWordBreaker = UnicodeWordBreaker;

    fn extract(book: &Book) -> WordIndex {
        let eng = parse_lang_code("en").unwrap();
        get_all_words(book, &eng, &Patterns::new().unwrap(), &B)
    }

    fn key(word: &str, lang: &str) -> WordKey {
        WordKey::new(word, parse_lang_code(lang).unwrap())
    }

    #[test]
    fn test_replace_every_occurrence() {
        let out = replace_in_text("cat cat dog cat", "cat", "feline", "eng", &B);
        assert_eq!(out.as_deref(), Some("feline feline dog feline"));
    }

    #[test]
    fn test_replacement_is_not_rescanned() {
        let out = replace_in_text("cat, cat", "cat", "cat cat", "eng", &B);
        assert_eq!(out.as_deref(), Some("cat cat, cat cat"));
    }

    #[test]
    fn test_replace_whole_words_only() {
        assert_eq!(replace_in_text("concatenate", "cat", "dog", "eng", &B), None);
        assert_eq!(replace_in_text("Cat", "cat", "dog", "eng", &B), None);
        assert_eq!(
            replace_in_text("café, cafés, café", "café", "bar", "fra", &B).as_deref(),
            Some("bar, cafés, bar")
        );
    }

    #[test]
    fn test_replace_french_elision() {
        let mut book = sample_book();
        let index = extract(&book);
        let fra = parse_lang_code("fra").unwrap();
        let locations = index.get(&key("arbre", "fr")).unwrap();

        let changed = replace_word(&mut book, "chêne", locations, &fra, &B);
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), ["OEBPS/text/B.html"]);
        let xml = book.serialize("OEBPS/text/B.html").unwrap();
        assert!(xml.contains("<p>Voir l'chêne.</p>"));
        assert_eq!(book.dirty_names().collect::<Vec<_>>(), ["OEBPS/text/B.html"]);
    }

    #[test]
    fn test_replace_across_files() {
        let mut book = sample_book();
        let index = extract(&book);
        let eng = parse_lang_code("en").unwrap();
        let locations = index.get(&key("cat", "en")).unwrap();
        assert_eq!(locations.len(), 3);

        let changed = replace_word(&mut book, "dog", locations, &eng, &B);
        assert_eq!(changed.len(), 2);
        assert!(book
            .serialize("OEBPS/text/B.html")
            .unwrap()
            .contains("A dog and another dog."));
        assert!(book.serialize("OEBPS/text/A.html").unwrap().contains("The dog sat."));

        let again = extract(&book);
        assert!(again.get(&key("cat", "en")).is_none());
        assert_eq!(again.get(&key("dog", "en")).unwrap().len(), 3);
        assert_eq!(again.total, index.total);
    }

    #[test]
    fn test_replace_attribute() {
        let mut book = sample_book();
        let index = extract(&book);
        let eng = parse_lang_code("en").unwrap();
        let locations: Vec<_> = index
            .get(&key("Gardener", "en"))
            .unwrap()
            .iter()
            .filter(|l| l.node_item.is_attribute())
            .cloned()
            .collect();

        let changed = replace_word(&mut book, "Gärtner", &locations, &eng, &B);
        assert_eq!(changed.into_iter().collect::<Vec<_>>(), ["OEBPS/content.opf"]);
        let opf = book.serialize("OEBPS/content.opf").unwrap();
        assert!(opf.contains(r#"opf:file-as="Gärtner, Anna">Anna Gardener<"#));
    }

    #[test]
    fn test_stale_location_is_skipped() {
        let mut book = sample_book();
        let index = extract(&book);
        let eng = parse_lang_code("en").unwrap();
        let locations = index.get(&key("sat", "en")).unwrap().to_vec();

        book.set_text("OEBPS/text/A.html", locations[0].node, "Rewritten elsewhere.")
            .unwrap();
        book.save().unwrap();

        let changed = replace_word(&mut book, "stood", &locations, &eng, &B);
        assert!(changed.is_empty());
        assert_eq!(book.dirty_names().count(), 0);
    }

    #[test]
    fn test_replace_each_reports_every_location() {
        let mut book = sample_book();
        let index = extract(&book);
        let eng = parse_lang_code("en").unwrap();
        let locations = index.get(&key("cat", "en")).unwrap();

        // the first B.html location rewrites both cats of its paragraph
        let outcomes = replace_each(&mut book, "dog", locations, &eng, &B);
        assert_eq!(outcomes, vec![true, false, true]);

        let again = replace_each(&mut book, "dog", locations, &eng, &B);
        assert_eq!(again, vec![false, false, false]);
    }

    #[test]
    fn test_locations_are_not_updated() {
        let mut book = sample_book();
        let index = extract(&book);
        let eng = parse_lang_code("en").unwrap();
        let locations = index.get(&key("sat", "en")).unwrap().to_vec();
        replace_word(&mut book, "stood", &locations, &eng, &B);
        assert_eq!(locations[0].original_word, "sat");
    }
}
