use super::index::{Location, NodeItem, WordIndex, WordKey};
use super::sanitize::Patterns;
use super::tokenizer::WordBreaker;
use crate::book::tree::{DocumentTree, NodeId};
use crate::book::Book;
use crate::locale::{self, Locale};
use log::{debug, warn};

pub const OPF_NS: &str = "http://www.idpf.org/2007/opf";

/// Metadata elements whose text is checked. Matched on the local name only,
/// the same test a tag-name based highlighter can make without namespaces.
const OPF_SPELL_TAGS: &[&str] = &["title", "creator", "subject", "description", "publisher"];

const NCX_SPELL_TAGS: &[&str] = &["text"];

/// Content elements whose own text is never checked.
const HTML_SKIP_TAGS: &[&str] = &["script", "style", "link"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Metadata,
    Navigation,
    Content,
}

impl FileRole {
    pub fn of(book: &Book, name: &str) -> Self {
        if name == book.opf_name() {
            FileRole::Metadata
        } else if Some(name) == book.toc_name() {
            FileRole::Navigation
        } else {
            FileRole::Content
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckableFile {
    pub name: String,
    pub role: FileRole,
}

/// Spine documents, then the package document, then the NCX if it exists.
///
/// This order is the file order every word list is sorted by.
pub fn checkable_files(book: &Book) -> Vec<CheckableFile> {
    let mut names: Vec<&str> = book.spine_names().iter().map(String::as_str).collect();
    names.push(book.opf_name());
    if let Some(toc) = book.toc_name().filter(|toc| book.exists(toc)) {
        names.push(toc);
    }
    names
        .into_iter()
        .map(|name| CheckableFile {
            name: name.to_string(),
            role: FileRole::of(book, name),
        })
        .collect()
}

/// Collect every checkable word of `book`.
pub fn get_all_words<B>(book: &Book, book_locale: &Locale, patterns: &Patterns, breaker: &B) -> WordIndex
where
    B: WordBreaker + ?Sized,
{
    let mut index = WordIndex::default();

    for file in checkable_files(book) {
        let Some(tree) = book.parsed(&file.name) else {
            debug!("{} does not exist, skipping", file.name);
            continue;
        };
        let before = index.total;
        let mut walker = Walker {
            patterns,
            breaker,
            index: &mut index,
            file_name: &file.name,
            tree,
        };
        match file.role {
            FileRole::Metadata => walker.read_metadata(book_locale),
            FileRole::Navigation => walker.read_navigation(book_locale),
            FileRole::Content => walker.read_content(book_locale),
        }
        debug!("{}: {} words ({:?})", file.name, index.total - before, file.role);
    }

    index.sort_locations();
    index
}

struct Walker<'a, B: ?Sized> {
    patterns: &'a Patterns,
    breaker: &'a B,
    index: &'a mut WordIndex,
    file_name: &'a str,
    tree: &'a DocumentTree,
}

impl<B: WordBreaker + ?Sized> Walker<'_, B> {
    fn read_metadata(&mut self, book_locale: &Locale) {
        let tree = self.tree;
        for node in tree.descendants(tree.root()) {
            if tree.local_name(node).is_some_and(|n| OPF_SPELL_TAGS.contains(&n)) {
                self.add_text(node, book_locale);
            }
            if let Some(attr) = tree.attribute_ns(node, OPF_NS, "file-as") {
                if !attr.value.is_empty() {
                    self.add_words(&attr.value, node, book_locale, NodeItem::Attribute(attr.key.clone()));
                }
            }
        }
    }

    fn read_navigation(&mut self, book_locale: &Locale) {
        let tree = self.tree;
        let root = tree.root();
        for node in std::iter::once(root).chain(tree.descendants(root)) {
            if tree.local_name(node).is_some_and(|n| NCX_SPELL_TAGS.contains(&n)) {
                self.add_text(node, book_locale);
            }
        }
    }

    fn read_content(&mut self, book_locale: &Locale) {
        let tree = self.tree;
        let mut stack = vec![(tree.root(), book_locale.clone())];
        while let Some((node, parent_locale)) = stack.pop() {
            let locale = locale::resolve(tree, node, &parent_locale);
            self.read_content_tag(node, &parent_locale, &locale);
            stack.extend(tree.element_children(node).map(|child| (child, locale.clone())));
        }
    }

    fn read_content_tag(&mut self, node: NodeId, parent_locale: &Locale, locale: &Locale) {
        let tree = self.tree;
        let skipped = |id: NodeId| tree.local_name(id).is_some_and(|n| HTML_SKIP_TAGS.contains(&n));

        if !skipped(node) {
            self.add_text(node, locale);
        }
        for key in ["alt", "title"] {
            if let Some(value) = tree.attribute(node, key).filter(|v| !v.is_empty()) {
                self.add_words(value, node, locale, NodeItem::Attribute(key.to_string()));
            }
        }
        // Tail text belongs to the parent, so it takes the parent's language
        if let (Some(tail), Some(parent)) = (tree.tail(node), tree.parent(node)) {
            if !skipped(parent) {
                self.add_words(tail, node, parent_locale, NodeItem::Tail);
            }
        }
    }

    fn add_text(&mut self, node: NodeId, locale: &Locale) {
        let tree = self.tree;
        if let Some(text) = tree.text(node) {
            self.add_words(text, node, locale, NodeItem::Text);
        }
    }

    fn add_words(&mut self, text: &str, node: NodeId, locale: &Locale, item: NodeItem) {
        let candidates = match self.breaker.split_into_words(text, &locale.langcode) {
            Ok(words) => words,
            Err(e) => {
                warn!("{}:{}: {}", self.file_name, self.tree.sourceline(node), e);
                return;
            }
        };

        for word in candidates {
            if !self.patterns.is_checkable(&word) {
                continue;
            }
            let (stem, elided_prefix) = self.patterns.sanitize(&word, locale);
            // Checked again on the stem: digits split by a soft hyphen or a
            // zero width space are still digits, and are neither counted nor indexed
            if !self.patterns.is_checkable(&stem) {
                continue;
            }
            let location = Location {
                file_name: self.file_name.to_string(),
                sourceline: self.tree.sourceline(node),
                original_word: word,
                node,
                node_item: item.clone(),
                elided_prefix,
            };
            self.index.add(WordKey::new(stem, locale.clone()), location);
        }
    }
}
