use crate::book::tree::NodeId;
use crate::locale::Locale;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Which run of text on a node a word was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeItem {
    /// Text between the start tag and the first child.
    Text,
    /// Text after the end tag, owned by the parent element.
    Tail,
    /// Attribute value, keyed by its qualified name as written.
    Attribute(String),
}

impl NodeItem {
    pub fn is_attribute(&self) -> bool {
        matches!(self, NodeItem::Attribute(_))
    }
}

/// One occurrence of a word in one file.
///
/// `node` is a handle into the file's tree; it is only meaningful until that
/// file is parsed again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file_name: String,
    pub sourceline: usize,
    pub original_word: String,
    pub node: NodeId,
    pub node_item: NodeItem,
    pub elided_prefix: String,
}

impl Location {
    /// Record that this occurrence now reads `new_word`, keeping any elided prefix.
    pub fn replace(&mut self, new_word: &str) {
        self.original_word = format!("{}{}", self.elided_prefix, new_word);
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}:{}", self.original_word, self.file_name, self.sourceline)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordKey {
    pub word: String,
    pub locale: Locale,
}

impl WordKey {
    pub fn new(word: impl Into<String>, locale: Locale) -> Self {
        Self {
            word: word.into(),
            locale,
        }
    }
}

/// Every checkable word of a book, grouped by stem and language.
#[derive(Debug, Clone, Default)]
pub struct WordIndex {
    /// Words seen across all files, before grouping.
    pub total: usize,
    pub words: BTreeMap<WordKey, Vec<Location>>,
}

impl WordIndex {
    pub fn add(&mut self, key: WordKey, location: Location) {
        self.words.entry(key).or_default().push(location);
        self.total += 1;
    }

    pub fn get(&self, key: &WordKey) -> Option<&[Location]> {
        self.words.get(key).map(Vec::as_slice)
    }

    pub fn unique_words(&self) -> usize {
        self.words.len()
    }

    /// Put every word's locations into [`group_sort`] order.
    pub fn sort_locations(&mut self) {
        for locations in self.words.values_mut() {
            let sorted = group_sort(std::mem::take(locations));
            *locations = sorted;
        }
    }

    /// Locations of several words combined into one ordered list.
    pub fn merged<'a>(&self, keys: impl IntoIterator<Item = &'a WordKey>) -> Vec<Location> {
        keys.into_iter()
            .filter_map(|key| self.get(key))
            .fold(Vec::new(), |acc, locations| {
                merge_locations(acc, locations.to_vec())
            })
    }
}

/// Order locations by file, then by line.
///
/// Files rank in the order they are first seen in `locations` itself, so
/// lists built independently must be merged before sorting, never after.
pub fn group_sort(mut locations: Vec<Location>) -> Vec<Location> {
    let mut order: HashMap<String, usize> = HashMap::new();
    for loc in &locations {
        let next = order.len();
        order.entry(loc.file_name.clone()).or_insert(next);
    }
    locations.sort_by_key(|loc| (order[&loc.file_name], loc.sourceline));
    locations
}

pub fn merge_locations(mut first: Vec<Location>, second: Vec<Location>) -> Vec<Location> {
    first.extend(second);
    group_sort(first)
}
