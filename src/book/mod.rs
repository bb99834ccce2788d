pub mod tree;

use crate::error::{BookError, Result};
use crate::locale::{parse_lang_code, Locale};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tree::{DocumentTree, NodeId};
use walkdir::WalkDir;

const CONTAINER_XML: &str = "META-INF/container.xml";
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// An e-book unpacked into memory: the package document (OPF), the spine
/// documents in reading order, and the NCX table of contents.
///
/// Only files that could be read and parsed exist as far as the book is
/// concerned; anything else was logged and dropped when the book was loaded.
#[derive(Debug)]
pub struct Book {
    root: Option<PathBuf>,
    opf_name: String,
    spine_names: Vec<String>,
    toc_name: Option<String>,
    language: Option<String>,
    trees: HashMap<String, DocumentTree>,
    dirty: BTreeSet<String>,
}

struct Package {
    spine_names: Vec<String>,
    toc_name: Option<String>,
    language: Option<String>,
}

impl Book {
    /// Load an unpacked book from `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let opf_name = find_opf_name(dir)?;
        let opf_path = dir.join(&opf_name);
        let opf_xml = fs::read_to_string(&opf_path).map_err(|e| BookError::io(&opf_path, e))?;

        Self::assemble(Some(dir.to_path_buf()), opf_name, &opf_xml, |name| {
            let path = dir.join(name);
            match fs::read_to_string(&path) {
                Ok(xml) => Some(xml),
                Err(e) => {
                    warn!("skipping {}: {}", path.display(), e);
                    None
                }
            }
        })
    }

    /// Build a book from in-memory `(name, xml)` documents.
    pub fn from_sources<N, X>(opf_name: &str, sources: impl IntoIterator<Item = (N, X)>) -> Result<Self>
    where
        N: Into<String>,
        X: Into<String>,
    {
        let mut sources: HashMap<String, String> = sources
            .into_iter()
            .map(|(n, x)| (n.into(), x.into()))
            .collect();
        let opf_xml = sources
            .remove(opf_name)
            .ok_or_else(|| BookError::UnknownFile(opf_name.to_string()))?;

        Self::assemble(None, opf_name.to_string(), &opf_xml, |name| sources.remove(name))
    }

    fn assemble(
        root: Option<PathBuf>,
        opf_name: String,
        opf_xml: &str,
        mut load: impl FnMut(&str) -> Option<String>,
    ) -> Result<Self> {
        let opf = DocumentTree::parse(&opf_name, opf_xml)?;
        let package = read_package(&opf, &opf_name);
        debug!(
            "package {}: {} spine items, toc {:?}",
            opf_name,
            package.spine_names.len(),
            package.toc_name
        );

        let mut trees = HashMap::new();
        let wanted = package.spine_names.iter().chain(package.toc_name.iter());
        for name in wanted {
            if trees.contains_key(name) || *name == opf_name {
                continue;
            }
            let Some(xml) = load(name) else {
                continue;
            };
            match DocumentTree::parse(name, &xml) {
                Ok(tree) => {
                    trees.insert(name.clone(), tree);
                }
                Err(e) => warn!("skipping {}: {}", name, e),
            }
        }
        trees.insert(opf_name.clone(), opf);

        Ok(Self {
            root,
            opf_name,
            spine_names: package.spine_names,
            toc_name: package.toc_name,
            language: package.language,
            trees,
            dirty: BTreeSet::new(),
        })
    }

    pub fn opf_name(&self) -> &str {
        &self.opf_name
    }

    /// Spine documents in reading order.
    pub fn spine_names(&self) -> &[String] {
        &self.spine_names
    }

    pub fn toc_name(&self) -> Option<&str> {
        self.toc_name.as_deref()
    }

    /// Raw language declared in the package metadata.
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// The declared book language, or `fallback` when it is missing or malformed.
    pub fn book_locale(&self, fallback: &Locale) -> Locale {
        self.language
            .as_deref()
            .and_then(|raw| parse_lang_code(raw).ok())
            .unwrap_or_else(|| fallback.clone())
    }

    pub fn exists(&self, name: &str) -> bool {
        self.trees.contains_key(name)
    }

    pub fn parsed(&self, name: &str) -> Option<&DocumentTree> {
        self.trees.get(name)
    }

    pub fn parsed_mut(&mut self, name: &str) -> Option<&mut DocumentTree> {
        self.trees.get_mut(name)
    }

    /// Set the text of one node, recording the file as changed.
    pub fn set_text(&mut self, name: &str, node: NodeId, text: &str) -> Result<()> {
        let tree = self
            .trees
            .get_mut(name)
            .ok_or_else(|| BookError::UnknownFile(name.to_string()))?;
        tree.set_text(node, text);
        self.mark_dirty(name);
        Ok(())
    }

    /// Record that the tree for `name` was edited and must be written back.
    pub fn mark_dirty(&mut self, name: &str) {
        if self.exists(name) {
            self.dirty.insert(name.to_string());
        }
    }

    pub fn dirty_names(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    pub fn serialize(&self, name: &str) -> Result<String> {
        self.parsed(name)
            .ok_or_else(|| BookError::UnknownFile(name.to_string()))?
            .serialize()
    }

    /// Write every edited file back under the book directory.
    ///
    /// Returns the names that were written. In-memory books only forget
    /// their pending edits. A file stays dirty until it has been written, so
    /// after an error the remaining edits can still be saved.
    pub fn save(&mut self) -> Result<Vec<String>> {
        let Some(root) = self.root.clone() else {
            return Ok(std::mem::take(&mut self.dirty).into_iter().collect());
        };
        let pending: Vec<String> = self.dirty.iter().cloned().collect();
        let mut saved = Vec::with_capacity(pending.len());
        for name in pending {
            let xml = self.serialize(&name)?;
            let path = root.join(&name);
            fs::write(&path, xml).map_err(|e| BookError::io(&path, e))?;
            info!("saved {}", path.display());
            self.dirty.remove(&name);
            saved.push(name);
        }
        Ok(saved)
    }
}

fn find_opf_name(dir: &Path) -> Result<String> {
    let container_path = dir.join(CONTAINER_XML);
    if let Ok(xml) = fs::read_to_string(&container_path) {
        match DocumentTree::parse(CONTAINER_XML, &xml) {
            Ok(tree) => {
                let rootfile = tree
                    .descendants(tree.root())
                    .into_iter()
                    .filter(|&id| tree.local_name(id) == Some("rootfile"))
                    .find_map(|id| tree.attribute(id, "full-path"));
                if let Some(path) = rootfile {
                    return Ok(normalize_name(path));
                }
            }
            Err(e) => warn!("ignoring {}: {}", container_path.display(), e),
        }
    }

    // No usable container.xml, take the first package document on disk
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .find(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("opf"))
        })
        .and_then(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| normalize_name(&p.to_string_lossy().replace('\\', "/")))
        })
        .ok_or_else(|| BookError::MissingPackage(dir.to_path_buf()))
}

fn read_package(opf: &DocumentTree, opf_name: &str) -> Package {
    let base = match opf_name.rfind('/') {
        Some(i) => &opf_name[..=i],
        None => "",
    };
    let elements = opf.descendants(opf.root());
    let named = |local| elements_named(opf, &elements, local);

    let mut manifest: HashMap<&str, (String, Option<&str>)> = HashMap::new();
    for item in named("item") {
        if let (Some(id), Some(href)) = (opf.attribute(item, "id"), opf.attribute(item, "href")) {
            let name = resolve_href(base, href);
            manifest.insert(id, (name, opf.attribute(item, "media-type")));
        }
    }

    let spine_names = named("itemref")
        .filter_map(|itemref| opf.attribute(itemref, "idref"))
        .filter_map(|idref| manifest.get(idref).map(|(name, _)| name.clone()))
        .collect();

    let toc_name = named("spine")
        .find_map(|spine| opf.attribute(spine, "toc"))
        .and_then(|id| manifest.get(id).map(|(name, _)| name.clone()))
        .or_else(|| {
            manifest
                .values()
                .filter(|(_, media_type)| *media_type == Some(NCX_MEDIA_TYPE))
                .map(|(name, _)| name.clone())
                .min()
        });

    let language = named("language")
        .find_map(|id| opf.text(id))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Package {
        spine_names,
        toc_name,
        language,
    }
}

fn elements_named<'t>(
    tree: &'t DocumentTree,
    elements: &'t [NodeId],
    local: &'t str,
) -> impl Iterator<Item = NodeId> + 't {
    elements
        .iter()
        .copied()
        .filter(move |&id| tree.local_name(id) == Some(local))
}

/// Resolve a manifest `href` against the directory of the package document.
fn resolve_href(base: &str, href: &str) -> String {
    let href = href.split('#').next().unwrap_or_default();
    normalize_name(&format!("{}{}", base, href))
}

fn normalize_name(name: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in name.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}
