//! Mutable, arena-backed XML tree.
//!
//! Nodes are addressed by [`NodeId`] handles that stay valid until the
//! document is parsed again. Each element carries the text that directly
//! follows its start tag (`text`) and the text that follows its end tag
//! (`tail`), so an edit to one run of text never disturbs markup around it.

use crate::error::{BookError, Result};
use quick_xml::escape::{partial_escape, resolve_html5_entity, resolve_predefined_entity};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Qualified name exactly as written, e.g. `opf:file-as`.
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        name: String,
        attributes: Vec<Attribute>,
        /// Written as `<name/>` in the source.
        self_closing: bool,
    },
    /// Comment or processing instruction, kept verbatim.
    Raw(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub sourceline: usize,
}

#[derive(Debug, Clone)]
pub struct DocumentTree {
    nodes: Vec<Node>,
    root: NodeId,
    prolog: String,
    epilogue: String,
}

/// Split a qualified name into its optional prefix and local part.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Byte offsets at which each line starts.
fn line_starts_of(text: &str) -> Vec<usize> {
    let mut starts = Vec::with_capacity(256);
    starts.push(0);
    for (i, b) in text.as_bytes().iter().enumerate() {
        if *b == b'\n' {
            starts.push(i + 1);
        }
    }
    starts
}

fn byte_pos_to_line(pos: usize, starts: &[usize]) -> usize {
    starts.partition_point(|&s| s <= pos).max(1)
}

#[derive(Clone, Copy)]
enum Cursor {
    Opened(NodeId),
    Closed(NodeId),
}

fn append(slot: &mut Option<String>, text: &str) {
    match slot {
        Some(existing) => existing.push_str(text),
        None => *slot = Some(text.to_string()),
    }
}

impl DocumentTree {
    /// Parse `xml`; `name` is only used in error messages.
    ///
    /// HTML named entities such as `&nbsp;` are resolved to their characters.
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        // The reader skips a byte order mark without counting it in its
        // offsets, so it is kept aside and offsets index the rest
        let (bom, xml) = match source.strip_prefix('\u{feff}') {
            Some(rest) => ("\u{feff}", rest),
            None => ("", source),
        };
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let line_starts = line_starts_of(xml);
        let xml_err = |position: usize, message: String| BookError::Xml {
            name: name.to_string(),
            position,
            message,
        };

        let mut nodes: Vec<Node> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut cursor: Option<Cursor> = None;
        let mut prolog_end = None;
        let mut epilogue_start = None;

        loop {
            let start = reader.buffer_position() as usize;
            let event = reader
                .read_event()
                .map_err(|e| xml_err(start, e.to_string()))?;
            let line = byte_pos_to_line(start, &line_starts);

            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    if epilogue_start.is_some() {
                        return Err(xml_err(start, "content after the root element".into()));
                    }
                    if stack.is_empty() {
                        prolog_end = Some(start);
                    }
                    let id = NodeId(nodes.len());
                    nodes.push(Node {
                        kind: NodeKind::Element {
                            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                            attributes: read_attributes(e).map_err(|m| xml_err(start, m))?,
                            self_closing: matches!(event, Event::Empty(_)),
                        },
                        text: None,
                        tail: None,
                        parent: stack.last().copied(),
                        children: Vec::new(),
                        sourceline: line,
                    });
                    if let Some(&parent) = stack.last() {
                        nodes[parent.0].children.push(id);
                    }
                    if matches!(event, Event::Start(_)) {
                        stack.push(id);
                        cursor = Some(Cursor::Opened(id));
                    } else {
                        cursor = Some(Cursor::Closed(id));
                        if stack.is_empty() {
                            epilogue_start = Some(reader.buffer_position() as usize);
                        }
                    }
                }
                Event::End(_) => {
                    let id = stack
                        .pop()
                        .ok_or_else(|| xml_err(start, "unbalanced end tag".into()))?;
                    cursor = Some(Cursor::Closed(id));
                    if stack.is_empty() {
                        epilogue_start = Some(reader.buffer_position() as usize);
                    }
                }
                Event::Text(e) => {
                    if !stack.is_empty() {
                        let text = e
                            .unescape_with(resolve_entity)
                            .map_err(|err| xml_err(start, err.to_string()))?;
                        push_text(&mut nodes, cursor, &text);
                    }
                }
                Event::CData(e) => {
                    if !stack.is_empty() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        push_text(&mut nodes, cursor, &text);
                    }
                }
                Event::Comment(_) | Event::PI(_) => {
                    if let Some(&parent) = stack.last() {
                        let end = reader.buffer_position() as usize;
                        let id = NodeId(nodes.len());
                        nodes.push(Node {
                            kind: NodeKind::Raw(xml[start..end].to_string()),
                            text: None,
                            tail: None,
                            parent: Some(parent),
                            children: Vec::new(),
                            sourceline: line,
                        });
                        nodes[parent.0].children.push(id);
                        cursor = Some(Cursor::Closed(id));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(xml_err(xml.len(), "unexpected end of document".into()));
        }
        let (Some(prolog_end), Some(epilogue_start)) = (prolog_end, epilogue_start) else {
            return Err(xml_err(0, "document has no root element".into()));
        };

        Ok(Self {
            nodes,
            root: NodeId(0),
            prolog: format!("{}{}", bom, &xml[..prolog_end]),
            epilogue: xml[epilogue_start..].to_string(),
        })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.node(id).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    /// Qualified element name as written; `None` for raw nodes.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id)?.kind {
            NodeKind::Element { name, .. } => Some(name),
            NodeKind::Raw(_) => None,
        }
    }

    /// Element name with any namespace prefix removed.
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.name(id).map(|n| split_qname(n).1)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id)?.parent
    }

    pub fn sourceline(&self, id: NodeId) -> usize {
        self.node(id).map_or(0, |n| n.sourceline)
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.node(id)?.text.as_deref()
    }

    pub fn tail(&self, id: NodeId) -> Option<&str> {
        self.node(id)?.tail.as_deref()
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.text = Some(text.into());
        }
    }

    pub fn set_tail(&mut self, id: NodeId, tail: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.tail = Some(tail.into());
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.node(id).map(|n| &n.kind) {
            Some(NodeKind::Element { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    /// Attribute looked up by its qualified name as written.
    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    /// First attribute whose prefix resolves to `namespace` and whose local name is `local`.
    pub fn attribute_ns(&self, id: NodeId, namespace: &str, local: &str) -> Option<&Attribute> {
        self.attributes(id).iter().find(|a| {
            let (prefix, name) = split_qname(&a.key);
            name == local
                && prefix.is_some_and(|p| p != "xmlns")
                && self.resolve_prefix(id, prefix) == Some(namespace)
        })
    }

    /// Set an existing attribute, or append it when missing.
    pub fn set_attribute(&mut self, id: NodeId, key: &str, value: impl Into<String>) {
        let Some(Node {
            kind: NodeKind::Element { attributes, .. },
            ..
        }) = self.nodes.get_mut(id.0)
        else {
            return;
        };
        let value = value.into();
        match attributes.iter_mut().find(|a| a.key == key) {
            Some(attr) => attr.value = value,
            None => attributes.push(Attribute {
                key: key.to_string(),
                value,
            }),
        }
    }

    /// Namespace URI bound to `prefix` (or the default namespace) at `id`.
    pub fn resolve_prefix(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(XML_NS);
        }
        let decl = match prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        let mut current = Some(id);
        while let Some(node) = current {
            if let Some(uri) = self.attribute(node, &decl) {
                return Some(uri);
            }
            current = self.parent(node);
        }
        None
    }

    /// Element children, in document order.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
    }

    /// Every element below `id` in document order, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.element_children(id).collect();
        stack.reverse();
        while let Some(next) = stack.pop() {
            out.push(next);
            let mut children: Vec<NodeId> = self.element_children(next).collect();
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Serialize the tree back to XML text.
    pub fn serialize(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.get_mut().extend_from_slice(self.prolog.as_bytes());
        self.write_node(&mut writer, self.root)
            .map_err(|message| BookError::Xml {
                name: String::new(),
                position: 0,
                message,
            })?;
        let mut bytes = writer.into_inner();
        bytes.extend_from_slice(self.epilogue.as_bytes());
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> std::result::Result<(), String> {
        let Some(node) = self.node(id) else {
            return Ok(());
        };
        match &node.kind {
            NodeKind::Raw(raw) => writer.get_mut().extend_from_slice(raw.as_bytes()),
            NodeKind::Element {
                name,
                attributes,
                self_closing,
            } => {
                let escaped: Vec<String> = attributes
                    .iter()
                    .map(|a| partial_escape(&a.value).replace('"', "&quot;"))
                    .collect();
                let start = BytesStart::new(name.as_str()).with_attributes(
                    attributes
                        .iter()
                        .zip(&escaped)
                        .map(|(a, v)| (a.key.as_bytes(), v.as_bytes())),
                );
                let has_text = node.text.as_deref().is_some_and(|t| !t.is_empty());
                if *self_closing && node.children.is_empty() && !has_text {
                    writer
                        .write_event(Event::Empty(start))
                        .map_err(|e| e.to_string())?;
                } else {
                    writer
                        .write_event(Event::Start(start))
                        .map_err(|e| e.to_string())?;
                    write_text(writer, node.text.as_deref())?;
                    for &child in &node.children {
                        self.write_node(writer, child)?;
                    }
                    writer
                        .write_event(Event::End(BytesEnd::new(name.as_str())))
                        .map_err(|e| e.to_string())?;
                }
            }
        }
        write_text(writer, node.tail.as_deref())
    }
}

fn write_text(writer: &mut Writer<Vec<u8>>, text: Option<&str>) -> std::result::Result<(), String> {
    match text {
        Some(t) if !t.is_empty() => writer
            .write_event(Event::Text(BytesText::from_escaped(partial_escape(t))))
            .map_err(|e| e.to_string()),
        _ => Ok(()),
    }
}

fn push_text(nodes: &mut [Node], cursor: Option<Cursor>, text: &str) {
    match cursor {
        Some(Cursor::Opened(id)) => append(&mut nodes[id.0].text, text),
        Some(Cursor::Closed(id)) => append(&mut nodes[id.0].tail, text),
        None => {}
    }
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    resolve_predefined_entity(entity).or_else(|| resolve_html5_entity(entity))
}

fn read_attributes(e: &BytesStart<'_>) -> std::result::Result<Vec<Attribute>, String> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        out.push(Attribute {
            key: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value: attr
                .unescape_value_with(resolve_entity)
                .map_err(|err| err.to_string())?
                .into_owned(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const XHTML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">
<body>
<p>Hello <b>bold</b> world<!-- note --> after</p>
<img alt="A picture" src="a.png"/>
</body>
</html>
"#;

    fn find(tree: &DocumentTree, local: &str) -> NodeId {
        tree.descendants(tree.root())
            .into_iter()
            .find(|&id| tree.local_name(id) == Some(local))
            .unwrap()
    }

    #[test]
    fn test_text_and_tail() {
        let tree = DocumentTree::parse("t.xhtml", XHTML).unwrap();
        let p = find(&tree, "p");
        let b = find(&tree, "b");
        assert_eq!(tree.text(p), Some("Hello "));
        assert_eq!(tree.text(b), Some("bold"));
        assert_eq!(tree.tail(b), Some(" world"));
        assert_eq!(tree.parent(b), Some(p));
    }

    #[test]
    fn test_comment_tail_is_not_parent_text() {
        let tree = DocumentTree::parse("t.xhtml", XHTML).unwrap();
        let p = find(&tree, "p");
        let comment = tree.node(p).unwrap().children[1];
        assert!(!tree.is_element(comment));
        assert_eq!(tree.tail(comment), Some(" after"));
        assert_eq!(tree.element_children(p).count(), 1);
    }

    #[test]
    fn test_source_lines() {
        let tree = DocumentTree::parse("t.xhtml", XHTML).unwrap();
        assert_eq!(tree.sourceline(tree.root()), 2);
        assert_eq!(tree.sourceline(find(&tree, "p")), 4);
        assert_eq!(tree.sourceline(find(&tree, "img")), 5);
    }

    #[test]
    fn test_namespaced_attributes() {
        let tree = DocumentTree::parse("t.xhtml", XHTML).unwrap();
        let root = tree.root();
        assert_eq!(tree.resolve_prefix(root, None), Some("http://www.w3.org/1999/xhtml"));
        let lang = tree.attribute_ns(root, XML_NS, "lang").unwrap();
        assert_eq!(lang.value, "en");
        assert_eq!(tree.attribute(find(&tree, "img"), "alt"), Some("A picture"));
    }

    #[test]
    fn test_serialize_preserves_document() {
        let tree = DocumentTree::parse("t.xhtml", XHTML).unwrap();
        assert_eq!(tree.serialize().unwrap(), XHTML);
    }

    #[test]
    fn test_edits_are_escaped() {
        let mut tree = DocumentTree::parse("t.xhtml", XHTML).unwrap();
        let b = find(&tree, "b");
        tree.set_text(b, "R&D");
        let img = find(&tree, "img");
        tree.set_attribute(img, "alt", "Another picture");
        let out = tree.serialize().unwrap();
        assert!(out.contains("<b>R&amp;D</b> world"));
        assert!(out.contains(r#"alt="Another picture""#));
    }

    #[test]
    fn test_apostrophes_stay_literal() {
        let mut tree = DocumentTree::parse("t.xhtml", r#"<p title="l'eau">l'arbre</p>"#).unwrap();
        let root = tree.root();
        tree.set_text(root, "l'chêne");
        assert_eq!(tree.serialize().unwrap(), r#"<p title="l'eau">l'chêne</p>"#);
    }

    #[test]
    fn test_empty_elements_keep_their_form() {
        let xml = r#"<body><a id="top"></a><br/><script src="x.js"></script></body>"#;
        let tree = DocumentTree::parse("t.xhtml", xml).unwrap();
        assert_eq!(tree.serialize().unwrap(), xml);
    }

    #[test]
    fn test_byte_order_mark() {
        let xml = "\u{feff}<?xml version=\"1.0\"?>\n<html><body>\n<p>Bom text</p><!-- c --></body></html>\n";
        let tree = DocumentTree::parse("t.xhtml", xml).unwrap();
        assert_eq!(tree.serialize().unwrap(), xml);
        let p = find(&tree, "p");
        assert_eq!(tree.sourceline(p), 3);
        assert_eq!(tree.sourceline(tree.root()), 2);
    }

    #[test]
    fn test_html_entities_are_resolved() {
        let xml = r#"<p title="a&nbsp;b &amp; c">Hello&nbsp;world &lt;3 &eacute;t&eacute;</p>"#;
        let tree = DocumentTree::parse("t.xhtml", xml).unwrap();
        let root = tree.root();
        assert_eq!(tree.text(root), Some("Hello\u{a0}world <3 été"));
        assert_eq!(tree.attribute(root, "title"), Some("a\u{a0}b & c"));
        assert!(DocumentTree::parse("t.xhtml", "<p>&bogus;</p>").is_err());
    }

    #[test]
    fn test_malformed_document() {
        assert!(DocumentTree::parse("bad.xhtml", "<html><body></html>").is_err());
        assert!(DocumentTree::parse("empty.xhtml", "   ").is_err());
    }

    #[test]
    fn test_stale_handle_reads_nothing() {
        let tree = DocumentTree::parse("t.xhtml", "<a>x</a>").unwrap();
        assert_eq!(tree.text(NodeId(42)), None);
    }
}
