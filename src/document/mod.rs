//! Program Document Tree
//!
//! An arena-backed XML element tree. Nodes are addressed by [`NodeId`] and
//! never move; detaching a node only unlinks it from its parent, so handles
//! held by higher layers stay valid (but report `is_attached() == false`).

mod reader;
mod writer;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConverterError, Result};

/// Handle to an element inside a [`Document`].
///
/// A `NodeId` is only valid in the document that created it. Passing it to
/// another document (a [`Templates`](crate::program::Templates) document,
/// say) panics or addresses an unrelated node; copy nodes across with
/// [`Document::import`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Text payload of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeText {
    Plain(String),
    CData(String),
}

impl NodeText {
    pub fn as_str(&self) -> &str {
        match self {
            NodeText::Plain(text) | NodeText::CData(text) => text,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    text: Option<NodeText>,
}

impl Node {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            parent: None,
            text: None,
        }
    }
}

/// A parsed XML document.
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    nodes: Vec<Node>,
    root: NodeId,
    has_declaration: bool,
}

impl Document {
    /// Create a document holding a single empty root element.
    pub fn new(root_name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            nodes: vec![Node::new(root_name)],
            root: NodeId(0),
            has_declaration: true,
        }
    }

    /// Parse a document from text. `path` is used for error reporting.
    pub fn parse(xml: &str, path: impl Into<PathBuf>) -> Result<Self> {
        reader::parse(xml, path.into())
    }

    /// Read and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConverterError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| ConverterError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Serialize the document to indented XML text.
    pub fn to_xml_string(&self) -> Result<String> {
        writer::write(self)
    }

    /// Write the document to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = self.to_xml_string()?;
        fs::write(path, content).map_err(|e| ConverterError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// First direct child with the given element name.
    pub fn child_named(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&child| self.name(child) == name)
    }

    /// All direct children with the given element name.
    pub fn children_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&child| self.name(child) == name)
            .collect()
    }

    /// Direct child that must exist.
    pub fn required_child(&self, id: NodeId, name: &str) -> Result<NodeId> {
        self.child_named(id, name)
            .ok_or_else(|| ConverterError::MissingElement {
                element: name.to_string(),
                parent: self.name(id).to_string(),
                path: self.path.clone(),
            })
    }

    /// All descendants of `id` (excluding `id`) in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            result.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        result
    }

    /// All descendants with the given element name, in document order.
    pub fn descendants_named(&self, id: NodeId, name: &str) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|&node| self.name(node) == name)
            .collect()
    }

    /// Whether the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == self.root {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    // === Attributes ===

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.nodes[id.0]
            .attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value that must be present.
    pub fn required_attribute(&self, id: NodeId, name: &str) -> Result<&str> {
        self.attribute(id, name)
            .ok_or_else(|| ConverterError::MissingAttribute {
                element: self.name(id).to_string(),
                attribute: name.to_string(),
                path: self.path.clone(),
            })
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let attributes = &mut self.nodes[id.0].attributes;
        match attributes.iter_mut().find(|(key, _)| key == name) {
            Some((_, existing)) => *existing = value,
            None => attributes.push((name.to_string(), value)),
        }
    }

    pub fn int_attribute(&self, id: NodeId, name: &str) -> Result<i64> {
        let raw = self.required_attribute(id, name)?;
        raw.trim()
            .parse::<i64>()
            .or_else(|_| {
                // Falcon occasionally writes whole numbers as "3.0".
                raw.trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.fract() == 0.0)
                    .map(|value| value as i64)
                    .ok_or(())
            })
            .map_err(|_| self.invalid_value(id, name, raw))
    }

    pub fn float_attribute(&self, id: NodeId, name: &str) -> Result<f64> {
        let raw = self.required_attribute(id, name)?;
        raw.trim()
            .parse::<f64>()
            .map_err(|_| self.invalid_value(id, name, raw))
    }

    /// Boolean attributes use the literal tokens "1" and "0".
    pub fn bool_attribute(&self, id: NodeId, name: &str) -> Result<bool> {
        let raw = self.required_attribute(id, name)?;
        match raw.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            _ => Err(self.invalid_value(id, name, raw)),
        }
    }

    /// Optional boolean attribute: `None` when absent.
    pub fn optional_bool_attribute(&self, id: NodeId, name: &str) -> Result<Option<bool>> {
        match self.attribute(id, name) {
            Some(_) => self.bool_attribute(id, name).map(Some),
            None => Ok(None),
        }
    }

    pub fn set_int_attribute(&mut self, id: NodeId, name: &str, value: i64) {
        self.set_attribute(id, name, value.to_string());
    }

    pub fn set_float_attribute(&mut self, id: NodeId, name: &str, value: f64) {
        self.set_attribute(id, name, format_float(value));
    }

    pub fn set_bool_attribute(&mut self, id: NodeId, name: &str, value: bool) {
        self.set_attribute(id, name, if value { "1" } else { "0" });
    }

    fn invalid_value(&self, id: NodeId, name: &str, raw: &str) -> ConverterError {
        ConverterError::InvalidAttributeValue {
            element: self.name(id).to_string(),
            attribute: name.to_string(),
            value: raw.to_string(),
            path: self.path.clone(),
        }
    }

    // === Text ===

    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].text.as_ref().map(NodeText::as_str)
    }

    pub fn set_text(&mut self, id: NodeId, text: NodeText) {
        self.nodes[id.0].text = Some(text);
    }

    // === Structure ===

    /// Create a detached element.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.nodes.push(Node::new(name));
        NodeId(self.nodes.len() - 1)
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    /// Insert `child` at `index` among `parent`'s children, detaching it first.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Unlink a node from its parent. The subtree stays in the arena.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != id);
        }
    }

    /// Deep-copy `source_node` of `source` into this document as a
    /// detached subtree and return the new subtree root.
    pub fn import(&mut self, source: &Document, source_node: NodeId) -> NodeId {
        let copy = self.create_element(source.name(source_node));
        self.nodes[copy.0].attributes = source.nodes[source_node.0].attributes.clone();
        self.nodes[copy.0].text = source.nodes[source_node.0].text.clone();
        for &child in source.children(source_node) {
            let child_copy = self.import(source, child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    pub(crate) fn has_declaration(&self) -> bool {
        self.has_declaration
    }
}

/// Format a float the way Falcon does: no trailing ".0" on whole numbers.
pub fn format_float(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Root>
    <Item Name="One" Flag="1" Count="3" Level="0.25"/>
    <Item Name="Two" Flag="0" Count="x" Level="1"/>
    <script><![CDATA[require 'Pulsar']]></script>
</Root>
"#;

    fn sample() -> Document {
        Document::parse(SAMPLE, "/tmp/sample.uvip").unwrap()
    }

    #[test]
    fn test_parse_structure() {
        let doc = sample();
        assert_eq!(doc.name(doc.root()), "Root");
        assert_eq!(doc.children_named(doc.root(), "Item").len(), 2);
        let script = doc.child_named(doc.root(), "script").unwrap();
        assert_eq!(doc.text(script), Some("require 'Pulsar'"));
    }

    #[test]
    fn test_typed_accessors() {
        let doc = sample();
        let items = doc.children_named(doc.root(), "Item");
        assert!(doc.bool_attribute(items[0], "Flag").unwrap());
        assert!(!doc.bool_attribute(items[1], "Flag").unwrap());
        assert_eq!(doc.int_attribute(items[0], "Count").unwrap(), 3);
        assert_eq!(doc.float_attribute(items[0], "Level").unwrap(), 0.25);
        assert!(matches!(
            doc.int_attribute(items[1], "Count"),
            Err(ConverterError::InvalidAttributeValue { .. })
        ));
    }

    #[test]
    fn test_missing_attribute_is_hard_failure() {
        let doc = sample();
        let item = doc.child_named(doc.root(), "Item").unwrap();
        match doc.required_attribute(item, "Style") {
            Err(ConverterError::MissingAttribute {
                element,
                attribute,
                path,
            }) => {
                assert_eq!(element, "Item");
                assert_eq!(attribute, "Style");
                assert_eq!(path, PathBuf::from("/tmp/sample.uvip"));
            }
            other => panic!("expected MissingAttribute, got {:?}", other),
        }
    }

    #[test]
    fn test_bool_rejects_other_tokens() {
        let doc = Document::parse(r#"<A Flag="true"/>"#, "a.xml").unwrap();
        assert!(doc.bool_attribute(doc.root(), "Flag").is_err());
    }

    #[test]
    fn test_set_attribute_formats() {
        let mut doc = sample();
        let item = doc.child_named(doc.root(), "Item").unwrap();
        doc.set_float_attribute(item, "Level", 1.0);
        doc.set_bool_attribute(item, "Flag", false);
        doc.set_attribute(item, "New", "v");
        assert_eq!(doc.attribute(item, "Level"), Some("1"));
        assert_eq!(doc.attribute(item, "Flag"), Some("0"));
        assert_eq!(doc.attribute(item, "New"), Some("v"));
    }

    #[test]
    fn test_detach_and_import() {
        let mut doc = sample();
        let template = Document::parse(r#"<T A="1"><Child B="2"/></T>"#, "t.xml").unwrap();
        let copy = doc.import(&template, template.root());
        assert!(!doc.is_attached(copy));
        doc.insert_child(doc.root(), 0, copy);
        assert!(doc.is_attached(copy));
        assert_eq!(doc.children(doc.root())[0], copy);
        let child = doc.child_named(copy, "Child").unwrap();
        assert_eq!(doc.attribute(child, "B"), Some("2"));

        doc.detach(copy);
        assert!(!doc.is_attached(child));
        assert!(doc.child_named(doc.root(), "T").is_none());
    }

    #[test]
    fn test_round_trip_text() {
        let doc = sample();
        let written = doc.to_xml_string().unwrap();
        let reparsed = Document::parse(&written, "again.xml").unwrap();
        assert_eq!(reparsed.descendants(reparsed.root()).len(), 3);
        assert!(written.starts_with("<?xml"));
        assert!(written.contains("<![CDATA[require 'Pulsar']]>"));
        assert!(written.contains("\n    <Item Name=\"One\""));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.uvip");
        let doc = sample();
        doc.save(&path).unwrap();
        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.path(), path.as_path());
        assert_eq!(loaded.children(loaded.root()).len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Document::load(&dir.path().join("absent.uvip"));
        assert!(matches!(result, Err(ConverterError::FileNotFound { .. })));
    }
}
