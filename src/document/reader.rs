//! XML text to [`Document`] arena.

use std::path::{Path, PathBuf};

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use super::{Document, Node, NodeId, NodeText};
use crate::error::{ConverterError, Result};

pub(super) fn parse(xml: &str, path: PathBuf) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes: Vec<Node> = Vec::new();
    let mut stack: Vec<NodeId> = Vec::new();
    let mut root: Option<NodeId> = None;
    let mut has_declaration = false;

    loop {
        let event = reader.read_event().map_err(|e| invalid(&path, e))?;
        match event {
            Event::Decl(_) => has_declaration = true,
            Event::Start(start) => {
                let id = push_node(&mut nodes, &start, stack.last().copied(), &mut root, &path)?;
                stack.push(id);
            }
            Event::Empty(start) => {
                push_node(&mut nodes, &start, stack.last().copied(), &mut root, &path)?;
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(text) => {
                if let Some(&current) = stack.last() {
                    let text = text.unescape().map_err(|e| invalid(&path, e))?;
                    append_text(&mut nodes[current.0], &text);
                }
            }
            Event::CData(data) => {
                if let Some(&current) = stack.last() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    nodes[current.0].text = Some(NodeText::CData(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ConverterError::InvalidXml {
            path,
            reason: "unexpected end of document".to_string(),
        });
    }
    let root = root.ok_or_else(|| ConverterError::InvalidXml {
        path: path.clone(),
        reason: "document has no root element".to_string(),
    })?;

    Ok(Document {
        path,
        nodes,
        root,
        has_declaration,
    })
}

fn push_node(
    nodes: &mut Vec<Node>,
    start: &BytesStart,
    parent: Option<NodeId>,
    root: &mut Option<NodeId>,
    path: &Path,
) -> Result<NodeId> {
    let mut node = Node::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| invalid(path, e))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| invalid(path, e))?
            .into_owned();
        node.attributes.push((key, value));
    }
    node.parent = parent;

    let id = NodeId(nodes.len());
    nodes.push(node);
    match parent {
        Some(parent) => nodes[parent.0].children.push(id),
        None if root.is_none() => *root = Some(id),
        None => {
            return Err(ConverterError::InvalidXml {
                path: path.to_path_buf(),
                reason: "document has more than one root element".to_string(),
            })
        }
    }
    Ok(id)
}

fn append_text(node: &mut Node, text: &str) {
    match &mut node.text {
        Some(NodeText::Plain(existing)) => existing.push_str(text),
        _ => node.text = Some(NodeText::Plain(text.to_string())),
    }
}

fn invalid(path: &Path, error: impl std::fmt::Display) -> ConverterError {
    ConverterError::InvalidXml {
        path: path.to_path_buf(),
        reason: error.to_string(),
    }
}
