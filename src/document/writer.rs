//! [`Document`] arena to indented XML text.

use quick_xml::escape::escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::writer::Writer;

use super::{Document, NodeId, NodeText};
use crate::error::{ConverterError, Result};

/// Indentation used by Falcon when it saves a program.
const INDENT_CHAR: u8 = b' ';
const INDENT_SIZE: usize = 4;

pub(super) fn write(doc: &Document) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), INDENT_CHAR, INDENT_SIZE);
    if doc.has_declaration() {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| failed(doc, e))?;
    }
    write_node(doc, &mut writer, doc.root())?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| failed(doc, e))
}

fn write_node(doc: &Document, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<()> {
    let node = &doc.nodes[id.0];
    let mut start = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        let value = escape_attribute(value);
        start.push_attribute((key.as_bytes(), value.as_bytes()));
    }

    if node.children.is_empty() && node.text.is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| failed(doc, e));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| failed(doc, e))?;
    for &child in &node.children {
        write_node(doc, writer, child)?;
    }
    match &node.text {
        Some(NodeText::Plain(text)) => writer.write_event(Event::Text(BytesText::new(text))),
        Some(NodeText::CData(text)) => writer.write_event(Event::CData(BytesCData::new(text))),
        None => Ok(()),
    }
    .map_err(|e| failed(doc, e))?;
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(|e| failed(doc, e))
}

/// Escape an attribute value, including the whitespace characters that
/// attribute normalization would otherwise turn into spaces.
fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in escape(value).chars() {
        match c {
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn failed(doc: &Document, error: impl std::fmt::Display) -> ConverterError {
    ConverterError::InvalidXml {
        path: doc.path().to_path_buf(),
        reason: format!("cannot serialize document: {}", error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_elements_self_close() {
        let doc = Document::parse(r#"<A><B X="1"/></A>"#, "a.xml").unwrap();
        assert_eq!(write(&doc).unwrap(), "<A>\n    <B X=\"1\"/>\n</A>\n");
    }

    #[test]
    fn test_escapes_attribute_values() {
        let mut doc = Document::new("A", "a.xml");
        let root = doc.root();
        doc.set_attribute(root, "description", "Bass & \"Sub\"");
        let written = write(&doc).unwrap();
        let reparsed = Document::parse(&written, "a.xml").unwrap();
        assert_eq!(
            reparsed.attribute(reparsed.root(), "description"),
            Some("Bass & \"Sub\"")
        );
    }

    #[test]
    fn test_line_breaks_survive_in_attributes() {
        let mut doc = Document::new("A", "a.xml");
        let root = doc.root();
        doc.set_attribute(root, "description", "Bank\\Keys\\Pad\nWarm\tpad\r");
        let written = write(&doc).unwrap();
        assert!(written.contains(r#"description="Bank\Keys\Pad&#10;Warm&#9;pad&#13;""#));
        let reparsed = Document::parse(&written, "a.xml").unwrap();
        assert_eq!(
            reparsed.attribute(reparsed.root(), "description"),
            Some("Bank\\Keys\\Pad\nWarm\tpad\r")
        );
    }
}
