//! Element templates used to materialise new macros and modulations.

use crate::document::{Document, NodeId};
use crate::error::Result;

use super::macros::MACRO_ELEMENT;
use super::modulation::MODULATION_ELEMENT;

const TEMPLATES_XML: &str = r#"<Templates>
    <ConstantModulation Name="Macro 1" Bypass="0" DisplayName="Macro 1" Style="0" Value="0" Bipolar="0">
        <Properties showValue="0" x="0" y="0" customPosition="1"/>
    </ConstantModulation>
    <SignalConnection Ratio="1" Source="@MIDI CC 1" Destination="Value" Mapping="0" Invert="0" SignalConnectionVersion="1" ConnectionMode="1"/>
</Templates>"#;

/// Parsed template elements, copied into a program on demand.
#[derive(Debug, Clone)]
pub struct Templates {
    doc: Document,
    macro_node: NodeId,
    modulation_node: NodeId,
}

impl Templates {
    /// The templates built into the converter.
    pub fn embedded() -> Result<Self> {
        Self::from_document(Document::parse(TEMPLATES_XML, "<embedded templates>")?)
    }

    /// Templates read from a document holding one macro and one
    /// modulation element under its root.
    pub fn from_document(doc: Document) -> Result<Self> {
        let macro_node = doc.required_child(doc.root(), MACRO_ELEMENT)?;
        let modulation_node = doc.required_child(doc.root(), MODULATION_ELEMENT)?;
        Ok(Self {
            doc,
            macro_node,
            modulation_node,
        })
    }

    /// Detached copy of the macro template inside `target`.
    pub fn new_macro(&self, target: &mut Document) -> NodeId {
        target.import(&self.doc, self.macro_node)
    }

    /// Detached copy of the modulation template inside `target`.
    pub fn new_modulation(&self, target: &mut Document) -> NodeId {
        target.import(&self.doc, self.modulation_node)
    }
}
