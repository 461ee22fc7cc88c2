//! Modulations: mappings from a MIDI CC or a macro to a parameter.

use std::fmt;

use crate::document::{Document, NodeId};
use crate::error::Result;

use super::macros::MACRO_NAME_PREFIX;
use super::script::macro_slot_number;

/// Element name of a modulation.
pub const MODULATION_ELEMENT: &str = "SignalConnection";

/// Source prefix of a MIDI CC modulation.
pub const MIDI_CC_PREFIX: &str = "@MIDI CC ";

/// Source prefix of a macro-sourced modulation.
pub const MACRO_SOURCE_PREFIX: &str = "$Program/";

/// Destination of a modulation that drives its owning macro.
pub const VALUE_DESTINATION: &str = "Value";

/// The modulation wheel.
pub const MOD_WHEEL_CC: u32 = 1;

/// Connection mode of a MIDI CC mapping onto its owning macro.
const MACRO_CC_CONNECTION_MODE: i64 = 1;

/// The entity owning a modulation's `Connections` container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModulationOwner {
    /// A macro on the Info page.
    Macro(NodeId),
    /// Any other connections parent: an insert effect, a layer or the program itself.
    Effect(NodeId),
    /// A GUI script processor mapping script macro slots to CCs.
    ScriptProcessor(NodeId),
}

impl ModulationOwner {
    pub fn node(self) -> NodeId {
        match self {
            ModulationOwner::Macro(node)
            | ModulationOwner::Effect(node)
            | ModulationOwner::ScriptProcessor(node) => node,
        }
    }
}

/// Parsed form of a modulation's `Source` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModulationSource {
    /// `@MIDI CC 31`
    MidiCc(u32),
    /// `@MIDI CC C2`: the 2nd configured continuous CC.
    ContinuousPlaceholder(usize),
    /// `@MIDI CC T1`: the 1st configured toggle CC.
    TogglePlaceholder(usize),
    /// `$Program/Macro 3`
    Macro(String),
    /// Anything else (LFOs, envelopes, ...).
    Other(String),
}

impl ModulationSource {
    pub fn parse(source: &str) -> Self {
        if let Some(rest) = source.strip_prefix(MIDI_CC_PREFIX) {
            let rest = rest.trim();
            if let Ok(cc) = rest.parse::<u32>() {
                return ModulationSource::MidiCc(cc);
            }
            if let Some(index) = rest.strip_prefix('C').and_then(|i| i.parse().ok()) {
                return ModulationSource::ContinuousPlaceholder(index);
            }
            if let Some(index) = rest.strip_prefix('T').and_then(|i| i.parse().ok()) {
                return ModulationSource::TogglePlaceholder(index);
            }
        }
        if let Some(name) = source.strip_prefix(MACRO_SOURCE_PREFIX) {
            if name.starts_with(MACRO_NAME_PREFIX) {
                return ModulationSource::Macro(name.to_string());
            }
        }
        ModulationSource::Other(source.to_string())
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(
            self,
            ModulationSource::ContinuousPlaceholder(_) | ModulationSource::TogglePlaceholder(_)
        )
    }
}

impl fmt::Display for ModulationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModulationSource::MidiCc(cc) => write!(f, "{}{}", MIDI_CC_PREFIX, cc),
            ModulationSource::ContinuousPlaceholder(i) => write!(f, "{}C{}", MIDI_CC_PREFIX, i),
            ModulationSource::TogglePlaceholder(i) => write!(f, "{}T{}", MIDI_CC_PREFIX, i),
            ModulationSource::Macro(name) => write!(f, "{}{}", MACRO_SOURCE_PREFIX, name),
            ModulationSource::Other(source) => write!(f, "{}", source),
        }
    }
}

/// A `SignalConnection` element together with its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Modulation {
    node: NodeId,
    owner: ModulationOwner,
}

impl Modulation {
    pub fn bind(node: NodeId, owner: ModulationOwner) -> Self {
        Self { node, owner }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> ModulationOwner {
        self.owner
    }

    pub fn ratio(&self, doc: &Document) -> Result<f64> {
        doc.float_attribute(self.node, "Ratio")
    }

    pub fn set_ratio(&self, doc: &mut Document, ratio: f64) {
        doc.set_float_attribute(self.node, "Ratio", ratio);
    }

    pub fn source<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        doc.required_attribute(self.node, "Source")
    }

    pub fn set_source(&self, doc: &mut Document, source: &ModulationSource) {
        doc.set_attribute(self.node, "Source", source.to_string());
    }

    pub fn parsed_source(&self, doc: &Document) -> Result<ModulationSource> {
        Ok(ModulationSource::parse(self.source(doc)?))
    }

    pub fn destination<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        doc.required_attribute(self.node, "Destination")
    }

    pub fn set_destination(&self, doc: &mut Document, destination: &str) {
        doc.set_attribute(self.node, "Destination", destination);
    }

    pub fn connection_mode(&self, doc: &Document) -> Result<i64> {
        doc.int_attribute(self.node, "ConnectionMode")
    }

    pub fn set_connection_mode(&self, doc: &mut Document, mode: i64) {
        doc.set_int_attribute(self.node, "ConnectionMode", mode);
    }

    /// MIDI CC number when the source is a literal CC reference.
    pub fn cc_no(&self, doc: &Document) -> Result<Option<u32>> {
        Ok(match self.parsed_source(doc)? {
            ModulationSource::MidiCc(cc) => Some(cc),
            _ => None,
        })
    }

    pub fn set_cc_no(&self, doc: &mut Document, cc: u32) {
        self.set_source(doc, &ModulationSource::MidiCc(cc));
    }

    /// Name of the macro this modulation is sourced from, if any.
    pub fn source_macro_name(&self, doc: &Document) -> Result<Option<String>> {
        Ok(match self.parsed_source(doc)? {
            ModulationSource::Macro(name) => Some(name),
            _ => None,
        })
    }

    /// Whether this modulation drives a macro rather than an effect parameter.
    pub fn modulates_macro(&self, doc: &Document) -> Result<bool> {
        match self.owner {
            ModulationOwner::Macro(_) => Ok(self.destination(doc)? == VALUE_DESTINATION
                && self.connection_mode(doc)? == MACRO_CC_CONNECTION_MODE),
            ModulationOwner::Effect(_) => Ok(false),
            ModulationOwner::ScriptProcessor(_) => {
                Ok(macro_slot_number(self.destination(doc)?).is_some())
            }
        }
    }
}
