//! Script processors and Info page script dialects.
//!
//! Sound banks with a scripted Info page embed a Lua script whose `require`
//! invocation identifies the layout convention (the dialect). The dialect
//! decides whether macro CCs live on the script processor and which quirks
//! apply to them.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::document::{Document, NodeId};
use crate::error::Result;

use super::connections;
use super::macros::PROPERTIES_ELEMENT;
use super::modulation::{Modulation, ModulationOwner};

pub const EVENT_PROCESSORS_ELEMENT: &str = "EventProcessors";
pub const SCRIPT_PROCESSOR_ELEMENT: &str = "ScriptProcessor";
const SCRIPT_ELEMENT: &str = "script";
const SCRIPT_PATH_ATTRIBUTE: &str = "ScriptPath";

/// Script macro slot prefix, e.g. `Macro4`.
const MACRO_SLOT_PREFIX: &str = "Macro";

/// Destination whose toggle CC the OrganicTexture template wires even when
/// the slot holds a continuous macro.
pub const ORGANIC_TOGGLE_SLOT_DESTINATION: &str = "Macro3";

/// Display name of the toggle macro that legitimately owns that slot.
pub const ORGANIC_TOGGLE_DISPLAY_NAME: &str = "Bypass";

/// Known Info page script conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptDialect {
    /// No recognised script: the Info page is laid out by the macros themselves.
    None,
    /// `require 'Sound Bank'`
    SoundBankSingleQuoted,
    /// `require("Sound Bank")`
    SoundBankDoubleQuoted,
    /// `require("Factory2_1")`
    Factory2_1,
    /// `require("FactoryGeneral")`
    FactoryGeneral,
    /// `require("main")`
    Main1,
    /// `require 'main'`
    Main2,
    /// `require("OrganicTexture")`
    OrganicTexture,
}

/// Fixed idioms, matched as suffixes of a `require` invocation.
const KNOWN_IDIOMS: &[(&str, ScriptDialect)] = &[
    ("Factory2_1\"", ScriptDialect::Factory2_1),
    ("FactoryGeneral\"", ScriptDialect::FactoryGeneral),
    ("OrganicTexture\"", ScriptDialect::OrganicTexture),
    ("main\"", ScriptDialect::Main1),
    ("main'", ScriptDialect::Main2),
];

impl ScriptDialect {
    /// Whether the Info page is defined by the script rather than the macros.
    pub fn is_script_driven(self) -> bool {
        self != ScriptDialect::None
    }

    /// Whether template toggle CCs must be checked against the slot's macro.
    pub fn corrects_toggle_wiring(self) -> bool {
        self == ScriptDialect::OrganicTexture
    }
}

impl fmt::Display for ScriptDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptDialect::None => "None",
            ScriptDialect::SoundBankSingleQuoted => "SoundBankSingleQuoted",
            ScriptDialect::SoundBankDoubleQuoted => "SoundBankDoubleQuoted",
            ScriptDialect::Factory2_1 => "Factory2_1",
            ScriptDialect::FactoryGeneral => "FactoryGeneral",
            ScriptDialect::Main1 => "Main1",
            ScriptDialect::Main2 => "Main2",
            ScriptDialect::OrganicTexture => "OrganicTexture",
        };
        write!(f, "{}", name)
    }
}

fn require_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"require\s*\(?\s*["'][^"'\r\n]*["']"#).expect("require pattern is valid")
    })
}

/// `require` invocations in `script`, trimmed to their closing quote.
pub fn require_invocations(script: &str) -> Vec<&str> {
    require_pattern()
        .find_iter(script)
        .map(|found| found.as_str())
        .collect()
}

/// True when `invocation` ends with `suffix` and the name in the suffix is
/// not the tail of a longer name.
fn ends_with_idiom(invocation: &str, suffix: &str) -> bool {
    match invocation.strip_suffix(suffix) {
        Some(head) => head.ends_with(['"', '\'', '/', '\\']),
        None => false,
    }
}

/// Classify `script` by the first `require` invocation that matches a
/// known idiom. Unrecognised scripts classify as [`ScriptDialect::None`].
pub fn classify_script(script: &str, sound_bank: &str) -> ScriptDialect {
    for invocation in require_invocations(script) {
        if let Some((_, dialect)) = KNOWN_IDIOMS
            .iter()
            .find(|(suffix, _)| ends_with_idiom(invocation, suffix))
        {
            return *dialect;
        }
        if !sound_bank.is_empty() {
            if ends_with_idiom(invocation, &format!("{}'", sound_bank)) {
                return ScriptDialect::SoundBankSingleQuoted;
            }
            if ends_with_idiom(invocation, &format!("{}\"", sound_bank)) {
                return ScriptDialect::SoundBankDoubleQuoted;
            }
        }
    }
    ScriptDialect::None
}

/// Slot number of a script macro slot destination such as `Macro4`.
pub fn macro_slot_number(destination: &str) -> Option<u32> {
    destination
        .strip_prefix(MACRO_SLOT_PREFIX)
        .filter(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Destination naming script macro slot `n`.
pub fn macro_slot_destination(n: u32) -> String {
    format!("{}{}", MACRO_SLOT_PREFIX, n)
}

/// A `ScriptProcessor` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptProcessor {
    node: NodeId,
}

impl ScriptProcessor {
    pub fn bind(node: NodeId) -> Self {
        Self { node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> ModulationOwner {
        ModulationOwner::ScriptProcessor(self.node)
    }

    pub fn name<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        doc.required_attribute(self.node, "Name")
    }

    /// The embedded Lua script, if any.
    pub fn script<'d>(&self, doc: &'d Document) -> Option<&'d str> {
        doc.child_named(self.node, SCRIPT_ELEMENT)
            .and_then(|script| doc.text(script))
    }

    pub fn script_path<'d>(&self, doc: &'d Document) -> Option<&'d str> {
        doc.child_named(self.node, PROPERTIES_ELEMENT)
            .and_then(|properties| doc.attribute(properties, SCRIPT_PATH_ATTRIBUTE))
    }

    pub fn dialect(&self, doc: &Document, sound_bank: &str) -> ScriptDialect {
        self.script(doc)
            .map(|script| classify_script(script, sound_bank))
            .unwrap_or(ScriptDialect::None)
    }

    pub fn modulations(&self, doc: &Document) -> Vec<Modulation> {
        connections::modulations(doc, self.owner())
    }

    /// Modulations addressed to script macro slots, with their slot numbers.
    pub fn slot_modulations(&self, doc: &Document) -> Result<Vec<(u32, Modulation)>> {
        let mut result = Vec::new();
        for modulation in self.modulations(doc) {
            if let Some(slot) = macro_slot_number(modulation.destination(doc)?) {
                result.push((slot, modulation));
            }
        }
        Ok(result)
    }
}
