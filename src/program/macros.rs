//! Macros: the user-facing controls on a program's Info page.

use crate::document::{Document, NodeId};
use crate::error::{ConverterError, Result};

use super::connections::{self, CONNECTIONS_ELEMENT};
use super::location::MacroLocation;
use super::modulation::{
    Modulation, ModulationOwner, ModulationSource, MOD_WHEEL_CC, VALUE_DESTINATION,
};
use super::references::MacroReferences;
use super::templates::Templates;

/// Element name of a macro.
pub const MACRO_ELEMENT: &str = "ConstantModulation";

/// Every macro name is this prefix followed by the macro number.
pub const MACRO_NAME_PREFIX: &str = "Macro ";

/// Child element holding a macro's screen position.
pub const PROPERTIES_ELEMENT: &str = "Properties";

/// CC 38 is unusable on script-driven Info pages; 28 takes its place.
const INCOMPATIBLE_CC: u32 = 38;
const INCOMPATIBLE_CC_REPLACEMENT: u32 = 28;

/// Whether a macro is a knob or a switch.
///
/// The `Style` attribute is `0` for continuous and `1` for toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroStyle {
    Continuous,
    Toggle,
}

impl MacroStyle {
    pub fn code(self) -> i64 {
        match self {
            MacroStyle::Continuous => 0,
            MacroStyle::Toggle => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(MacroStyle::Continuous),
            1 => Some(MacroStyle::Toggle),
            _ => None,
        }
    }
}

/// Derive the macro number from a `"Macro {n}"` name.
pub fn macro_number(name: &str) -> Option<u32> {
    name.strip_prefix(MACRO_NAME_PREFIX)
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|&n| n > 0)
}

/// Name for macro number `n`.
pub fn macro_name(n: u32) -> String {
    format!("{}{}", MACRO_NAME_PREFIX, n)
}

/// Replace CC numbers that script-driven Info pages cannot use.
pub fn compatible_cc_no(cc: u32) -> u32 {
    if cc == INCOMPATIBLE_CC {
        INCOMPATIBLE_CC_REPLACEMENT
    } else {
        cc
    }
}

/// A `ConstantModulation` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Macro {
    node: NodeId,
}

impl Macro {
    pub fn bind(node: NodeId) -> Self {
        Self { node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn owner(&self) -> ModulationOwner {
        ModulationOwner::Macro(self.node)
    }

    /// The authoritative identity of the macro within its program.
    pub fn name<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        doc.required_attribute(self.node, "Name")
    }

    pub fn set_name(&self, doc: &mut Document, name: &str) {
        doc.set_attribute(self.node, "Name", name);
    }

    pub fn macro_no(&self, doc: &Document) -> Result<u32> {
        let name = self.name(doc)?;
        macro_number(name).ok_or_else(|| ConverterError::InvalidAttributeValue {
            element: MACRO_ELEMENT.to_string(),
            attribute: "Name".to_string(),
            value: name.to_string(),
            path: doc.path().to_path_buf(),
        })
    }

    pub fn display_name<'d>(&self, doc: &'d Document) -> Result<&'d str> {
        doc.required_attribute(self.node, "DisplayName")
    }

    pub fn set_display_name(&self, doc: &mut Document, display_name: &str) {
        doc.set_attribute(self.node, "DisplayName", display_name);
    }

    pub fn style(&self, doc: &Document) -> Result<MacroStyle> {
        let code = doc.int_attribute(self.node, "Style")?;
        MacroStyle::from_code(code).ok_or_else(|| ConverterError::InvalidAttributeValue {
            element: MACRO_ELEMENT.to_string(),
            attribute: "Style".to_string(),
            value: code.to_string(),
            path: doc.path().to_path_buf(),
        })
    }

    pub fn set_style(&self, doc: &mut Document, style: MacroStyle) {
        doc.set_int_attribute(self.node, "Style", style.code());
    }

    pub fn is_continuous(&self, doc: &Document) -> Result<bool> {
        Ok(self.style(doc)? == MacroStyle::Continuous)
    }

    pub fn value(&self, doc: &Document) -> Result<f64> {
        doc.float_attribute(self.node, "Value")
    }

    pub fn set_value(&self, doc: &mut Document, value: f64) {
        doc.set_float_attribute(self.node, "Value", value);
    }

    pub fn bipolar(&self, doc: &Document) -> Result<bool> {
        doc.bool_attribute(self.node, "Bipolar")
    }

    pub fn set_bipolar(&self, doc: &mut Document, bipolar: bool) {
        doc.set_bool_attribute(self.node, "Bipolar", bipolar);
    }

    fn properties(&self, doc: &Document) -> Result<NodeId> {
        doc.required_child(self.node, PROPERTIES_ELEMENT)
    }

    pub fn x(&self, doc: &Document) -> Result<i64> {
        doc.int_attribute(self.properties(doc)?, "x")
    }

    pub fn y(&self, doc: &Document) -> Result<i64> {
        doc.int_attribute(self.properties(doc)?, "y")
    }

    /// Whether the position was placed explicitly. Absent means false.
    pub fn custom_position(&self, doc: &Document) -> Result<bool> {
        Ok(doc
            .optional_bool_attribute(self.properties(doc)?, "customPosition")?
            .unwrap_or(false))
    }

    /// Move the macro and mark its position as custom.
    pub fn set_location(&self, doc: &mut Document, x: i64, y: i64) -> Result<()> {
        let properties = self.properties(doc)?;
        doc.set_int_attribute(properties, "x", x);
        doc.set_int_attribute(properties, "y", y);
        doc.set_bool_attribute(properties, "customPosition", true);
        Ok(())
    }

    pub fn location(&self, doc: &Document) -> Result<MacroLocation> {
        Ok(MacroLocation {
            name: self.name(doc)?.to_string(),
            x: self.x(doc)?,
            y: self.y(doc)?,
        })
    }

    /// The source path other modulations use to refer to this macro.
    pub fn source(&self, doc: &Document) -> Result<ModulationSource> {
        Ok(ModulationSource::Macro(self.name(doc)?.to_string()))
    }

    /// All 0 to 2 modulations owned by the macro.
    pub fn modulations(&self, doc: &Document) -> Vec<Modulation> {
        connections::modulations(doc, self.owner())
    }

    /// Macro-targeting modulations sourced from a literal MIDI CC, with
    /// their CC numbers.
    fn cc_modulations(&self, doc: &Document) -> Result<Vec<(Modulation, u32)>> {
        let mut result = Vec::new();
        for modulation in self.modulations(doc) {
            if modulation.modulates_macro(doc)? {
                if let Some(cc) = modulation.cc_no(doc)? {
                    result.push((modulation, cc));
                }
            }
        }
        Ok(result)
    }

    /// The modulation carrying the macro's own CC.
    ///
    /// When a mod wheel mapping coexists with a macro CC mapping, the macro
    /// CC mapping wins.
    pub fn cc_modulation(&self, doc: &Document) -> Result<Option<Modulation>> {
        let candidates = self.cc_modulations(doc)?;
        Ok(candidates
            .iter()
            .find(|(_, cc)| *cc != MOD_WHEEL_CC)
            .or_else(|| candidates.first())
            .map(|(modulation, _)| *modulation))
    }

    pub fn cc_no(&self, doc: &Document) -> Result<Option<u32>> {
        match self.cc_modulation(doc)? {
            Some(modulation) => modulation.cc_no(doc),
            None => Ok(None),
        }
    }

    /// Whether the macro is mapped to the mod wheel.
    pub fn has_mod_wheel_mapping(&self, doc: &Document) -> Result<bool> {
        Ok(self
            .cc_modulations(doc)?
            .iter()
            .any(|(_, cc)| *cc == MOD_WHEEL_CC))
    }

    /// Map the macro to `cc`, reusing its existing CC modulation if it has one.
    ///
    /// A mod wheel mapping is left alone; when `cc` is the wheel itself the
    /// wheel mapping becomes the macro's only CC mapping.
    pub fn change_cc_no(&self, doc: &mut Document, templates: &Templates, cc: u32) -> Result<()> {
        let cc = compatible_cc_no(cc);
        let candidates = self.cc_modulations(doc)?;
        let wheel = candidates.iter().find(|(_, c)| *c == MOD_WHEEL_CC);
        let mapped = candidates.iter().find(|(_, c)| *c != MOD_WHEEL_CC);
        match (mapped, wheel) {
            (Some((modulation, _)), Some(_)) if cc == MOD_WHEEL_CC => {
                connections::remove_modulation(doc, *modulation);
            }
            (Some((modulation, _)), _) => modulation.set_cc_no(doc, cc),
            (None, Some(_)) if cc == MOD_WHEEL_CC => {}
            (None, _) => {
                let node = templates.new_modulation(doc);
                let modulation = connections::add_modulation(doc, self.owner(), node);
                modulation.set_cc_no(doc, cc);
                modulation.set_destination(doc, VALUE_DESTINATION);
            }
        }
        Ok(())
    }

    /// Delete the macro and every modulation elsewhere that it sources.
    ///
    /// Only the matching modulations are removed from the connections
    /// parents the macro modulates, never the parents themselves.
    pub fn remove_element(&self, doc: &mut Document, references: &MacroReferences) -> Result<()> {
        let name = self.name(doc)?.to_string();
        for &modulation in references.modulations_from(&name) {
            connections::remove_modulation(doc, modulation);
        }
        doc.detach(self.node);
        Ok(())
    }

    pub fn has_connections(&self, doc: &Document) -> bool {
        doc.child_named(self.node, CONNECTIONS_ELEMENT).is_some()
    }
}
