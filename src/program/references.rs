//! Index of the modulations that are sourced from each macro.

use std::collections::HashMap;

use crate::document::Document;
use crate::error::Result;

use super::connections;
use super::modulation::{Modulation, ModulationOwner};

/// Map from macro name to the modulations (with their owners) that use the
/// macro as their source. Built from the tree on demand, so it cannot drift
/// from the document it was built from.
#[derive(Debug, Clone, Default)]
pub struct MacroReferences {
    by_macro: HashMap<String, Vec<Modulation>>,
}

impl MacroReferences {
    /// Index every modulation owned by `owners`.
    pub fn build(
        doc: &Document,
        owners: impl IntoIterator<Item = ModulationOwner>,
    ) -> Result<Self> {
        let mut by_macro: HashMap<String, Vec<Modulation>> = HashMap::new();
        for owner in owners {
            for modulation in connections::modulations(doc, owner) {
                if let Some(name) = modulation.source_macro_name(doc)? {
                    by_macro.entry(name).or_default().push(modulation);
                }
            }
        }
        Ok(Self { by_macro })
    }

    /// Modulations sourced from the named macro.
    pub fn modulations_from(&self, macro_name: &str) -> &[Modulation] {
        self.by_macro
            .get(macro_name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Connections parents modulated by the named macro, without repeats.
    pub fn modulated_owners(&self, macro_name: &str) -> Vec<ModulationOwner> {
        let mut owners: Vec<ModulationOwner> = Vec::new();
        for modulation in self.modulations_from(macro_name) {
            if !owners.contains(&modulation.owner()) {
                owners.push(modulation.owner());
            }
        }
        owners
    }

    pub fn is_referenced(&self, macro_name: &str) -> bool {
        !self.modulations_from(macro_name).is_empty()
    }
}
