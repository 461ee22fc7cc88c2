//! Layout, value, effect and description edits, plus the read-only queries
//! the batch tasks report on.

use std::collections::BTreeSet;

use log::debug;

use crate::cc::CcAllocator;
use crate::error::Result;

use super::ccs::WHEEL_DISPLAY_NAME;
use super::connections::{Effect, EffectFamily};
use super::macros::{Macro, MacroStyle};
use super::modulation::{ModulationOwner, MOD_WHEEL_CC};
use super::{EditOutcome, FalconProgram};

/// Standard Info page grid.
pub const LAYOUT_COLUMNS: usize = 6;
pub const LAYOUT_ORIGIN_X: i64 = 20;
pub const LAYOUT_ORIGIN_Y: i64 = 118;
pub const LAYOUT_COLUMN_WIDTH: i64 = 100;
pub const LAYOUT_ROW_HEIGHT: i64 = 95;

const ADSR_DISPLAY_NAMES: [&str; 4] = ["Attack", "Decay", "Sustain", "Release"];

/// Position of the `index`th (0-based) macro on the standard grid.
pub fn grid_location(index: usize) -> (i64, i64) {
    let column = (index % LAYOUT_COLUMNS) as i64;
    let row = (index / LAYOUT_COLUMNS) as i64;
    (
        LAYOUT_ORIGIN_X + column * LAYOUT_COLUMN_WIDTH,
        LAYOUT_ORIGIN_Y + row * LAYOUT_ROW_HEIGHT,
    )
}

impl FalconProgram {
    /// Move the macros, in location order, onto the standard grid.
    pub fn initialise_layout(&mut self, tolerance: i64) -> Result<EditOutcome> {
        if self.is_script_driven() {
            return Ok(EditOutcome::Skipped(format!(
                "Info page is defined by a {} script",
                self.dialect()
            )));
        }
        let mut changed = false;
        for (index, m) in self
            .macros_in_location_order(tolerance)?
            .into_iter()
            .enumerate()
        {
            let (x, y) = grid_location(index);
            if m.x(&self.doc)? != x || m.y(&self.doc)? != y || !m.custom_position(&self.doc)? {
                m.set_location(&mut self.doc, x, y)?;
                changed = true;
            }
        }
        Ok(EditOutcome::from_changed(changed))
    }

    /// Remove every effect of `family`, then every macro left modulating
    /// nothing because it only modulated those effects.
    pub fn remove_effects_and_macros(&mut self, family: EffectFamily) -> Result<EditOutcome> {
        let removed: Vec<Effect> = self
            .effects()
            .into_iter()
            .filter(|effect| effect.family(&self.doc) == family)
            .collect();
        if removed.is_empty() {
            return Ok(EditOutcome::Unchanged);
        }
        let removed_owners: Vec<ModulationOwner> =
            removed.iter().map(|effect| effect.owner()).collect();

        let references = self.macro_references()?;
        let mut orphans = Vec::new();
        for m in self.macros() {
            let owners = references.modulated_owners(m.name(&self.doc)?);
            if !owners.is_empty() && owners.iter().all(|owner| removed_owners.contains(owner)) {
                orphans.push(m);
            }
        }

        for effect in &removed {
            debug!(
                "{}: removing {} '{}'",
                self.path,
                effect.effect_type(&self.doc),
                effect.name(&self.doc)?
            );
            self.doc.detach(effect.node());
        }
        for m in orphans {
            debug!("{}: removing {}", self.path, m.name(&self.doc)?);
            self.remove_macro(m)?;
        }
        Ok(EditOutcome::Changed)
    }

    /// Zero every toggle macro, and every continuous macro that only
    /// modulates delay or reverb effects.
    pub fn initialise_values(&mut self) -> Result<EditOutcome> {
        let references = self.macro_references()?;
        let mut changed = false;
        for m in self.macros() {
            let zero = match m.style(&self.doc)? {
                MacroStyle::Toggle => true,
                MacroStyle::Continuous => {
                    let owners = references.modulated_owners(m.name(&self.doc)?);
                    !owners.is_empty()
                        && owners
                            .iter()
                            .all(|owner| self.is_time_effect_owner(*owner))
                }
            };
            if zero && m.value(&self.doc)? != 0.0 {
                m.set_value(&mut self.doc, 0.0);
                changed = true;
            }
        }
        Ok(EditOutcome::from_changed(changed))
    }

    /// Zero every macro that modulates an effect of `family`.
    pub fn change_family_to_zero(&mut self, family: EffectFamily) -> Result<EditOutcome> {
        let references = self.macro_references()?;
        let mut changed = false;
        for m in self.macros() {
            let modulates_family = references
                .modulated_owners(m.name(&self.doc)?)
                .iter()
                .any(|owner| self.owner_family(*owner) == Some(family));
            if modulates_family && m.value(&self.doc)? != 0.0 {
                m.set_value(&mut self.doc, 0.0);
                changed = true;
            }
        }
        Ok(EditOutcome::from_changed(changed))
    }

    /// Make the program's path the first line of its description.
    pub fn prepend_path_line_to_description(&mut self) -> Result<EditOutcome> {
        let line = self.path.to_string();
        let description = self.description().to_string();
        if description.lines().next() == Some(line.as_str()) {
            return Ok(EditOutcome::Unchanged);
        }
        let updated = if description.is_empty() {
            line
        } else {
            format!("{}\n{}", line, description)
        };
        self.set_description(&updated);
        Ok(EditOutcome::Changed)
    }

    /// Add a Wheel macro mapped to the replacement CC and point every mod
    /// wheel modulation at it.
    pub fn replace_mod_wheel_with_macro(
        &mut self,
        allocator: &CcAllocator,
        tolerance: i64,
    ) -> Result<EditOutcome> {
        if self.is_script_driven() {
            return Ok(EditOutcome::Skipped(format!(
                "Info page is defined by a {} script",
                self.dialect()
            )));
        }
        let Some(replacement) = allocator.mod_wheel_replacement_cc() else {
            return Ok(EditOutcome::Skipped(
                "no mod wheel replacement CC is configured".to_string(),
            ));
        };
        if self
            .find_macro_by_display_name(WHEEL_DISPLAY_NAME)?
            .is_some()
        {
            return Ok(EditOutcome::Skipped(format!(
                "already has a {} macro",
                WHEEL_DISPLAY_NAME
            )));
        }
        let mut wheel_modulations = Vec::new();
        for modulation in self.all_modulations() {
            if modulation.cc_no(&self.doc)? == Some(MOD_WHEEL_CC) {
                wheel_modulations.push(modulation);
            }
        }
        if wheel_modulations.is_empty() {
            return Ok(EditOutcome::Unchanged);
        }

        let (x, y) = self.location_after_last_macro(tolerance)?;
        let wheel = self.add_macro(WHEEL_DISPLAY_NAME, MacroStyle::Continuous, x, y)?;
        wheel.change_cc_no(&mut self.doc, &self.templates, replacement)?;
        let source = wheel.source(&self.doc)?;
        for modulation in wheel_modulations {
            modulation.set_source(&mut self.doc, &source);
        }
        Ok(EditOutcome::Changed)
    }

    fn location_after_last_macro(&self, tolerance: i64) -> Result<(i64, i64)> {
        let ordered = self.macros_in_location_order(tolerance)?;
        let Some(last) = ordered.last() else {
            return Ok(grid_location(0));
        };
        let (x, y) = (last.x(&self.doc)?, last.y(&self.doc)?);
        if ordered.len() % LAYOUT_COLUMNS == 0 {
            Ok((LAYOUT_ORIGIN_X, y + LAYOUT_ROW_HEIGHT))
        } else {
            Ok((x + LAYOUT_COLUMN_WIDTH, y))
        }
    }

    fn owner_family(&self, owner: ModulationOwner) -> Option<EffectFamily> {
        match owner {
            ModulationOwner::Effect(node) => Some(Effect::bind(node).family(&self.doc)),
            _ => None,
        }
    }

    fn is_time_effect_owner(&self, owner: ModulationOwner) -> bool {
        matches!(
            self.owner_family(owner),
            Some(EffectFamily::Delay) | Some(EffectFamily::Reverb)
        )
    }

    // === Queries ===

    /// Whether the program has Attack, Decay, Sustain and Release macros.
    pub fn has_adsr_macros(&self) -> Result<bool> {
        let mut found = BTreeSet::new();
        for m in self.macros() {
            let display_name = m.display_name(&self.doc)?;
            if let Some(name) = ADSR_DISPLAY_NAMES
                .iter()
                .find(|name| name.eq_ignore_ascii_case(display_name))
            {
                found.insert(*name);
            }
        }
        Ok(found.len() == ADSR_DISPLAY_NAMES.len())
    }

    pub fn macro_count(&self) -> usize {
        self.macros().len()
    }

    /// Distinct effect types of `family`, sorted.
    pub fn effect_types(&self, family: EffectFamily) -> Vec<String> {
        self.effects()
            .into_iter()
            .filter(|effect| effect.family(&self.doc) == family)
            .map(|effect| effect.effect_type(&self.doc).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Macros with the given style, in document order.
    pub fn macros_with_style(&self, style: MacroStyle) -> Result<Vec<Macro>> {
        let mut result = Vec::new();
        for m in self.macros() {
            if m.style(&self.doc)? == style {
                result.push(m);
            }
        }
        Ok(result)
    }

    /// Whether the macro is still sourced by `ModulationSource::Macro`
    /// modulations anywhere.
    pub fn is_macro_referenced(&self, m: Macro) -> Result<bool> {
        let source = m.source(&self.doc)?;
        for modulation in self.all_modulations() {
            if modulation.parsed_source(&self.doc)? == source {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
