//! Macro CC assignment.

use log::debug;

use crate::cc::{next_after, CcAllocator, CcCursor};
use crate::error::Result;

use super::macros::{compatible_cc_no, Macro, MacroStyle};
use super::modulation::{Modulation, ModulationOwner, ModulationSource, MOD_WHEEL_CC};
use super::script::{ORGANIC_TOGGLE_DISPLAY_NAME, ORGANIC_TOGGLE_SLOT_DESTINATION};
use super::{EditOutcome, FalconProgram};

/// Display name of the macro that stands in for the mod wheel.
pub const WHEEL_DISPLAY_NAME: &str = "Wheel";

impl FalconProgram {
    /// Assign CCs to every macro.
    ///
    /// Macros are visited in location order with the document's cursor.
    /// Script-driven programs keep their CCs on the script processor, where
    /// placeholder sources are resolved instead.
    pub fn update_macro_ccs(
        &mut self,
        allocator: &CcAllocator,
        cursor: &mut CcCursor,
        tolerance: i64,
    ) -> Result<EditOutcome> {
        if self.is_script_driven() {
            return self.resolve_script_ccs(allocator);
        }
        self.assign_macro_ccs(allocator, cursor, tolerance, false)
    }

    /// Reassign macro CCs so that CC 1, freed by the Wheel macro, is used
    /// in place of the mod wheel replacement CC.
    pub fn reuse_cc1(
        &mut self,
        allocator: &CcAllocator,
        cursor: &mut CcCursor,
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
        let mut uses_replacement = false;
        for m in self.macros() {
            if m.cc_no(&self.doc)? == Some(replacement) {
                uses_replacement = true;
            }
        }
        if !uses_replacement {
            return Ok(EditOutcome::Skipped(format!(
                "no macro uses CC {}",
                replacement
            )));
        }
        if self.has_foreign_mod_wheel_mapping()? {
            return Ok(EditOutcome::Skipped(format!(
                "CC {} still drives a modulation",
                MOD_WHEEL_CC
            )));
        }
        self.assign_macro_ccs(allocator, cursor, tolerance, true)
    }

    /// Whether CC 1 is mapped anywhere other than a macro's own CC mapping.
    fn has_foreign_mod_wheel_mapping(&self) -> Result<bool> {
        for modulation in self.all_modulations() {
            if modulation.cc_no(&self.doc)? != Some(MOD_WHEEL_CC) {
                continue;
            }
            let own_mapping = matches!(modulation.owner(), ModulationOwner::Macro(_))
                && modulation.modulates_macro(&self.doc)?;
            if !own_mapping {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Rewire every macro-targeting modulation mapped to `old_cc`.
    pub fn change_macro_cc_no(&mut self, old_cc: u32, new_cc: u32) -> Result<EditOutcome> {
        let new_cc = compatible_cc_no(new_cc);
        let mut changed = false;
        for modulation in self.modulations_targeting_macros()? {
            if modulation.cc_no(&self.doc)? == Some(old_cc) && old_cc != new_cc {
                modulation.set_cc_no(&mut self.doc, new_cc);
                changed = true;
            }
        }
        Ok(EditOutcome::from_changed(changed))
    }

    /// The Wheel macro, when it holds the replacement CC.
    fn wheel_macro(&self, allocator: &CcAllocator) -> Result<Option<Macro>> {
        let Some(replacement) = allocator.mod_wheel_replacement_cc() else {
            return Ok(None);
        };
        match self.find_macro_by_display_name(WHEEL_DISPLAY_NAME)? {
            Some(wheel) if wheel.cc_no(&self.doc)? == Some(replacement) => Ok(Some(wheel)),
            _ => Ok(None),
        }
    }

    fn assign_macro_ccs(
        &mut self,
        allocator: &CcAllocator,
        cursor: &mut CcCursor,
        tolerance: i64,
        reuse_cc1: bool,
    ) -> Result<EditOutcome> {
        let wheel = self.wheel_macro(allocator)?;
        let replacement = allocator.mod_wheel_replacement_cc();
        let mut changed = false;
        for m in self.macros_in_location_order(tolerance)? {
            if Some(m) == wheel {
                continue;
            }
            let cc = match m.style(&self.doc)? {
                MacroStyle::Continuous => {
                    let mut cc = allocator.next_continuous(cursor, reuse_cc1);
                    // The replacement CC belongs to the Wheel macro.
                    if Some(cc) == replacement {
                        cc = allocator.next_continuous(cursor, reuse_cc1);
                    }
                    cc
                }
                MacroStyle::Toggle => allocator.next_toggle(cursor),
            };
            if m.cc_no(&self.doc)? != Some(compatible_cc_no(cc)) {
                debug!("{}: {} -> CC {}", self.path, m.name(&self.doc)?, cc);
                m.change_cc_no(&mut self.doc, &self.templates, cc)?;
                changed = true;
            }
        }
        Ok(EditOutcome::from_changed(changed))
    }

    /// Replace placeholder sources on the Info page script processor with
    /// configured CCs, then correct toggle CCs wired to continuous slots.
    fn resolve_script_ccs(&mut self, allocator: &CcAllocator) -> Result<EditOutcome> {
        let Some(processor) = self.info_page_script_processor() else {
            return Ok(EditOutcome::Unchanged);
        };
        let slots = processor.slot_modulations(&self.doc)?;
        let mut changed = false;
        for (_, modulation) in &slots {
            let source = modulation.parsed_source(&self.doc)?;
            if let Some(cc) = allocator.resolve_placeholder(&source) {
                modulation.set_cc_no(&mut self.doc, compatible_cc_no(cc));
                changed = true;
            }
        }
        if self.dialect().corrects_toggle_wiring() {
            changed |= self.correct_organic_toggle_wiring(allocator, &slots)?;
        }
        Ok(EditOutcome::from_changed(changed))
    }

    /// In OrganicTexture programs the `Macro3` slot is wired to a toggle CC
    /// for a Bypass switch. Without a Bypass macro the slot holds a
    /// continuous macro, which gets the continuous CC after the highest one
    /// in use.
    fn correct_organic_toggle_wiring(
        &mut self,
        allocator: &CcAllocator,
        slots: &[(u32, Modulation)],
    ) -> Result<bool> {
        if self
            .find_macro_by_display_name(ORGANIC_TOGGLE_DISPLAY_NAME)?
            .is_some()
        {
            return Ok(false);
        }
        let mut highest_continuous = 0;
        let mut suspects = Vec::new();
        for (_, modulation) in slots {
            let Some(cc) = modulation.cc_no(&self.doc)? else {
                continue;
            };
            if modulation.destination(&self.doc)? == ORGANIC_TOGGLE_SLOT_DESTINATION
                && allocator.is_toggle_cc(cc)
            {
                suspects.push(*modulation);
            } else if !allocator.is_toggle_cc(cc) {
                highest_continuous = highest_continuous.max(cc);
            }
        }
        for modulation in &suspects {
            let cc = compatible_cc_no(next_after(highest_continuous, allocator.continuous_ccs()));
            debug!("{}: continuous slot rewired to CC {}", self.path, cc);
            modulation.set_source(&mut self.doc, &ModulationSource::MidiCc(cc));
            highest_continuous = cc;
        }
        Ok(!suspects.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::CcRange;
    use crate::document::Document;
    use crate::program::test_programs::{ORGANIC, PLAIN};
    use crate::program::ProgramPath;
    use pretty_assertions::assert_eq;

    fn program(xml: &str, sound_bank: &str) -> FalconProgram {
        let doc = Document::parse(xml, "Bank/Cat/Prog.uvip").unwrap();
        FalconProgram::from_document(doc, ProgramPath::new(sound_bank, "Cat", "Prog")).unwrap()
    }

    fn allocator(replacement: u32) -> CcAllocator {
        CcAllocator::new(
            &[CcRange::new(31, 34), CcRange::new(11, 12)],
            &[CcRange::new(112, 114)],
            replacement,
        )
    }

    fn ccs(program: &FalconProgram) -> Vec<Option<u32>> {
        program
            .macros()
            .iter()
            .map(|m| m.cc_no(program.document()).unwrap())
            .collect()
    }

    #[test]
    fn test_update_macro_ccs_by_style() {
        let mut program = program(PLAIN, "Bank");
        let mut cursor = CcCursor::default();
        let outcome = program
            .update_macro_ccs(&allocator(0), &mut cursor, 30)
            .unwrap();
        assert_eq!(outcome, EditOutcome::Changed);
        assert_eq!(ccs(&program), vec![Some(11), Some(12), Some(112)]);

        let mut cursor = CcCursor::default();
        let outcome = program
            .update_macro_ccs(&allocator(0), &mut cursor, 30)
            .unwrap();
        assert_eq!(outcome, EditOutcome::Unchanged);
    }

    #[test]
    fn test_update_skips_replacement_cc() {
        let mut program = program(PLAIN, "Bank");
        let allocator = CcAllocator::new(&[CcRange::new(31, 34)], &[CcRange::new(112, 114)], 32);
        let mut cursor = CcCursor::default();
        program.update_macro_ccs(&allocator, &mut cursor, 30).unwrap();
        assert_eq!(ccs(&program), vec![Some(31), Some(33), Some(112)]);
    }

    #[test]
    fn test_reuse_cc1_requires_replacement_in_use() {
        let mut program = program(PLAIN, "Bank");
        let mut cursor = CcCursor::default();
        let outcome = program.reuse_cc1(&allocator(33), &mut cursor, 30).unwrap();
        assert!(matches!(outcome, EditOutcome::Skipped(_)));
    }

    #[test]
    fn test_reuse_cc1_gives_cc1_to_macro_after_replacement() {
        let mut program = program(PLAIN, "Bank");
        let allocator = CcAllocator::new(&[CcRange::new(31, 34)], &[CcRange::new(112, 114)], 32);
        assert_eq!(
            program.replace_mod_wheel_with_macro(&allocator, 30).unwrap(),
            EditOutcome::Changed
        );

        let mut cursor = CcCursor::default();
        let outcome = program.reuse_cc1(&allocator, &mut cursor, 30).unwrap();
        assert_eq!(outcome, EditOutcome::Changed);
        assert_eq!(ccs(&program), vec![Some(31), Some(1), Some(112), Some(32)]);

        let doc = program.document();
        let cc1_modulations = program
            .all_modulations()
            .into_iter()
            .filter(|modulation| modulation.cc_no(doc).unwrap() == Some(1))
            .count();
        assert_eq!(cc1_modulations, 1);
    }

    #[test]
    fn test_reuse_cc1_skipped_while_mod_wheel_still_mapped() {
        let mut program = program(PLAIN, "Bank");
        let allocator = CcAllocator::new(&[CcRange::new(31, 34)], &[CcRange::new(112, 114)], 32);
        let wheel = program
            .add_macro(WHEEL_DISPLAY_NAME, MacroStyle::Continuous, 120, 213)
            .unwrap();
        let templates = program.templates().clone();
        wheel
            .change_cc_no(program.document_mut(), &templates, 32)
            .unwrap();
        let before = ccs(&program);

        let mut cursor = CcCursor::default();
        let outcome = program.reuse_cc1(&allocator, &mut cursor, 30).unwrap();
        assert!(matches!(outcome, EditOutcome::Skipped(_)));
        assert_eq!(ccs(&program), before);
    }

    #[test]
    fn test_change_macro_cc_no() {
        let mut program = program(PLAIN, "Bank");
        let mut cursor = CcCursor::default();
        program
            .update_macro_ccs(&allocator(0), &mut cursor, 30)
            .unwrap();
        assert_eq!(
            program.change_macro_cc_no(12, 40).unwrap(),
            EditOutcome::Changed
        );
        assert_eq!(ccs(&program), vec![Some(11), Some(40), Some(112)]);
        assert_eq!(
            program.change_macro_cc_no(99, 41).unwrap(),
            EditOutcome::Unchanged
        );
        // The program's own CC 1 mapping does not target a macro.
        assert_eq!(
            program.change_macro_cc_no(1, 2).unwrap(),
            EditOutcome::Unchanged
        );
    }

    #[test]
    fn test_script_placeholders_and_organic_correction() {
        let mut program = program(ORGANIC, "Organic");
        let mut cursor = CcCursor::default();
        let outcome = program
            .update_macro_ccs(&allocator(0), &mut cursor, 30)
            .unwrap();
        assert_eq!(outcome, EditOutcome::Changed);
        let processor = program.info_page_script_processor().unwrap();
        let sources: Vec<String> = processor
            .modulations(program.document())
            .iter()
            .map(|m| m.source(program.document()).unwrap().to_string())
            .collect();
        // Macro3 would be CC 112 but holds a continuous macro.
        assert_eq!(
            sources,
            vec!["@MIDI CC 11", "@MIDI CC 12", "@MIDI CC 31"]
        );
        // Macros on a script-driven page get no CC mappings of their own.
        assert_eq!(ccs(&program), vec![None, None, None]);
    }

    #[test]
    fn test_organic_toggle_kept_for_bypass_macro() {
        let xml = ORGANIC.replace("DisplayName=\"Motion\" Style=\"0\"", "DisplayName=\"Bypass\" Style=\"1\"");
        let mut program = program(&xml, "Organic");
        let mut cursor = CcCursor::default();
        program
            .update_macro_ccs(&allocator(0), &mut cursor, 30)
            .unwrap();
        let processor = program.info_page_script_processor().unwrap();
        let third = processor.modulations(program.document())[2];
        assert_eq!(third.cc_no(program.document()).unwrap(), Some(112));
    }
}
