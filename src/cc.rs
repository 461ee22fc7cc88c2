//! MIDI CC allocation for macros.
//!
//! Continuous and toggle macros draw CC numbers from two configured lists.
//! A per-document [`CcCursor`] remembers the last number handed out from
//! each list, so numbers are unique and increasing within one program.
//! When a list runs out, allocation carries on by incrementing.

use serde::{Deserialize, Serialize};

use crate::program::modulation::{ModulationSource, MOD_WHEEL_CC};

/// An inclusive range of CC numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CcRange {
    pub start: u32,
    pub end: u32,
}

impl CcRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// Flatten ranges into an ascending list without repeats.
pub fn flatten_ranges(ranges: &[CcRange]) -> Vec<u32> {
    let mut ccs: Vec<u32> = ranges.iter().flat_map(|r| r.start..=r.end).collect();
    ccs.sort_unstable();
    ccs.dedup();
    ccs
}

/// The CC following `prev` in `list`.
///
/// `0` means nothing has been allocated yet and yields the first entry.
/// When `prev` is the last entry or not in the list, the result is
/// `prev + 1`.
pub fn next_after(prev: u32, list: &[u32]) -> u32 {
    if prev == 0 {
        return list.first().copied().unwrap_or(1);
    }
    match list.iter().position(|&cc| cc == prev) {
        Some(i) if i + 1 < list.len() => list[i + 1],
        _ => prev + 1,
    }
}

/// The `index`th (1-based) configured CC, continuing past the end of the
/// list by the shortfall.
pub fn nth_cc(index: usize, list: &[u32]) -> Option<u32> {
    if index == 0 {
        return None;
    }
    match list.get(index - 1) {
        Some(&cc) => Some(cc),
        None => {
            let last = list.last().copied().unwrap_or(0);
            Some(last + (index - list.len()) as u32)
        }
    }
}

/// Last CCs handed out within one document. Start each document from
/// `CcCursor::default()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CcCursor {
    pub continuous: u32,
    pub toggle: u32,
}

impl CcCursor {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Allocation policy built from the configured CC lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcAllocator {
    continuous: Vec<u32>,
    toggle: Vec<u32>,
    mod_wheel_replacement: u32,
}

impl CcAllocator {
    pub fn new(
        continuous_ranges: &[CcRange],
        toggle_ranges: &[CcRange],
        mod_wheel_replacement_cc: u32,
    ) -> Self {
        Self {
            continuous: flatten_ranges(continuous_ranges),
            toggle: flatten_ranges(toggle_ranges),
            mod_wheel_replacement: mod_wheel_replacement_cc,
        }
    }

    pub fn continuous_ccs(&self) -> &[u32] {
        &self.continuous
    }

    pub fn toggle_ccs(&self) -> &[u32] {
        &self.toggle
    }

    /// The CC that replaces the mod wheel, when one is configured.
    pub fn mod_wheel_replacement_cc(&self) -> Option<u32> {
        (self.mod_wheel_replacement > MOD_WHEEL_CC).then_some(self.mod_wheel_replacement)
    }

    /// Next continuous CC.
    ///
    /// With a mod wheel replacement CC `R` configured, the wheel (1) is
    /// followed by the successor of `R`; and when `reuse_cc1` is set, `R`
    /// is followed by 1.
    pub fn next_continuous(&self, cursor: &mut CcCursor, reuse_cc1: bool) -> u32 {
        let prev = cursor.continuous;
        let next = match self.mod_wheel_replacement_cc() {
            Some(replacement) if prev == MOD_WHEEL_CC => next_after(replacement, &self.continuous),
            Some(replacement) if reuse_cc1 && prev == replacement => MOD_WHEEL_CC,
            _ => next_after(prev, &self.continuous),
        };
        cursor.continuous = next;
        next
    }

    /// Next toggle CC.
    pub fn next_toggle(&self, cursor: &mut CcCursor) -> u32 {
        let next = next_after(cursor.toggle, &self.toggle);
        cursor.toggle = next;
        next
    }

    /// CC number for an indexed placeholder source, or `None` when the
    /// source is not a placeholder.
    pub fn resolve_placeholder(&self, source: &ModulationSource) -> Option<u32> {
        match source {
            ModulationSource::ContinuousPlaceholder(index) => nth_cc(*index, &self.continuous),
            ModulationSource::TogglePlaceholder(index) => nth_cc(*index, &self.toggle),
            _ => None,
        }
    }

    /// Whether `cc` belongs to the toggle list only.
    pub fn is_toggle_cc(&self, cc: u32) -> bool {
        self.toggle.contains(&cc) && !self.continuous.contains(&cc)
    }
}
