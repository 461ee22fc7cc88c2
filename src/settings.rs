//! Converter settings.
//!
//! Settings are stored as JSON. Every field has a default so a partial file
//! loads; whether the values are usable is checked per task by
//! [`Settings::validate_for`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::batch::task::TaskKind;
use crate::cc::{CcAllocator, CcRange};
use crate::error::{ConverterError, Result};
use crate::program::location::DEFAULT_LOCATION_TOLERANCE;

/// Default settings file name.
pub const SETTINGS_FILE: &str = "settings.json";

/// Extension of Falcon program files.
pub const DEFAULT_PROGRAM_EXTENSION: &str = "uvip";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the sound bank / category / program folder tree to convert.
    pub programs_folder: PathBuf,

    /// Untouched copy of the program tree, used by RestoreOriginal.
    pub original_programs_folder: PathBuf,

    /// CC that takes over from the mod wheel; 0 when not configured.
    pub mod_wheel_replacement_cc_no: u32,

    /// CC numbers for continuous macros.
    pub continuous_cc_ranges: Vec<CcRange>,

    /// CC numbers for toggle macros.
    pub toggle_cc_ranges: Vec<CcRange>,

    /// Height of the band within which macros count as one row.
    pub location_tolerance: i64,

    /// Extension of program files, without the dot.
    pub program_file_extension: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            programs_folder: PathBuf::new(),
            original_programs_folder: PathBuf::new(),
            mod_wheel_replacement_cc_no: 0,
            continuous_cc_ranges: Vec::new(),
            toggle_cc_ranges: Vec::new(),
            location_tolerance: DEFAULT_LOCATION_TOLERANCE,
            program_file_extension: DEFAULT_PROGRAM_EXTENSION.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ConverterError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = fs::read_to_string(path).map_err(|e| ConverterError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Save settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConverterError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn cc_allocator(&self) -> CcAllocator {
        CcAllocator::new(
            &self.continuous_cc_ranges,
            &self.toggle_cc_ranges,
            self.mod_wheel_replacement_cc_no,
        )
    }

    /// Check that the settings a task depends on are usable.
    pub fn validate_for(&self, kind: TaskKind) -> Result<()> {
        if self.program_file_extension.is_empty() {
            return Err(ConverterError::settings("program file extension is not set"));
        }
        if kind == TaskKind::RestoreOriginal {
            if self.original_programs_folder.as_os_str().is_empty() {
                return Err(ConverterError::settings(
                    "original programs folder is not set",
                ));
            }
        } else if self.programs_folder.as_os_str().is_empty() {
            return Err(ConverterError::settings("programs folder is not set"));
        }
        if kind.allocates_ccs() {
            self.validate_ranges("continuous", &self.continuous_cc_ranges)?;
            self.validate_ranges("toggle", &self.toggle_cc_ranges)?;
        }
        if kind.needs_mod_wheel_replacement() && self.mod_wheel_replacement_cc_no <= 1 {
            return Err(ConverterError::settings(format!(
                "{} requires a mod wheel replacement CC number greater than 1",
                kind
            )));
        }
        if self.location_tolerance < 0 {
            return Err(ConverterError::settings("location tolerance is negative"));
        }
        Ok(())
    }

    fn validate_ranges(&self, label: &str, ranges: &[CcRange]) -> Result<()> {
        if ranges.is_empty() {
            return Err(ConverterError::settings(format!(
                "no {} CC ranges are configured",
                label
            )));
        }
        if let Some(range) = ranges.iter().find(|r| r.start > r.end || r.start == 0) {
            return Err(ConverterError::settings(format!(
                "{} CC range {}-{} is invalid",
                label, range.start, range.end
            )));
        }
        Ok(())
    }
}
