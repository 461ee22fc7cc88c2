//! Error types for Falcon program conversion.
//!
//! Errors fall into two classes. Expected errors describe an unsupported or
//! misconfigured input and are reported as a single line; anything else is
//! a latent defect and is reported with full diagnostic context.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for converter operations.
pub type Result<T> = std::result::Result<T, ConverterError>;

/// Errors that can occur while loading, transforming or saving programs.
#[derive(Error, Debug)]
pub enum ConverterError {
    // Document Errors
    #[error("Cannot find attribute '{attribute}' of element '{element}' in '{path}'")]
    MissingAttribute {
        element: String,
        attribute: String,
        path: PathBuf,
    },

    #[error("Cannot find element '{element}' in '{parent}' of '{path}'")]
    MissingElement {
        element: String,
        parent: String,
        path: PathBuf,
    },

    #[error("Attribute '{attribute}' of element '{element}' in '{path}' has invalid value '{value}'")]
    InvalidAttributeValue {
        element: String,
        attribute: String,
        value: String,
        path: PathBuf,
    },

    #[error("Invalid XML in '{path}': {reason}")]
    InvalidXml { path: PathBuf, reason: String },

    // File Errors
    #[error("Cannot find file '{path}'")]
    FileNotFound { path: PathBuf },

    #[error("Cannot find folder '{path}'")]
    FolderNotFound { path: PathBuf },

    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Batch Errors
    #[error("'{name}' is not a valid task name")]
    InvalidTaskName { name: String },

    #[error(
        "Task '{task}' is defined more than once with SoundBank '{sound_bank}', \
         Category '{category}', Program '{program}'"
    )]
    DuplicateTask {
        task: String,
        sound_bank: String,
        category: String,
        program: String,
    },

    #[error("Task '{task}' requires parameter '{parameter}'")]
    MissingTaskParameter { task: String, parameter: String },

    // Layout Errors
    #[error(
        "Macros '{first}' and '{second}' in '{path}' have the same location: \
         '{first}' X={first_x}, Y={first_y}; '{second}' X={second_x}, Y={second_y}"
    )]
    MacroLocationConflict {
        first: String,
        first_x: i64,
        first_y: i64,
        second: String,
        second_x: i64,
        second_y: i64,
        path: PathBuf,
    },

    #[error("{task} is not supported for '{path}': {reason}")]
    NotSupported {
        task: String,
        path: PathBuf,
        reason: String,
    },

    // Settings Errors
    #[error("Settings error: {reason}")]
    Settings { reason: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic Errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConverterError {
    /// Stable identifier for the error variant.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConverterError::MissingAttribute { .. } => "MISSING_ATTRIBUTE",
            ConverterError::MissingElement { .. } => "MISSING_ELEMENT",
            ConverterError::InvalidAttributeValue { .. } => "INVALID_ATTRIBUTE_VALUE",
            ConverterError::InvalidXml { .. } => "INVALID_XML",
            ConverterError::FileNotFound { .. } => "FILE_NOT_FOUND",
            ConverterError::FolderNotFound { .. } => "FOLDER_NOT_FOUND",
            ConverterError::FileReadError { .. } => "FILE_READ_ERROR",
            ConverterError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            ConverterError::InvalidTaskName { .. } => "INVALID_TASK_NAME",
            ConverterError::DuplicateTask { .. } => "DUPLICATE_TASK",
            ConverterError::MissingTaskParameter { .. } => "MISSING_TASK_PARAMETER",
            ConverterError::MacroLocationConflict { .. } => "MACRO_LOCATION_CONFLICT",
            ConverterError::NotSupported { .. } => "NOT_SUPPORTED",
            ConverterError::Settings { .. } => "SETTINGS_ERROR",
            ConverterError::Json(_) => "JSON_ERROR",
            ConverterError::Internal(_) => "INTERNAL_ERROR",
            ConverterError::Io(_) => "IO_ERROR",
        }
    }

    /// Returns true for errors that describe the input rather than a bug.
    ///
    /// The batch engine logs these as one line and carries on.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ConverterError::MissingAttribute { .. }
                | ConverterError::MissingElement { .. }
                | ConverterError::InvalidAttributeValue { .. }
                | ConverterError::FileNotFound { .. }
                | ConverterError::FolderNotFound { .. }
                | ConverterError::InvalidTaskName { .. }
                | ConverterError::DuplicateTask { .. }
                | ConverterError::MissingTaskParameter { .. }
                | ConverterError::MacroLocationConflict { .. }
                | ConverterError::NotSupported { .. }
                | ConverterError::Settings { .. }
        )
    }

    pub(crate) fn settings(reason: impl Into<String>) -> Self {
        ConverterError::Settings {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_attribute_message_names_everything() {
        let err = ConverterError::MissingAttribute {
            element: "ConstantModulation".to_string(),
            attribute: "Style".to_string(),
            path: PathBuf::from("/banks/Pulsar/Bass/Big Bass.uvip"),
        };
        let message = err.to_string();
        assert!(message.contains("ConstantModulation"));
        assert!(message.contains("Style"));
        assert!(message.contains("Big Bass.uvip"));
        assert_eq!(err.error_code(), "MISSING_ATTRIBUTE");
    }

    #[test]
    fn test_expected_classification() {
        assert!(ConverterError::InvalidTaskName {
            name: "Nope".to_string()
        }
        .is_expected());
        assert!(ConverterError::settings("no programs folder").is_expected());
        assert!(!ConverterError::Internal("oops".to_string()).is_expected());
        assert!(!ConverterError::InvalidXml {
            path: PathBuf::from("a.uvip"),
            reason: "truncated".to_string()
        }
        .is_expected());
    }
}
