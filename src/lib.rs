//! Falcon Converter - Batch Transformation of Falcon Programs
//!
//! Falcon converter edits the program documents of a sample-playback
//! instrument in bulk: assigning MIDI CCs to macros, laying out Info pages,
//! removing effects and the macros that drive them, and reporting on
//! programs.
//!
//! # Architecture
//!
//! - `document`: arena XML tree with typed attribute access
//! - `program`: macros, modulations, effects and script processors over the tree
//! - `cc`: deterministic MIDI CC allocation
//! - `batch`: task sequencing, per-program error containment and cancellation
//! - `settings` and `services`: configuration and the file-system seams

pub mod batch;
pub mod cc;
pub mod cli;
pub mod document;
pub mod error;
pub mod program;
pub mod services;
pub mod settings;

pub use error::{ConverterError, Result};
