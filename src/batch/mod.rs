//! Batch Task Engine
//!
//! Runs named tasks over the programs folder tree:
//! - `task`: task kinds, parameters and scope
//! - `script`: batch script loading, validation and sequencing
//! - `actions`: what each task does to one program
//! - `runner`: iteration, error containment and cancellation
//! - `log`: output sinks

pub mod actions;
pub mod log;
pub mod runner;
pub mod script;
pub mod task;

pub use self::log::{BatchLog, ConsoleBatchLog, MemoryBatchLog};
pub use runner::{Batch, CancellationToken, RunState, RunSummary};
pub use script::BatchScript;
pub use task::{BatchTask, TaskKind, TaskParameter};
