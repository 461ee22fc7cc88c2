//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use log::info;

use crate::batch::task::ALL_TASKS;
use crate::batch::{Batch, BatchScript, BatchTask, CancellationToken, ConsoleBatchLog, RunSummary};
use crate::error::Result;
use crate::program::FalconProgram;
use crate::settings::Settings;

/// Run a batch script.
pub fn run_batch(settings: Settings, script: &Path, token: CancellationToken) -> Result<RunSummary> {
    info!("Running batch script: {}", script.display());

    let script = BatchScript::load(script)?;
    let mut batch = Batch::new(settings, Box::new(ConsoleBatchLog)).with_cancellation_token(token);
    let summary = batch.run_script(&script);
    print_summary(&summary);

    Ok(summary)
}

/// Run one task as a one-task batch.
pub fn run_task(settings: Settings, task: BatchTask, token: CancellationToken) -> Result<RunSummary> {
    info!("Running task: {}", task);

    let mut batch = Batch::new(settings, Box::new(ConsoleBatchLog)).with_cancellation_token(token);
    let summary = batch.run_task(task);
    print_summary(&summary);

    Ok(summary)
}

/// List task names in execution priority order.
pub fn list_tasks() -> Result<()> {
    for kind in ALL_TASKS {
        match kind.priority() {
            Some(rank) => println!("{:>2}. {}", rank + 1, kind),
            None => println!("    {}", kind),
        }
    }
    Ok(())
}

/// Print a program's macros and script dialect.
pub fn show_program(file: &Path) -> Result<()> {
    info!("Showing program: {}", file.display());

    let program = FalconProgram::load(file)?;
    let doc = program.document();

    println!("Program: {}", program.path());
    println!("Script dialect: {}", program.dialect());
    println!("Macros: {}", program.macro_count());
    for m in program.macros() {
        let cc = match m.cc_no(doc)? {
            Some(cc) => format!("CC {}", cc),
            None => "-".to_string(),
        };
        println!(
            "  {:<10} {:<20} {:<10} x={:<5} y={:<5} {}",
            m.name(doc)?,
            m.display_name(doc)?,
            format!("{:?}", m.style(doc)?),
            m.x(doc)?,
            m.y(doc)?,
            cc
        );
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("State: {:?}", summary.state);
    println!("Programs processed: {}", summary.programs_processed);
    println!("Programs saved: {}", summary.programs_saved);
    if summary.expected_errors + summary.unexpected_errors > 0 {
        println!(
            "Errors: {} expected, {} unexpected",
            summary.expected_errors, summary.unexpected_errors
        );
    }
}
