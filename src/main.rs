//! Falcon Converter CLI
//!
//! Command-line interface for batch editing Falcon programs.

use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;
use env_logger::Env;
use log::{info, warn};

use falcon_converter::batch::{BatchTask, CancellationToken, RunState, TaskKind};
use falcon_converter::cli::{commands, Cli, Commands};
use falcon_converter::settings::Settings;

const ERROR_BLOCK_DELIMITER: &str = "##########################################";

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("Falcon Converter v{}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", ERROR_BLOCK_DELIMITER);
            eprintln!("Fatal error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("Caused by: {}", cause);
            }
            eprintln!("{:?}", e);
            eprintln!("{}", ERROR_BLOCK_DELIMITER);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let command = match cli.command {
        Some(command) => command,
        None => {
            println!("Falcon Converter v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            return Ok(());
        }
    };

    match command {
        Commands::ListTasks => commands::list_tasks()?,
        Commands::ShowProgram { file } => commands::show_program(&file)?,
        Commands::RunBatch { script } => {
            let settings = load_settings(&cli.settings)?;
            let summary = commands::run_batch(settings, &script, cancel_on_ctrl_c()?)?;
            check_state(summary.state)?;
        }
        Commands::RunTask {
            task,
            sound_bank,
            category,
            program,
            parameters,
        } => {
            let settings = load_settings(&cli.settings)?;
            let kind: TaskKind = task.parse()?;
            let mut batch_task = BatchTask::new(kind).with_scope(
                sound_bank.unwrap_or_default(),
                category.unwrap_or_default(),
                program.unwrap_or_default(),
            );
            for (name, value) in parameters {
                batch_task = batch_task.with_parameter(name, value);
            }
            let summary = commands::run_task(settings, batch_task, cancel_on_ctrl_c()?)?;
            check_state(summary.state)?;
        }
    }
    Ok(())
}

fn load_settings(path: &std::path::Path) -> anyhow::Result<Settings> {
    Settings::load(path).with_context(|| format!("loading settings from {}", path.display()))
}

/// A token that Ctrl-C sets, so the running batch stops before its next program.
fn cancel_on_ctrl_c() -> anyhow::Result<CancellationToken> {
    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        warn!("Cancel requested");
        handler_token.cancel();
    })
    .context("installing the Ctrl-C handler")?;
    Ok(token)
}

fn check_state(state: RunState) -> anyhow::Result<()> {
    if state == RunState::Failed {
        bail!("batch run failed");
    }
    Ok(())
}
