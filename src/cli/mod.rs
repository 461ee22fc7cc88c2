//! CLI Module
//!
//! Command-line interface for the Falcon program converter.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::settings::SETTINGS_FILE;

/// Falcon Program Converter - batch edits for Falcon program files
#[derive(Parser, Debug)]
#[command(name = "falcon-converter-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Settings file
    #[arg(short, long, global = true, default_value = SETTINGS_FILE)]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a batch script
    #[command(name = "run-batch")]
    RunBatch {
        /// Path to the batch script
        script: PathBuf,
    },

    /// Run a single task
    #[command(name = "run-task")]
    RunTask {
        /// Task name, e.g. UpdateMacroCcs
        task: String,

        /// Limit the task to one sound bank
        #[arg(long)]
        sound_bank: Option<String>,

        /// Limit the task to one category
        #[arg(long)]
        category: Option<String>,

        /// Limit the task to one program
        #[arg(long)]
        program: Option<String>,

        /// Task parameter as NAME=VALUE
        #[arg(long = "param", value_parser = parse_parameter)]
        parameters: Vec<(String, String)>,
    },

    /// List task names in execution priority order
    #[command(name = "list-tasks")]
    ListTasks,

    /// Print a program's macros and script dialect
    #[command(name = "show-program")]
    ShowProgram {
        /// Path to the program file
        file: PathBuf,
    },
}

fn parse_parameter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("'{}' is not NAME=VALUE", raw)),
    }
}
