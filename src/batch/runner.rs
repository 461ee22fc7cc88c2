//! Batch execution.
//!
//! A run walks sound banks, categories and programs for each task in
//! sequence. Failures are contained per program: expected errors are logged
//! as one line, anything else as a delimited diagnostic block, and the run
//! carries on. Cancellation is observed between programs only.

use std::backtrace::Backtrace;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::cc::{CcAllocator, CcCursor};
use crate::error::{ConverterError, Result};
use crate::program::{EditOutcome, FalconProgram, ProgramPath};
use crate::services::{DocumentService, FileSystemService, LocalFileSystem, XmlDocumentService};
use crate::settings::Settings;

use super::actions;
use super::log::BatchLog;
use super::script::BatchScript;
use super::task::{BatchTask, TaskKind};

/// Delimiter around unexpected error reports.
const ERROR_BLOCK_DELIMITER: &str = "##########################################";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Shared flag asking a run to stop before its next program.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub state: RunState,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
    pub programs_processed: usize,
    pub programs_saved: usize,
    pub expected_errors: usize,
    pub unexpected_errors: usize,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            state: RunState::Idle,
            started: None,
            ended: None,
            programs_processed: 0,
            programs_saved: 0,
            expected_errors: 0,
            unexpected_errors: 0,
        }
    }
}

/// Whether iteration should go on after a program.
enum Flow {
    Continue,
    Cancelled,
}

/// The batch engine.
pub struct Batch {
    settings: Settings,
    file_system: Box<dyn FileSystemService>,
    documents: Box<dyn DocumentService>,
    log: Box<dyn BatchLog>,
    token: CancellationToken,
    summary: RunSummary,
}

impl Batch {
    pub fn new(settings: Settings, log: Box<dyn BatchLog>) -> Self {
        Self {
            settings,
            file_system: Box::new(LocalFileSystem),
            documents: Box::new(XmlDocumentService),
            log,
            token: CancellationToken::new(),
            summary: RunSummary::default(),
        }
    }

    pub fn with_file_system(mut self, file_system: Box<dyn FileSystemService>) -> Self {
        self.file_system = file_system;
        self
    }

    pub fn with_document_service(mut self, documents: Box<dyn DocumentService>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Token that cancels this batch's runs.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn state(&self) -> RunState {
        self.summary.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Run a single task as a one-task batch.
    pub fn run_task(&mut self, task: BatchTask) -> RunSummary {
        self.run_script(&BatchScript::new(vec![task]))
    }

    /// Validate, sequence and run every task of `script`.
    pub fn run_script(&mut self, script: &BatchScript) -> RunSummary {
        let started = Utc::now();
        self.summary = RunSummary {
            state: RunState::Running,
            started: Some(started),
            ..RunSummary::default()
        };
        self.log.run_beginning(started);

        self.summary.state = match self.run_tasks(script) {
            Ok(Flow::Continue) => RunState::Completed,
            Ok(Flow::Cancelled) => RunState::Cancelled,
            Err(e) => {
                self.log.write_line(&e.to_string());
                warn!("Batch failed: {}", e);
                RunState::Failed
            }
        };

        let ended = Utc::now();
        self.summary.ended = Some(ended);
        self.log.run_ended(ended);
        debug!("Batch summary: {:?}", self.summary);
        self.summary.clone()
    }

    fn run_tasks(&mut self, script: &BatchScript) -> Result<Flow> {
        script.validate()?;
        let tasks = script.sequenced();
        for task in &tasks {
            self.settings.validate_for(task.kind)?;
        }
        let allocator = self.settings.cc_allocator();
        for task in tasks {
            self.log.write_line(&format!("Task: {}", task));
            match self.run_one(&task, &allocator) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Cancelled) => return Ok(Flow::Cancelled),
                Err(e) => self.report_error(&task.to_string(), &e),
            }
        }
        Ok(Flow::Continue)
    }

    /// Folders or files under `parent`: all of them, or the pinned one.
    fn scoped_folders(&self, parent: &Path, pinned: &str) -> Result<Vec<PathBuf>> {
        if pinned.is_empty() {
            return self.file_system.subfolders(parent);
        }
        let folder = parent.join(pinned);
        if !self.file_system.folder_exists(&folder) {
            return Err(ConverterError::FolderNotFound { path: folder });
        }
        Ok(vec![folder])
    }

    fn scoped_files(&self, category: &Path, pinned: &str) -> Result<Vec<PathBuf>> {
        let extension = &self.settings.program_file_extension;
        if pinned.is_empty() {
            return self.file_system.files(category, extension);
        }
        let file = category.join(format!("{}.{}", pinned, extension));
        if !self.file_system.file_exists(&file) {
            return Err(ConverterError::FileNotFound { path: file });
        }
        Ok(vec![file])
    }

    fn task_root(&self, kind: TaskKind) -> &Path {
        if kind == TaskKind::RestoreOriginal {
            &self.settings.original_programs_folder
        } else {
            &self.settings.programs_folder
        }
    }

    fn run_one(&mut self, task: &BatchTask, allocator: &CcAllocator) -> Result<Flow> {
        let root = self.task_root(task.kind).to_path_buf();
        if !self.file_system.folder_exists(&root) {
            return Err(ConverterError::FolderNotFound { path: root });
        }
        for sound_bank in self.scoped_folders(&root, &task.sound_bank)? {
            for category in self.scoped_folders(&sound_bank, &task.category)? {
                for file in self.scoped_files(&category, &task.program)? {
                    if self.token.is_cancelled() {
                        self.log.cancel_requested();
                        return Ok(Flow::Cancelled);
                    }
                    self.summary.programs_processed += 1;
                    let program_path = ProgramPath::from_file(&file);
                    if let Err(e) = self.process_program(task, &file, &root, allocator) {
                        self.report_error(&program_path.to_string(), &e);
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn process_program(
        &mut self,
        task: &BatchTask,
        file: &Path,
        root: &Path,
        allocator: &CcAllocator,
    ) -> Result<()> {
        let program_path = ProgramPath::from_file(file);
        if task.kind == TaskKind::RestoreOriginal {
            let relative = file
                .strip_prefix(root)
                .map_err(|e| ConverterError::Internal(e.to_string()))?;
            let target = self.settings.programs_folder.join(relative);
            self.file_system.copy_file(file, &target)?;
            self.log.write_line(&format!("{}: restored", program_path));
            return Ok(());
        }

        let doc = self.documents.load(file)?;
        let mut program = FalconProgram::from_document(doc, program_path.clone())?;
        let mut cursor = CcCursor::default();
        let output = actions::apply(task, &mut program, &self.settings, allocator, &mut cursor)?;
        if let Some(report) = &output.report {
            self.log.write_line(report);
        }
        match output.outcome {
            EditOutcome::Changed if !task.kind.is_query() => {
                self.documents.save(program.document(), file)?;
                self.summary.programs_saved += 1;
                self.log.write_line(&format!("{}: updated", program_path));
            }
            EditOutcome::Skipped(reason) => {
                self.log
                    .write_line(&format!("{}: skipped: {}", program_path, reason));
            }
            _ => debug!("{}: {} made no change", program_path, task.kind),
        }
        Ok(())
    }

    fn report_error(&mut self, context: &str, e: &ConverterError) {
        if e.is_expected() {
            self.summary.expected_errors += 1;
            warn!("{}: {}", context, e);
            self.log.write_line(&format!("{}: {}", context, e));
        } else {
            self.summary.unexpected_errors += 1;
            error!("Unexpected error in {}: {:?}", context, e);
            self.log.write_line(ERROR_BLOCK_DELIMITER);
            self.log
                .write_line(&format!("Unexpected error in {}", context));
            self.log
                .write_line(&format!("{}: {}", e.error_code(), e));
            self.log.write_line(&format!("{:?}", e));
            self.log.write_line("Backtrace:");
            let backtrace = Backtrace::capture();
            for line in backtrace.to_string().lines() {
                self.log.write_line(line);
            }
            self.log.write_line(ERROR_BLOCK_DELIMITER);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::log::MemoryBatchLog;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
        token.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn test_invalid_settings_fail_the_run() {
        let log = MemoryBatchLog::new();
        let mut batch = Batch::new(Settings::default(), Box::new(log.clone()));
        let summary = batch.run_task(BatchTask::new(TaskKind::QueryCountMacros));
        assert_eq!(summary.state, RunState::Failed);
        assert!(log.contains("programs folder is not set"));
        assert!(summary.started.is_some() && summary.ended.is_some());
    }

    #[test]
    fn test_summary_serializes() {
        let summary = RunSummary {
            state: RunState::Completed,
            programs_processed: 2,
            ..RunSummary::default()
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"state\":\"Completed\""));
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
