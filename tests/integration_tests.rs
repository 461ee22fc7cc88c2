//! Integration Tests
//!
//! End-to-end batch runs over program folders on disk.

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use tempfile::{tempdir, TempDir};

use falcon_converter::batch::{
    Batch, BatchScript, BatchTask, CancellationToken, MemoryBatchLog, RunState, TaskKind,
};
use falcon_converter::cc::CcRange;
use falcon_converter::document::Document;
use falcon_converter::program::FalconProgram;
use falcon_converter::services::{DocumentService, XmlDocumentService};
use falcon_converter::settings::Settings;
use falcon_converter::Result;

const ONE_MACRO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<UVI4>
    <Program Name="Lead" Bypass="0">
        <ControlSignalSources>
            <ConstantModulation Name="Macro 1" Bypass="0" DisplayName="Cutoff" Style="0" Value="0.5" Bipolar="0">
                <Properties showValue="0" x="20" y="118"/>
            </ConstantModulation>
        </ControlSignalSources>
    </Program>
</UVI4>
"#;

const NO_STYLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<UVI4>
    <Program Name="Broken" Bypass="0">
        <ControlSignalSources>
            <ConstantModulation Name="Macro 1" Bypass="0" DisplayName="Cutoff" Value="0.5" Bipolar="0">
                <Properties showValue="0" x="20" y="118"/>
            </ConstantModulation>
        </ControlSignalSources>
    </Program>
</UVI4>
"#;

const NOT_XML: &str = "<UVI4><Program></UVI4>";

/// Programs folder and original programs folder under one temp dir.
struct Fixture {
    _dir: TempDir,
    programs: PathBuf,
    originals: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let programs = dir.path().join("Programs");
        let originals = dir.path().join("Originals");
        fs::create_dir_all(&programs).unwrap();
        fs::create_dir_all(&originals).unwrap();
        Self {
            _dir: dir,
            programs,
            originals,
        }
    }

    fn add(&self, root: &Path, bank: &str, category: &str, name: &str, xml: &str) -> PathBuf {
        let folder = root.join(bank).join(category);
        fs::create_dir_all(&folder).unwrap();
        let file = folder.join(format!("{}.uvip", name));
        fs::write(&file, xml).unwrap();
        file
    }

    fn add_program(&self, bank: &str, category: &str, name: &str, xml: &str) -> PathBuf {
        self.add(&self.programs, bank, category, name, xml)
    }

    fn settings(&self) -> Settings {
        Settings {
            programs_folder: self.programs.clone(),
            original_programs_folder: self.originals.clone(),
            continuous_cc_ranges: vec![CcRange::new(10, 12)],
            toggle_cc_ranges: vec![CcRange::new(112, 127)],
            mod_wheel_replacement_cc_no: 34,
            ..Settings::default()
        }
    }

    fn batch(&self, log: &MemoryBatchLog) -> Batch {
        Batch::new(self.settings(), Box::new(log.clone()))
    }
}

fn macro_sources(file: &Path) -> Vec<(String, String)> {
    let doc = Document::load(file).unwrap();
    doc.descendants_named(doc.root(), "SignalConnection")
        .into_iter()
        .map(|node| {
            (
                doc.attribute(node, "Source").unwrap_or("").to_string(),
                doc.attribute(node, "Destination").unwrap_or("").to_string(),
            )
        })
        .collect()
}

// === End-to-end ===

#[test]
fn test_update_macro_ccs_assigns_first_continuous_cc() {
    let fixture = Fixture::new();
    let file = fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();

    let summary = fixture
        .batch(&log)
        .run_task(BatchTask::new(TaskKind::UpdateMacroCcs));

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.programs_processed, 1);
    assert_eq!(summary.programs_saved, 1);
    assert_eq!(
        macro_sources(&file),
        vec![("@MIDI CC 10".to_string(), "Value".to_string())]
    );
    assert!(log.contains("Pulsar\\Leads\\Lead: updated"));

    let saved = fs::read_to_string(&file).unwrap();
    assert!(saved.starts_with("<?xml"));
    assert!(saved.contains("\n        <ControlSignalSources>"));
}

#[test]
fn test_cursor_restarts_for_each_program() {
    let fixture = Fixture::new();
    let first = fixture.add_program("Pulsar", "Leads", "A", ONE_MACRO);
    let second = fixture.add_program("Pulsar", "Leads", "B", ONE_MACRO);
    let log = MemoryBatchLog::new();

    fixture
        .batch(&log)
        .run_task(BatchTask::new(TaskKind::UpdateMacroCcs));

    assert_eq!(macro_sources(&first)[0].0, "@MIDI CC 10");
    assert_eq!(macro_sources(&second)[0].0, "@MIDI CC 10");
}

#[test]
fn test_batch_script_runs_in_priority_order() {
    let fixture = Fixture::new();
    let file = fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let script_file = fixture.programs.join("batch.xml");
    fs::write(
        &script_file,
        r#"<Tasks>
    <Task Name="QueryCountMacros" SoundBank="" Category="" Program=""/>
    <Task Name="UpdateMacroCcs" SoundBank="Pulsar" Category="" Program=""/>
    <Task Name="PrependPathLineToDescription" SoundBank="" Category="" Program=""/>
</Tasks>"#,
    )
    .unwrap();
    let log = MemoryBatchLog::new();

    let script = BatchScript::load(&script_file).unwrap();
    let summary = fixture.batch(&log).run_script(&script);

    assert_eq!(summary.state, RunState::Completed);
    let tasks: Vec<String> = log
        .lines()
        .into_iter()
        .filter(|line| line.starts_with("Task: "))
        .collect();
    assert_eq!(
        tasks,
        vec![
            "Task: PrependPathLineToDescription",
            "Task: UpdateMacroCcs (Pulsar)",
            "Task: QueryCountMacros",
        ]
    );
    assert!(log.contains("Pulsar\\Leads\\Lead has 1 macros"));

    let program = FalconProgram::load(&file).unwrap();
    assert_eq!(program.description(), "Pulsar\\Leads\\Lead");
    assert_eq!(
        program.macros()[0].cc_no(program.document()).unwrap(),
        Some(10)
    );
}

#[test]
fn test_query_never_saves() {
    let fixture = Fixture::new();
    let file = fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();

    let summary = fixture
        .batch(&log)
        .run_task(BatchTask::new(TaskKind::QueryCountMacros));

    assert_eq!(summary.programs_saved, 0);
    assert_eq!(fs::read_to_string(&file).unwrap(), ONE_MACRO);
}

#[test]
fn test_scope_limits_programs() {
    let fixture = Fixture::new();
    fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    fixture.add_program("Pulsar", "Pads", "Pad", ONE_MACRO);
    fixture.add_program("Titan", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();

    let summary = fixture.batch(&log).run_task(
        BatchTask::new(TaskKind::QueryCountMacros).with_scope("Pulsar", "Pads", ""),
    );

    assert_eq!(summary.programs_processed, 1);
    assert!(log.contains("Pulsar\\Pads\\Pad has 1 macros"));
    assert!(!log.contains("Titan"));
}

#[test]
fn test_restore_original_copies_files() {
    let fixture = Fixture::new();
    let original = ONE_MACRO.replace("Cutoff", "Original");
    fixture.add(&fixture.originals, "Pulsar", "Leads", "Lead", &original);
    let file = fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();

    let summary = fixture
        .batch(&log)
        .run_task(BatchTask::new(TaskKind::RestoreOriginal));

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(fs::read_to_string(&file).unwrap(), original);
}

// === Error containment ===

#[test]
fn test_expected_error_is_one_line_and_run_continues() {
    let fixture = Fixture::new();
    fixture.add_program("Pulsar", "Leads", "A Broken", NO_STYLE);
    let good = fixture.add_program("Pulsar", "Leads", "B Good", ONE_MACRO);
    let log = MemoryBatchLog::new();

    let summary = fixture
        .batch(&log)
        .run_task(BatchTask::new(TaskKind::UpdateMacroCcs));

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.programs_processed, 2);
    assert_eq!(summary.expected_errors, 1);
    assert_eq!(summary.unexpected_errors, 0);
    assert!(log.contains("Pulsar\\Leads\\A Broken: Cannot find attribute 'Style'"));
    assert!(!log.contains("#####"));
    assert_eq!(macro_sources(&good)[0].0, "@MIDI CC 10");
}

#[test]
fn test_unexpected_error_is_delimited_and_run_continues() {
    let fixture = Fixture::new();
    fixture.add_program("Pulsar", "Leads", "A Corrupt", NOT_XML);
    fixture.add_program("Pulsar", "Leads", "B Good", ONE_MACRO);
    let log = MemoryBatchLog::new();

    let summary = fixture
        .batch(&log)
        .run_task(BatchTask::new(TaskKind::UpdateMacroCcs));

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.unexpected_errors, 1);
    assert_eq!(summary.programs_saved, 1);
    assert!(log.contains("#####"));
    assert!(log.contains("INVALID_XML"));
    assert!(log.contains("Unexpected error in Pulsar\\Leads\\A Corrupt"));

    let lines = log.lines();
    let backtrace = lines.iter().position(|line| line == "Backtrace:").unwrap();
    let block_end = lines.iter().rposition(|line| line.starts_with("#####")).unwrap();
    assert!(backtrace < block_end);
}

#[test]
fn test_missing_scope_folder_is_reported() {
    let fixture = Fixture::new();
    let log = MemoryBatchLog::new();

    let summary = fixture.batch(&log).run_task(
        BatchTask::new(TaskKind::QueryCountMacros).with_scope("Nowhere", "", ""),
    );

    assert_eq!(summary.state, RunState::Completed);
    assert_eq!(summary.expected_errors, 1);
    assert!(log.contains("Cannot find folder"));
}

#[test]
fn test_duplicate_tasks_fail_before_running() {
    let fixture = Fixture::new();
    let file = fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();
    let script = BatchScript::new(vec![
        BatchTask::new(TaskKind::UpdateMacroCcs),
        BatchTask::new(TaskKind::UpdateMacroCcs),
    ]);

    let summary = fixture.batch(&log).run_script(&script);

    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(summary.programs_processed, 0);
    assert!(log.contains("defined more than once"));
    assert_eq!(fs::read_to_string(&file).unwrap(), ONE_MACRO);
}

// === Cancellation ===

#[test]
fn test_settings_checked_for_every_task_before_running() {
    let fixture = Fixture::new();
    let file = fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();
    let settings = Settings {
        mod_wheel_replacement_cc_no: 0,
        ..fixture.settings()
    };
    let script = BatchScript::new(vec![
        BatchTask::new(TaskKind::PrependPathLineToDescription),
        BatchTask::new(TaskKind::ReplaceModWheelWithMacro),
    ]);

    let summary = Batch::new(settings, Box::new(log.clone())).run_script(&script);

    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(summary.programs_processed, 0);
    assert!(!log.contains("Task: "));
    assert_eq!(fs::read_to_string(&file).unwrap(), ONE_MACRO);
}

#[test]
fn test_cancelled_before_first_program() {
    let fixture = Fixture::new();
    fixture.add_program("Pulsar", "Leads", "Lead", ONE_MACRO);
    let log = MemoryBatchLog::new();
    let mut batch = fixture.batch(&log);
    batch.cancellation_token().cancel();

    let summary = batch.run_task(BatchTask::new(TaskKind::UpdateMacroCcs));

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.programs_processed, 0);
    assert!(log.contains("Run cancelled"));
}

/// Loads documents and requests cancellation while doing so.
struct CancellingDocuments {
    token: CancellationToken,
}

impl DocumentService for CancellingDocuments {
    fn load(&self, path: &Path) -> Result<Document> {
        self.token.cancel();
        XmlDocumentService.load(path)
    }

    fn save(&self, document: &Document, path: &Path) -> Result<()> {
        XmlDocumentService.save(document, path)
    }
}

#[test]
fn test_cancel_takes_effect_between_programs() {
    let fixture = Fixture::new();
    let first = fixture.add_program("Pulsar", "Leads", "A", ONE_MACRO);
    let second = fixture.add_program("Pulsar", "Leads", "B", ONE_MACRO);
    let log = MemoryBatchLog::new();
    let token = CancellationToken::new();
    let mut batch = fixture
        .batch(&log)
        .with_cancellation_token(token.clone())
        .with_document_service(Box::new(CancellingDocuments { token }));

    let summary = batch.run_task(BatchTask::new(TaskKind::UpdateMacroCcs));

    assert_eq!(summary.state, RunState::Cancelled);
    assert_eq!(summary.programs_processed, 1);
    assert_eq!(macro_sources(&first)[0].0, "@MIDI CC 10");
    assert_eq!(fs::read_to_string(&second).unwrap(), ONE_MACRO);
}
