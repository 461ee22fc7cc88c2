//! Per-program task logic.

use crate::cc::{CcAllocator, CcCursor};
use crate::error::{ConverterError, Result};
use crate::program::{EditOutcome, EffectFamily, FalconProgram};
use crate::settings::Settings;

use super::task::{BatchTask, TaskKind, NEW_CC_NO_PARAMETER, OLD_CC_NO_PARAMETER};

/// What a task did to one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutput {
    pub outcome: EditOutcome,
    /// Line reported by a query, if it found something.
    pub report: Option<String>,
}

impl ActionOutput {
    fn edit(outcome: EditOutcome) -> Self {
        Self {
            outcome,
            report: None,
        }
    }

    fn report(report: Option<String>) -> Self {
        Self {
            outcome: EditOutcome::Unchanged,
            report,
        }
    }
}

/// Apply `task` to one loaded program. `cursor` must be fresh for the
/// program.
pub fn apply(
    task: &BatchTask,
    program: &mut FalconProgram,
    settings: &Settings,
    allocator: &CcAllocator,
    cursor: &mut CcCursor,
) -> Result<ActionOutput> {
    let tolerance = settings.location_tolerance;
    let path = program.path().to_string();
    let output = match task.kind {
        TaskKind::RestoreOriginal => {
            return Err(ConverterError::Internal(
                "RestoreOriginal copies files and has no per-program action".to_string(),
            ))
        }
        TaskKind::PrependPathLineToDescription => {
            ActionOutput::edit(program.prepend_path_line_to_description()?)
        }
        TaskKind::InitialiseLayout => ActionOutput::edit(program.initialise_layout(tolerance)?),
        TaskKind::UpdateMacroCcs => {
            ActionOutput::edit(program.update_macro_ccs(allocator, cursor, tolerance)?)
        }
        TaskKind::RemoveDelayEffectsAndMacros | TaskKind::RemoveReverbEffectsAndMacros => {
            ActionOutput::edit(program.remove_effects_and_macros(family_of(task.kind))?)
        }
        TaskKind::InitialiseValues => ActionOutput::edit(program.initialise_values()?),
        TaskKind::ReplaceModWheelWithMacro => {
            ActionOutput::edit(program.replace_mod_wheel_with_macro(allocator, tolerance)?)
        }
        TaskKind::ReuseCc1 => ActionOutput::edit(program.reuse_cc1(allocator, cursor, tolerance)?),
        TaskKind::ChangeMacroCcNo => {
            let old_cc = task.cc_parameter(OLD_CC_NO_PARAMETER)?;
            let new_cc = task.cc_parameter(NEW_CC_NO_PARAMETER)?;
            ActionOutput::edit(program.change_macro_cc_no(old_cc, new_cc)?)
        }
        TaskKind::ChangeDelayToZero | TaskKind::ChangeReverbToZero => {
            ActionOutput::edit(program.change_family_to_zero(family_of(task.kind))?)
        }
        TaskKind::QueryAdsrMacros => ActionOutput::report(
            program
                .has_adsr_macros()?
                .then(|| format!("{} has ADSR macros", path)),
        ),
        TaskKind::QueryCountMacros => ActionOutput::report(Some(format!(
            "{} has {} macros",
            path,
            program.macro_count()
        ))),
        TaskKind::QueryDelayTypes | TaskKind::QueryReverbTypes => {
            let family = family_of(task.kind);
            let types = program.effect_types(family);
            ActionOutput::report((!types.is_empty()).then(|| {
                format!("{} {} types: {}", path, family.label(), types.join(", "))
            }))
        }
        TaskKind::QueryReuseCc1NotSupported => {
            ActionOutput::report(program.is_script_driven().then(|| {
                format!(
                    "{}: ReuseCc1 is not supported with a {} Info page script",
                    path,
                    program.dialect()
                )
            }))
        }
    };
    Ok(output)
}

fn family_of(kind: TaskKind) -> EffectFamily {
    kind.effect_family().unwrap_or(EffectFamily::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::CcRange;
    use crate::document::Document;
    use crate::program::test_programs::{ORGANIC, PLAIN};
    use crate::program::ProgramPath;
    use pretty_assertions::assert_eq;

    fn settings() -> Settings {
        Settings {
            continuous_cc_ranges: vec![CcRange::new(31, 34)],
            toggle_cc_ranges: vec![CcRange::new(112, 114)],
            mod_wheel_replacement_cc_no: 34,
            ..Settings::default()
        }
    }

    fn run(xml: &str, task: &BatchTask) -> Result<ActionOutput> {
        let doc = Document::parse(xml, "Bank/Cat/Prog.uvip").unwrap();
        let mut program =
            FalconProgram::from_document(doc, ProgramPath::new("Bank", "Cat", "Prog")).unwrap();
        let settings = settings();
        let allocator = settings.cc_allocator();
        apply(
            task,
            &mut program,
            &settings,
            &allocator,
            &mut CcCursor::default(),
        )
    }

    #[test]
    fn test_edits_report_outcome() {
        let output = run(PLAIN, &BatchTask::new(TaskKind::UpdateMacroCcs)).unwrap();
        assert_eq!(output.outcome, EditOutcome::Changed);
        assert_eq!(output.report, None);
    }

    #[test]
    fn test_queries_report_lines() {
        let output = run(PLAIN, &BatchTask::new(TaskKind::QueryCountMacros)).unwrap();
        assert_eq!(output.outcome, EditOutcome::Unchanged);
        assert_eq!(output.report.as_deref(), Some("Bank\\Cat\\Prog has 3 macros"));

        let output = run(PLAIN, &BatchTask::new(TaskKind::QueryReverbTypes)).unwrap();
        assert_eq!(
            output.report.as_deref(),
            Some("Bank\\Cat\\Prog reverb types: SparkVerb")
        );

        let output = run(PLAIN, &BatchTask::new(TaskKind::QueryAdsrMacros)).unwrap();
        assert_eq!(output.report, None);

        let output = run(ORGANIC, &BatchTask::new(TaskKind::QueryReuseCc1NotSupported)).unwrap();
        assert!(output.report.unwrap().contains("OrganicTexture"));
    }

    #[test]
    fn test_change_macro_cc_no_needs_parameters() {
        let error = run(PLAIN, &BatchTask::new(TaskKind::ChangeMacroCcNo)).unwrap_err();
        assert!(matches!(error, ConverterError::MissingTaskParameter { .. }));
    }
}
