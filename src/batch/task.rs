//! Batch task kinds and task definitions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConverterError, Result};
use crate::program::EffectFamily;

/// Every transformation or query a batch can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    RestoreOriginal,
    PrependPathLineToDescription,
    InitialiseLayout,
    UpdateMacroCcs,
    RemoveDelayEffectsAndMacros,
    RemoveReverbEffectsAndMacros,
    InitialiseValues,
    ReplaceModWheelWithMacro,
    ReuseCc1,
    ChangeMacroCcNo,
    ChangeDelayToZero,
    ChangeReverbToZero,
    QueryAdsrMacros,
    QueryCountMacros,
    QueryDelayTypes,
    QueryReverbTypes,
    QueryReuseCc1NotSupported,
}

/// Kinds that always run first, in this order.
pub const PRIORITY_TASKS: [TaskKind; 9] = [
    TaskKind::RestoreOriginal,
    TaskKind::PrependPathLineToDescription,
    TaskKind::InitialiseLayout,
    TaskKind::UpdateMacroCcs,
    TaskKind::RemoveDelayEffectsAndMacros,
    TaskKind::RemoveReverbEffectsAndMacros,
    TaskKind::InitialiseValues,
    TaskKind::ReplaceModWheelWithMacro,
    TaskKind::ReuseCc1,
];

/// All kinds: the priority kinds followed by the rest.
pub const ALL_TASKS: [TaskKind; 17] = [
    TaskKind::RestoreOriginal,
    TaskKind::PrependPathLineToDescription,
    TaskKind::InitialiseLayout,
    TaskKind::UpdateMacroCcs,
    TaskKind::RemoveDelayEffectsAndMacros,
    TaskKind::RemoveReverbEffectsAndMacros,
    TaskKind::InitialiseValues,
    TaskKind::ReplaceModWheelWithMacro,
    TaskKind::ReuseCc1,
    TaskKind::ChangeMacroCcNo,
    TaskKind::ChangeDelayToZero,
    TaskKind::ChangeReverbToZero,
    TaskKind::QueryAdsrMacros,
    TaskKind::QueryCountMacros,
    TaskKind::QueryDelayTypes,
    TaskKind::QueryReverbTypes,
    TaskKind::QueryReuseCc1NotSupported,
];

/// Parameter names of ChangeMacroCcNo.
pub const OLD_CC_NO_PARAMETER: &str = "OldCcNo";
pub const NEW_CC_NO_PARAMETER: &str = "NewCcNo";

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::RestoreOriginal => "RestoreOriginal",
            TaskKind::PrependPathLineToDescription => "PrependPathLineToDescription",
            TaskKind::InitialiseLayout => "InitialiseLayout",
            TaskKind::UpdateMacroCcs => "UpdateMacroCcs",
            TaskKind::RemoveDelayEffectsAndMacros => "RemoveDelayEffectsAndMacros",
            TaskKind::RemoveReverbEffectsAndMacros => "RemoveReverbEffectsAndMacros",
            TaskKind::InitialiseValues => "InitialiseValues",
            TaskKind::ReplaceModWheelWithMacro => "ReplaceModWheelWithMacro",
            TaskKind::ReuseCc1 => "ReuseCc1",
            TaskKind::ChangeMacroCcNo => "ChangeMacroCcNo",
            TaskKind::ChangeDelayToZero => "ChangeDelayToZero",
            TaskKind::ChangeReverbToZero => "ChangeReverbToZero",
            TaskKind::QueryAdsrMacros => "QueryAdsrMacros",
            TaskKind::QueryCountMacros => "QueryCountMacros",
            TaskKind::QueryDelayTypes => "QueryDelayTypes",
            TaskKind::QueryReverbTypes => "QueryReverbTypes",
            TaskKind::QueryReuseCc1NotSupported => "QueryReuseCc1NotSupported",
        }
    }

    /// Position in the fixed-priority prefix, if the kind belongs to it.
    pub fn priority(self) -> Option<usize> {
        PRIORITY_TASKS.iter().position(|&kind| kind == self)
    }

    /// Queries only report; they never save.
    pub fn is_query(self) -> bool {
        matches!(
            self,
            TaskKind::QueryAdsrMacros
                | TaskKind::QueryCountMacros
                | TaskKind::QueryDelayTypes
                | TaskKind::QueryReverbTypes
                | TaskKind::QueryReuseCc1NotSupported
        )
    }

    pub fn allocates_ccs(self) -> bool {
        matches!(self, TaskKind::UpdateMacroCcs | TaskKind::ReuseCc1)
    }

    pub fn needs_mod_wheel_replacement(self) -> bool {
        matches!(self, TaskKind::ReplaceModWheelWithMacro | TaskKind::ReuseCc1)
    }

    /// Effect family an effect-related kind works on.
    pub fn effect_family(self) -> Option<EffectFamily> {
        match self {
            TaskKind::RemoveDelayEffectsAndMacros
            | TaskKind::ChangeDelayToZero
            | TaskKind::QueryDelayTypes => Some(EffectFamily::Delay),
            TaskKind::RemoveReverbEffectsAndMacros
            | TaskKind::ChangeReverbToZero
            | TaskKind::QueryReverbTypes => Some(EffectFamily::Reverb),
            _ => None,
        }
    }

    /// Parameters the kind cannot run without.
    pub fn required_parameters(self) -> &'static [&'static str] {
        match self {
            TaskKind::ChangeMacroCcNo => &[OLD_CC_NO_PARAMETER, NEW_CC_NO_PARAMETER],
            _ => &[],
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for TaskKind {
    type Err = ConverterError;

    fn from_str(s: &str) -> Result<Self> {
        ALL_TASKS
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ConverterError::InvalidTaskName {
                name: s.to_string(),
            })
    }
}

/// A named task parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParameter {
    pub name: String,
    pub value: String,
}

/// One task of a batch script. Empty scope fields mean "all".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTask {
    pub kind: TaskKind,
    pub sound_bank: String,
    pub category: String,
    pub program: String,
    pub parameters: Vec<TaskParameter>,
}

impl BatchTask {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            sound_bank: String::new(),
            category: String::new(),
            program: String::new(),
            parameters: Vec::new(),
        }
    }

    pub fn with_scope(
        mut self,
        sound_bank: impl Into<String>,
        category: impl Into<String>,
        program: impl Into<String>,
    ) -> Self {
        self.sound_bank = sound_bank.into();
        self.category = category.into();
        self.program = program.into();
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(TaskParameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name == name)
            .map(|parameter| parameter.value.as_str())
    }

    pub fn required_parameter(&self, name: &str) -> Result<&str> {
        self.parameter(name)
            .ok_or_else(|| ConverterError::MissingTaskParameter {
                task: self.kind.to_string(),
                parameter: name.to_string(),
            })
    }

    /// Parse a required parameter as a CC number.
    pub fn cc_parameter(&self, name: &str) -> Result<u32> {
        let value = self.required_parameter(name)?;
        value
            .trim()
            .parse()
            .map_err(|_| ConverterError::InvalidAttributeValue {
                element: self.kind.to_string(),
                attribute: name.to_string(),
                value: value.to_string(),
                path: Default::default(),
            })
    }

    /// Identity used for duplicate detection.
    pub fn key(&self) -> (TaskKind, &str, &str, &str) {
        (
            self.kind,
            self.sound_bank.as_str(),
            self.category.as_str(),
            self.program.as_str(),
        )
    }
}

impl fmt::Display for BatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        let scope: Vec<&str> = [&self.sound_bank, &self.category, &self.program]
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(String::as_str)
            .collect();
        if !scope.is_empty() {
            write!(f, " ({})", scope.join("\\"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_names_round_trip() {
        for kind in ALL_TASKS {
            assert_eq!(kind.name().parse::<TaskKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_invalid_name() {
        let error = "Frobnicate".parse::<TaskKind>().unwrap_err();
        assert!(error.is_expected());
        assert_eq!(error.error_code(), "INVALID_TASK_NAME");
    }

    #[test_case(TaskKind::RestoreOriginal, Some(0))]
    #[test_case(TaskKind::ReuseCc1, Some(8))]
    #[test_case(TaskKind::QueryCountMacros, None)]
    fn test_priority(kind: TaskKind, expected: Option<usize>) {
        assert_eq!(kind.priority(), expected);
    }

    #[test]
    fn test_parameters() {
        let task = BatchTask::new(TaskKind::ChangeMacroCcNo)
            .with_parameter(OLD_CC_NO_PARAMETER, "31")
            .with_parameter(NEW_CC_NO_PARAMETER, "x");
        assert_eq!(task.cc_parameter(OLD_CC_NO_PARAMETER).unwrap(), 31);
        assert!(task.cc_parameter(NEW_CC_NO_PARAMETER).is_err());
        assert!(matches!(
            BatchTask::new(TaskKind::ChangeMacroCcNo).required_parameter(OLD_CC_NO_PARAMETER),
            Err(ConverterError::MissingTaskParameter { .. })
        ));
    }

    #[test]
    fn test_display_scope() {
        let task = BatchTask::new(TaskKind::QueryCountMacros).with_scope("Pulsar", "Keys", "");
        assert_eq!(task.to_string(), "QueryCountMacros (Pulsar\\Keys)");
        assert_eq!(
            BatchTask::new(TaskKind::ReuseCc1).to_string(),
            "ReuseCc1"
        );
    }
}
