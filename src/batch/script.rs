//! Batch scripts: ordered lists of tasks read from XML.
//!
//! ```xml
//! <Tasks>
//!     <Task Name="UpdateMacroCcs" SoundBank="Pulsar" Category="" Program=""/>
//!     <Task Name="ChangeMacroCcNo" SoundBank="" Category="" Program="">
//!         <Parameters>
//!             <Parameter Name="OldCcNo" Value="31"/>
//!             <Parameter Name="NewCcNo" Value="41"/>
//!         </Parameters>
//!     </Task>
//! </Tasks>
//! ```

use std::path::{Path, PathBuf};

use crate::document::{Document, NodeId};
use crate::error::{ConverterError, Result};

use super::task::{BatchTask, TaskKind, TaskParameter, PRIORITY_TASKS};

const TASKS_ELEMENT: &str = "Tasks";
const TASK_ELEMENT: &str = "Task";
const PARAMETERS_ELEMENT: &str = "Parameters";
const PARAMETER_ELEMENT: &str = "Parameter";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchScript {
    pub path: PathBuf,
    pub tasks: Vec<BatchTask>,
}

impl BatchScript {
    pub fn new(tasks: Vec<BatchTask>) -> Self {
        Self {
            path: PathBuf::new(),
            tasks,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_document(&Document::load(path)?)
    }

    pub fn parse(xml: &str, path: impl Into<PathBuf>) -> Result<Self> {
        Self::from_document(&Document::parse(xml, path)?)
    }

    fn from_document(doc: &Document) -> Result<Self> {
        let root = doc.root();
        if doc.name(root) != TASKS_ELEMENT {
            return Err(ConverterError::MissingElement {
                element: TASKS_ELEMENT.to_string(),
                parent: doc.name(root).to_string(),
                path: doc.path().to_path_buf(),
            });
        }
        let mut tasks = Vec::new();
        for node in doc.children_named(root, TASK_ELEMENT) {
            tasks.push(read_task(doc, node)?);
        }
        Ok(Self {
            path: doc.path().to_path_buf(),
            tasks,
        })
    }

    /// Reject tasks defined twice with the same scope.
    pub fn validate(&self) -> Result<()> {
        for (i, task) in self.tasks.iter().enumerate() {
            if self.tasks[..i].iter().any(|earlier| earlier.key() == task.key()) {
                return Err(ConverterError::DuplicateTask {
                    task: task.kind.to_string(),
                    sound_bank: task.sound_bank.clone(),
                    category: task.category.clone(),
                    program: task.program.clone(),
                });
            }
            for parameter in task.kind.required_parameters() {
                task.required_parameter(parameter)?;
            }
        }
        Ok(())
    }

    /// Tasks in execution order: the priority kinds first, in priority
    /// order, then everything else in script order. Tasks of one kind keep
    /// their relative order.
    pub fn sequenced(&self) -> Vec<BatchTask> {
        let mut ordered: Vec<BatchTask> = Vec::with_capacity(self.tasks.len());
        for kind in PRIORITY_TASKS {
            ordered.extend(self.tasks.iter().filter(|task| task.kind == kind).cloned());
        }
        ordered.extend(
            self.tasks
                .iter()
                .filter(|task| task.kind.priority().is_none())
                .cloned(),
        );
        ordered
    }
}

fn read_task(doc: &Document, node: NodeId) -> Result<BatchTask> {
    let kind: TaskKind = doc.required_attribute(node, "Name")?.parse()?;
    let scope = |name: &str| doc.attribute(node, name).unwrap_or("").to_string();
    let mut task = BatchTask::new(kind).with_scope(
        scope("SoundBank"),
        scope("Category"),
        scope("Program"),
    );
    if let Some(parameters) = doc.child_named(node, PARAMETERS_ELEMENT) {
        for parameter in doc.children_named(parameters, PARAMETER_ELEMENT) {
            task.parameters.push(TaskParameter {
                name: doc.required_attribute(parameter, "Name")?.to_string(),
                value: doc.required_attribute(parameter, "Value")?.to_string(),
            });
        }
    }
    Ok(task)
}
