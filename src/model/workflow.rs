use super::{FieldReference, ProcessId, StageId, StepId, ViewId};
use crate::error::ValidationError;
use crate::ordering::move_item;
use serde::{Deserialize, Serialize};

/// The kind of work a step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    #[serde(rename = "Collect information")]
    CollectInformation,
    #[serde(rename = "Approve/Reject")]
    Approval,
    Automation,
    #[serde(rename = "Send notification")]
    Notification,
    Decision,
}

impl StepType {
    /// Whether steps of this type gather structured data through fields.
    pub fn collects_fields(&self) -> bool {
        matches!(self, StepType::CollectInformation)
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StepType::CollectInformation => "Collect information",
            StepType::Approval => "Approve/Reject",
            StepType::Automation => "Automation",
            StepType::Notification => "Send notification",
            StepType::Decision => "Decision",
        };
        f.write_str(label)
    }
}

/// Where a step's field list lives.
///
/// When a view is linked its field list is authoritative; `cached` is a derived copy
/// written only after a successful view read or write, used when the view is unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldBinding {
    Unlinked(Vec<FieldReference>),
    Linked {
        view_id: ViewId,
        cached: Vec<FieldReference>,
    },
}

impl Default for FieldBinding {
    fn default() -> Self {
        FieldBinding::Unlinked(Vec::new())
    }
}

impl FieldBinding {
    pub fn view_id(&self) -> Option<ViewId> {
        match self {
            FieldBinding::Linked { view_id, .. } => Some(*view_id),
            FieldBinding::Unlinked(_) => None,
        }
    }

    /// The locally held references: the step's own list, or the cache of its view.
    pub fn local_fields(&self) -> &[FieldReference] {
        match self {
            FieldBinding::Unlinked(fields) => fields,
            FieldBinding::Linked { cached, .. } => cached,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StepRecord", into = "StepRecord")]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub step_type: StepType,
    pub binding: FieldBinding,
}

/// The flat wire shape of a step: `{ id, name, type, viewId?, fields }`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepRecord {
    id: StepId,
    name: String,
    #[serde(rename = "type")]
    step_type: StepType,
    #[serde(default)]
    view_id: Option<ViewId>,
    #[serde(default)]
    fields: Vec<FieldReference>,
}

impl From<StepRecord> for Step {
    fn from(record: StepRecord) -> Self {
        let binding = match record.view_id {
            Some(view_id) => FieldBinding::Linked {
                view_id,
                cached: record.fields,
            },
            None => FieldBinding::Unlinked(record.fields),
        };
        Step {
            id: record.id,
            name: record.name,
            step_type: record.step_type,
            binding,
        }
    }
}

impl From<Step> for StepRecord {
    fn from(step: Step) -> Self {
        let (view_id, fields) = match step.binding {
            FieldBinding::Linked { view_id, cached } => (Some(view_id), cached),
            FieldBinding::Unlinked(fields) => (None, fields),
        };
        StepRecord {
            id: step.id,
            name: step.name,
            step_type: step.step_type,
            view_id,
            fields,
        }
    }
}

impl Step {
    pub fn new(id: StepId, name: &str, step_type: StepType) -> Self {
        Self {
            id,
            name: name.to_string(),
            step_type,
            binding: FieldBinding::default(),
        }
    }

    pub fn view_id(&self) -> Option<ViewId> {
        self.binding.view_id()
    }

    pub fn is_collecting(&self) -> bool {
        self.step_type.collects_fields()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: StageId,
    pub name: String,
    #[serde(default)]
    pub processes: Vec<Process>,
}

/// The Stage → Process → Step tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Workflow {
    /// Iterates every step in workflow order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages
            .iter()
            .flat_map(|stage| stage.processes.iter())
            .flat_map(|process| process.steps.iter())
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.stages
            .iter_mut()
            .flat_map(|stage| stage.processes.iter_mut())
            .flat_map(|process| process.steps.iter_mut())
            .find(|s| s.id == id)
    }

    /// Finds the step currently linked to `view_id`.
    pub fn step_for_view(&self, view_id: ViewId) -> Option<&Step> {
        self.steps().find(|s| s.view_id() == Some(view_id))
    }

    pub fn move_stage(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        move_item(&mut self.stages, from, to)
    }

    pub fn move_process(
        &mut self,
        stage_id: StageId,
        from: usize,
        to: usize,
    ) -> Result<(), ValidationError> {
        let stage = self
            .stages
            .iter_mut()
            .find(|s| s.id == stage_id)
            .ok_or(ValidationError::StageNotFound(stage_id))?;
        move_item(&mut stage.processes, from, to)
    }

    pub fn move_step(
        &mut self,
        process_id: ProcessId,
        from: usize,
        to: usize,
    ) -> Result<(), ValidationError> {
        let process = self
            .stages
            .iter_mut()
            .flat_map(|stage| stage.processes.iter_mut())
            .find(|p| p.id == process_id)
            .ok_or(ValidationError::ProcessNotFound(process_id))?;
        move_item(&mut process.steps, from, to)
    }
}
