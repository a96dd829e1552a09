use crate::catalog::FieldCatalog;
use crate::error::{SnapshotError, ValidationError};
use crate::grouping::{FieldGroup, merge_groups};
use crate::model::{FieldBinding, FieldId, FieldReference, StepId, View, ViewId, Workflow};
use crate::overlay::OverlayKey;
use crate::registry::ViewRegistry;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

/// The list a mutation is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditTarget {
    View(ViewId),
    Step(StepId),
}

/// Where the authoritative ordered list of a target lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// A view, optionally reached through the step linked to it.
    View { view_id: ViewId, step_id: Option<StepId> },
    /// The local list of an unlinked step.
    Step(StepId),
}

impl Authority {
    pub fn overlay_key(&self) -> OverlayKey {
        match self {
            Authority::View { view_id, .. } => OverlayKey::View(*view_id),
            Authority::Step(id) => OverlayKey::Step(*id),
        }
    }
}

/// A field attachment that ran out of resolution attempts and was set aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAttachment {
    pub name: String,
    pub target: EditTarget,
    /// The step the target belonged to when the attachment was parked.
    pub owner: Option<StepId>,
    pub required: bool,
}

/// The single owned state every engine operation works on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub workflow: Workflow,
    #[serde(default)]
    pub views: ViewRegistry,
    #[serde(default, rename = "fields")]
    pub catalog: FieldCatalog,
    #[serde(skip)]
    pub pending: Vec<PendingAttachment>,
    #[serde(skip)]
    version: u64,
}

/// A broken consistency rule found by `Snapshot::check_invariants`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    DanglingViewLink { step_id: StepId, view_id: ViewId },
    SharedView { view_id: ViewId, steps: Vec<StepId> },
    NonCollectingStepHasFields(StepId),
    NonCollectingStepIsLinked(StepId),
    DuplicateStepField { step_id: StepId, field_id: FieldId },
    DuplicateViewField { view_id: ViewId, field_id: FieldId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::DanglingViewLink { step_id, view_id } => {
                write!(f, "step {} links to unknown view {}", step_id, view_id)
            }
            InvariantViolation::SharedView { view_id, steps } => {
                write!(f, "view {} is linked from steps {:?}", view_id, steps)
            }
            InvariantViolation::NonCollectingStepHasFields(id) => {
                write!(f, "step {} does not collect information but has fields", id)
            }
            InvariantViolation::NonCollectingStepIsLinked(id) => {
                write!(f, "step {} does not collect information but is linked to a view", id)
            }
            InvariantViolation::DuplicateStepField { step_id, field_id } => {
                write!(f, "step {} references field {} more than once", step_id, field_id)
            }
            InvariantViolation::DuplicateViewField { view_id, field_id } => {
                write!(f, "view {} references field {} more than once", view_id, field_id)
            }
        }
    }
}

impl Snapshot {
    pub fn new(workflow: Workflow, views: Vec<View>, catalog: FieldCatalog) -> Self {
        Self {
            workflow,
            views: views.into(),
            catalog,
            pending: Vec::new(),
            version: 0,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Json(e.to_string()))
    }

    /// Load a `{ workflow, views, fields }` document from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, SnapshotError> {
        let content = fs::read_to_string(path).map_err(|e| SnapshotError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Json(e.to_string()))
    }

    /// Incremented on every mutation applied through the engine.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn touch(&mut self) {
        self.version += 1;
    }

    pub fn authority(&self, target: EditTarget) -> Result<Authority, ValidationError> {
        match target {
            EditTarget::View(view_id) => {
                if !self.views.contains(view_id) {
                    return Err(ValidationError::ViewNotFound(view_id));
                }
                let step_id = self.workflow.step_for_view(view_id).map(|s| s.id);
                Ok(Authority::View { view_id, step_id })
            }
            EditTarget::Step(step_id) => {
                let step = self
                    .workflow
                    .step(step_id)
                    .ok_or(ValidationError::StepNotFound(step_id))?;
                if !step.is_collecting() {
                    return Err(ValidationError::NotCollecting(step_id));
                }
                Ok(match step.view_id() {
                    Some(view_id) => Authority::View {
                        view_id,
                        step_id: Some(step_id),
                    },
                    None => Authority::Step(step_id),
                })
            }
        }
    }

    /// The canonical ordered list for an authority, falling back to the step's cache
    /// when its view is not known locally.
    pub fn canonical_fields(&self, authority: Authority) -> Vec<FieldReference> {
        match authority {
            Authority::View { view_id, step_id } => match self.views.get(view_id) {
                Some(view) => view.model.fields.clone(),
                None => step_id
                    .and_then(|id| self.workflow.step(id))
                    .map(|s| s.binding.local_fields().to_vec())
                    .unwrap_or_default(),
            },
            Authority::Step(step_id) => self
                .workflow
                .step(step_id)
                .map(|s| s.binding.local_fields().to_vec())
                .unwrap_or_default(),
        }
    }

    pub fn authoritative_fields(
        &self,
        target: EditTarget,
    ) -> Result<Vec<FieldReference>, ValidationError> {
        Ok(self.canonical_fields(self.authority(target)?))
    }

    /// Writes a view's field list and refreshes the cache of the step linked to it.
    pub(crate) fn sync_view_fields(&mut self, view_id: ViewId, fields: Vec<FieldReference>) {
        self.views.set_fields(view_id, fields.clone());
        for stage in &mut self.workflow.stages {
            for process in &mut stage.processes {
                for step in &mut process.steps {
                    if let FieldBinding::Linked {
                        view_id: linked,
                        cached,
                    } = &mut step.binding
                    {
                        if *linked == view_id {
                            *cached = fields.clone();
                        }
                    }
                }
            }
        }
        self.touch();
    }

    pub(crate) fn set_step_fields(&mut self, step_id: StepId, fields: Vec<FieldReference>) {
        if let Some(step) = self.workflow.step_mut(step_id) {
            step.binding = FieldBinding::Unlinked(fields);
            self.touch();
        }
    }

    /// Views from storage plus unlinked collecting steps, without duplicates.
    pub fn groups(&self) -> Vec<FieldGroup> {
        merge_groups(&self.views, &self.workflow)
    }

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let mut linked: AHashMap<ViewId, Vec<StepId>> = AHashMap::new();

        for step in self.workflow.steps() {
            if !step.is_collecting() {
                if step.view_id().is_some() {
                    violations.push(InvariantViolation::NonCollectingStepIsLinked(step.id));
                }
                if !step.binding.local_fields().is_empty() {
                    violations.push(InvariantViolation::NonCollectingStepHasFields(step.id));
                }
            }
            if let Some(view_id) = step.view_id() {
                linked.entry(view_id).or_default().push(step.id);
                if !self.views.contains(view_id) {
                    violations.push(InvariantViolation::DanglingViewLink {
                        step_id: step.id,
                        view_id,
                    });
                }
            }
            if let Some(field_id) = first_duplicate(step.binding.local_fields()) {
                violations.push(InvariantViolation::DuplicateStepField {
                    step_id: step.id,
                    field_id,
                });
            }
        }

        let mut shared: Vec<_> = linked.into_iter().filter(|(_, s)| s.len() > 1).collect();
        shared.sort_by_key(|(view_id, _)| *view_id);
        violations.extend(
            shared
                .into_iter()
                .map(|(view_id, steps)| InvariantViolation::SharedView { view_id, steps }),
        );

        for view in self.views.iter() {
            if let Some(field_id) = first_duplicate(&view.model.fields) {
                violations.push(InvariantViolation::DuplicateViewField {
                    view_id: view.id,
                    field_id,
                });
            }
        }
        violations
    }
}

fn first_duplicate(fields: &[FieldReference]) -> Option<FieldId> {
    let mut seen = AHashSet::new();
    fields
        .iter()
        .map(|r| r.field_id)
        .find(|id| !seen.insert(*id))
}
