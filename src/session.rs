//! Scratch state of a step while its editor dialog is open.

use crate::error::ValidationError;
use crate::model::{FieldDraft, FieldId, FieldReference, StepId, StepType};
use crate::ordering::move_item;
use crate::snapshot::{EditTarget, Snapshot};

/// A private copy of one step's name, type and field list.
///
/// Seeded from canonical state when opened, edited freely, and applied in one go by
/// `ReconciliationEngine::commit_session`. Nothing here touches the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSession {
    step_id: StepId,
    seeded_at: u64,
    original_name: String,
    original_type: StepType,
    seed: Vec<FieldReference>,
    name: String,
    step_type: StepType,
    fields: Vec<FieldReference>,
    drafts: Vec<FieldDraft>,
}

impl EditorSession {
    pub fn open(snapshot: &Snapshot, step_id: StepId) -> Result<Self, ValidationError> {
        let step = snapshot
            .workflow
            .step(step_id)
            .ok_or(ValidationError::StepNotFound(step_id))?;
        let seed = if step.is_collecting() {
            snapshot.authoritative_fields(EditTarget::Step(step_id))?
        } else {
            Vec::new()
        };
        Ok(Self {
            step_id,
            seeded_at: snapshot.version(),
            original_name: step.name.clone(),
            original_type: step.step_type,
            seed: seed.clone(),
            name: step.name.clone(),
            step_type: step.step_type,
            fields: seed,
            drafts: Vec::new(),
        })
    }

    pub fn step_id(&self) -> StepId {
        self.step_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step_type(&self) -> StepType {
        self.step_type
    }

    pub fn original_type(&self) -> StepType {
        self.original_type
    }

    pub fn fields(&self) -> &[FieldReference] {
        &self.fields
    }

    /// New fields that will be created when the session is committed.
    pub fn drafts(&self) -> &[FieldDraft] {
        &self.drafts
    }

    pub fn is_dirty(&self) -> bool {
        self.name != self.original_name
            || self.step_type != self.original_type
            || self.fields != self.seed
            || !self.drafts.is_empty()
    }

    /// Whether the field list differs from what the session was seeded with.
    pub fn fields_changed(&self) -> bool {
        self.fields != self.seed || !self.drafts.is_empty()
    }

    /// Whether the snapshot has changed since the session was opened. Committing a stale
    /// session still wins over the intervening change.
    pub fn is_stale(&self, snapshot: &Snapshot) -> bool {
        snapshot.version() != self.seeded_at
    }

    pub fn rename(&mut self, name: &str) -> Result<(), ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyStepName);
        }
        self.name = name.trim().to_string();
        Ok(())
    }

    /// Switching away from "Collect information" drops the edited fields and drafts.
    pub fn set_type(&mut self, step_type: StepType) {
        if !step_type.collects_fields() {
            self.fields.clear();
            self.drafts.clear();
        }
        self.step_type = step_type;
    }

    /// Adds catalog fields not yet in the list. Returns how many were added.
    pub fn add_existing(&mut self, field_ids: &[FieldId]) -> Result<usize, ValidationError> {
        self.ensure_collecting()?;
        if field_ids.is_empty() {
            return Err(ValidationError::NoFieldSelected);
        }
        let before = self.fields.len();
        for id in field_ids {
            if !self.fields.iter().any(|r| r.field_id == *id) {
                self.fields.push(FieldReference::new(*id));
            }
        }
        Ok(self.fields.len() - before)
    }

    pub fn stage_new_field(&mut self, draft: FieldDraft) -> Result<(), ValidationError> {
        self.ensure_collecting()?;
        draft.validate()?;
        self.drafts.push(draft);
        Ok(())
    }

    pub fn remove_draft(&mut self, index: usize) -> Option<FieldDraft> {
        (index < self.drafts.len()).then(|| self.drafts.remove(index))
    }

    pub fn remove_field(&mut self, field_id: FieldId) -> bool {
        let before = self.fields.len();
        self.fields.retain(|r| r.field_id != field_id);
        self.fields.len() != before
    }

    pub fn move_field(&mut self, from: usize, to: usize) -> Result<(), ValidationError> {
        move_item(&mut self.fields, from, to)
    }

    pub fn set_required(&mut self, field_id: FieldId, required: bool) -> bool {
        match self.fields.iter_mut().find(|r| r.field_id == field_id) {
            Some(reference) => {
                reference.required = required;
                true
            }
            None => false,
        }
    }

    /// Throws away every edit and goes back to the seeded state.
    pub fn reset(&mut self) {
        self.name = self.original_name.clone();
        self.step_type = self.original_type;
        self.fields = self.seed.clone();
        self.drafts.clear();
    }

    pub(crate) fn into_parts(
        self,
    ) -> (StepId, String, StepType, Vec<FieldReference>, Vec<FieldDraft>) {
        (self.step_id, self.name, self.step_type, self.fields, self.drafts)
    }

    fn ensure_collecting(&self) -> Result<(), ValidationError> {
        if self.step_type.collects_fields() {
            Ok(())
        } else {
            Err(ValidationError::NotCollecting(self.step_id))
        }
    }
}
