use super::resolution::Resolution;
use super::{Outcome, ReconciliationEngine, Report};
use crate::error::ValidationError;
use crate::model::FieldReference;
use crate::session::EditorSession;
use crate::snapshot::{EditTarget, Snapshot};
use tracing::debug;

/// What committing an editor session did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// `false` when the session had no edits and nothing was applied.
    pub committed: bool,
    /// Names of drafts that were created and attached.
    pub created: Vec<String>,
    /// Names of drafts that were created but never appeared in the catalog.
    pub unresolved: Vec<String>,
    /// The step's authoritative field list after the commit.
    pub fields: Vec<FieldReference>,
}

impl ReconciliationEngine {
    /// Applies an editor session to the snapshot in one step: rename, create staged
    /// drafts, then reconcile the type change and field list.
    ///
    /// There is no conflict detection; a session opened on an older snapshot overwrites
    /// whatever changed in between.
    pub async fn commit_session(
        &self,
        snapshot: &mut Snapshot,
        session: EditorSession,
    ) -> Result<Outcome<CommitSummary>, ValidationError> {
        let step_id = session.step_id();
        let current_type = snapshot
            .workflow
            .step(step_id)
            .ok_or(ValidationError::StepNotFound(step_id))?
            .step_type;

        let mut report = Report::default();
        let mut summary = CommitSummary::default();
        if !session.is_dirty() {
            return Ok(report.finish(summary));
        }
        if session.is_stale(snapshot) {
            debug!(step_id, "Committing session over newer canonical state");
        }

        let fields_changed = session.fields_changed();
        let (_, name, to, mut fields, drafts) = session.into_parts();

        if let Some(step) = snapshot.workflow.step_mut(step_id) {
            if step.name != name {
                step.name = name;
                snapshot.touch();
            }
        }

        if current_type.collects_fields() && to.collects_fields() && !drafts.is_empty() {
            if let Ok(authority) = snapshot.authority(EditTarget::Step(step_id)) {
                let canonical = snapshot.canonical_fields(authority);
                self.overlay
                    .stage(authority.overlay_key(), &canonical, fields.clone());
            }
        }

        for draft in drafts {
            let required = draft.required;
            match self.create_and_resolve(snapshot, &mut report, draft).await {
                Some((name, Resolution::Resolved { field_id, .. })) => {
                    if !fields.iter().any(|r| r.field_id == field_id) {
                        fields.push(FieldReference { field_id, required });
                    }
                    summary.created.push(name);
                }
                Some((name, Resolution::Exhausted { .. })) => {
                    self.park(
                        snapshot,
                        &name,
                        EditTarget::Step(step_id),
                        Some(step_id),
                        required,
                    );
                    summary.unresolved.push(name);
                }
                None => {}
            }
        }

        let provided = (current_type != to || fields_changed).then_some(fields);
        self.apply_type_change(snapshot, &mut report, step_id, to, provided)
            .await;

        summary.committed = true;
        summary.fields = if to.collects_fields() {
            snapshot
                .authoritative_fields(EditTarget::Step(step_id))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(report.finish(summary))
    }
}
