use super::resolution::Resolution;
use super::{Effect, Outcome, ReconciliationEngine, Report, ViewWrite};
use crate::error::{ValidationError, Warning};
use crate::model::{FieldDraft, FieldId, FieldReference};
use crate::ordering::{
    AttachIntent, apply_attach, classify_attach, field_ids, move_item, reorder_references,
};
use crate::snapshot::{Authority, EditTarget, Snapshot};
use tracing::{debug, info};

/// The result of creating a field and attaching it to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFieldAttachment {
    /// The server-assigned name of the created field.
    pub name: String,
    pub resolution: Resolution,
    /// Whether the field ended up in the target's list.
    pub attached: bool,
}

impl ReconciliationEngine {
    /// Attaches catalog fields to a target.
    ///
    /// When `field_ids` is a permutation of the target's entire current list, the list
    /// is reordered to match it. Otherwise the ids not yet present are appended in the
    /// given order and ids already present are left alone.
    pub async fn attach_existing_fields(
        &self,
        snapshot: &mut Snapshot,
        target: EditTarget,
        field_ids: &[FieldId],
    ) -> Result<Outcome<AttachIntent>, ValidationError> {
        if field_ids.is_empty() {
            return Err(ValidationError::NoFieldSelected);
        }
        let authority = snapshot.authority(target)?;
        let current = crate::ordering::field_ids(&snapshot.canonical_fields(authority));
        let intent = classify_attach(&current, field_ids);

        let mut report = Report::default();
        if intent == AttachIntent::Unchanged {
            debug!(?target, "All requested fields already attached");
            return Ok(report.finish(intent));
        }

        let requested = field_ids.to_vec();
        self.write_fields(snapshot, &mut report, authority, true, |base| {
            apply_attach(base, &classify_attach(&crate::ordering::field_ids(base), &requested))
        })
        .await;
        Ok(report.finish(intent))
    }

    /// Moves one field of the target's authoritative list from `from` to `to`.
    pub async fn reorder_fields(
        &self,
        snapshot: &mut Snapshot,
        target: EditTarget,
        from: usize,
        to: usize,
    ) -> Result<Outcome, ValidationError> {
        let authority = snapshot.authority(target)?;
        let mut moved = snapshot.canonical_fields(authority);
        move_item(&mut moved, from, to)?;

        let mut report = Report::default();
        if from == to {
            return Ok(report.finish(()));
        }

        let order = field_ids(&moved);
        self.write_fields(snapshot, &mut report, authority, true, |base| {
            reorder_references(base, &order)
        })
        .await;
        Ok(report.finish(()))
    }

    /// Removes a field from a target.
    ///
    /// For a view this only detaches the field; it stays in the catalog. For an unlinked
    /// step the step was the field's only binding, so the field itself is deleted. The
    /// caller decides which applies by the kind of target it passes.
    pub async fn remove_field(
        &self,
        snapshot: &mut Snapshot,
        target: EditTarget,
        field_id: FieldId,
    ) -> Result<Outcome, ValidationError> {
        let authority = snapshot.authority(target)?;
        let mut report = Report::default();

        match (target, authority) {
            (EditTarget::Step(step_id), Authority::View { view_id, .. }) => {
                return Err(ValidationError::BindingMismatch { step_id, view_id });
            }
            (_, Authority::View { .. }) => {
                let present = snapshot
                    .canonical_fields(authority)
                    .iter()
                    .any(|r| r.field_id == field_id);
                if present {
                    self.write_fields(snapshot, &mut report, authority, true, |base| {
                        base.iter()
                            .filter(|r| r.field_id != field_id)
                            .copied()
                            .collect()
                    })
                    .await;
                }
            }
            (_, Authority::Step(step_id)) => {
                let bound = snapshot
                    .canonical_fields(authority)
                    .iter()
                    .any(|r| r.field_id == field_id);
                if !bound {
                    return Err(ValidationError::FieldNotOnStep { step_id, field_id });
                }
                report.issue(Effect::DeleteField(field_id));
                match self.backend.delete_field(field_id).await {
                    Ok(()) => {
                        snapshot.catalog.remove(field_id);
                        info!(step_id, field_id, "Deleted field owned by step");
                    }
                    Err(e) => report.warn(Warning::persistence("delete field", e)),
                }
                self.write_fields(snapshot, &mut report, authority, false, |base| {
                    base.iter()
                        .filter(|r| r.field_id != field_id)
                        .copied()
                        .collect()
                })
                .await;
            }
        }
        Ok(report.finish(()))
    }

    /// Creates a field from `draft` and attaches it to `target` once the catalog exposes it.
    ///
    /// Storage only returns the new field's name, so the id is resolved by polling the
    /// catalog a bounded number of times. If that runs out, the field exists but stays
    /// unattached (or is parked, depending on the exhaustion policy).
    pub async fn attach_new_field(
        &self,
        snapshot: &mut Snapshot,
        target: EditTarget,
        draft: FieldDraft,
    ) -> Result<Outcome<Option<NewFieldAttachment>>, ValidationError> {
        draft.validate()?;
        let owner = match snapshot.authority(target)? {
            Authority::View { step_id, .. } => step_id,
            Authority::Step(step_id) => Some(step_id),
        };

        let mut report = Report::default();
        let required = draft.required;
        let Some((name, resolution)) = self.create_and_resolve(snapshot, &mut report, draft).await
        else {
            return Ok(report.finish(None));
        };

        let attached = match resolution {
            Resolution::Resolved { field_id, .. } => {
                let reference = FieldReference { field_id, required };
                self.attach_reference(snapshot, &mut report, target, reference)
                    .await
            }
            Resolution::Exhausted { .. } => {
                self.park(snapshot, &name, target, owner, required);
                false
            }
        };

        Ok(report.finish(Some(NewFieldAttachment {
            name,
            resolution,
            attached,
        })))
    }

    /// Appends `reference` to the target unless its field is already there.
    pub(crate) async fn attach_reference(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        target: EditTarget,
        reference: FieldReference,
    ) -> bool {
        let authority = match snapshot.authority(target) {
            Ok(authority) => authority,
            Err(e) => {
                debug!(?target, error = %e, "Attachment target is gone");
                return false;
            }
        };
        let write = self
            .write_fields(snapshot, report, authority, true, |base| {
                if base.iter().any(|r| r.field_id == reference.field_id) {
                    base.to_vec()
                } else {
                    base.iter().copied().chain([reference]).collect()
                }
            })
            .await;
        matches!(write, ViewWrite::Written(_) | ViewWrite::Unlinked(_))
    }
}
