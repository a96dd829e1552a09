use super::{Effect, Outcome, ReconciliationEngine, Report};
use crate::backend::CreatedField;
use crate::config::ExhaustionPolicy;
use crate::error::Warning;
use crate::model::{FieldDraft, FieldId, FieldReference, StepId};
use crate::snapshot::{EditTarget, PendingAttachment, Snapshot};
use tracing::{debug, info};

/// How the id of a newly created field was found, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `attempts` counts catalog polls; 0 means the id was known without polling.
    Resolved { field_id: FieldId, attempts: u32 },
    Exhausted { attempts: u32 },
}

impl ReconciliationEngine {
    /// Issues field creation and resolves the returned name to an id.
    /// Returns `None` if creation itself failed.
    pub(crate) async fn create_and_resolve(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        draft: FieldDraft,
    ) -> Option<(String, Resolution)> {
        report.issue(Effect::CreateField {
            label: draft.label.clone(),
        });
        let created = match self.backend.create_field(draft).await {
            Ok(created) => created,
            Err(e) => {
                report.warn(Warning::persistence("create field", e));
                return None;
            }
        };
        info!(name = %created.name, "Field created");

        let resolution = self.resolve_created(snapshot, report, &created).await;
        if let Resolution::Exhausted { attempts } = resolution {
            report.warn(Warning::ResolutionExhausted {
                name: created.name.clone(),
                attempts,
            });
        }
        Some((created.name, resolution))
    }

    /// Tries the current catalog first, then polls it at a fixed interval until the name
    /// resolves or the attempt bound is reached.
    async fn resolve_created(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        created: &CreatedField,
    ) -> Resolution {
        if let Some(field_id) = created.id {
            return Resolution::Resolved {
                field_id,
                attempts: 0,
            };
        }
        if let Some(field_id) = snapshot.catalog.resolve_name(&created.name) {
            return Resolution::Resolved {
                field_id,
                attempts: 0,
            };
        }

        let max_attempts = self.config.max_poll_attempts;
        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.config.poll_interval()).await;
            report.issue(Effect::ListFields);
            match self.backend.list_fields().await {
                Ok(fields) => {
                    snapshot.catalog.replace(fields);
                    snapshot.touch();
                    if let Some(field_id) = snapshot.catalog.resolve_name(&created.name) {
                        debug!(name = %created.name, field_id, attempt, "Resolved new field");
                        return Resolution::Resolved {
                            field_id,
                            attempts: attempt,
                        };
                    }
                }
                Err(e) => debug!(attempt, error = %e, "Catalog poll failed"),
            }
        }
        Resolution::Exhausted {
            attempts: max_attempts,
        }
    }

    pub(crate) fn park(
        &self,
        snapshot: &mut Snapshot,
        name: &str,
        target: EditTarget,
        owner: Option<StepId>,
        required: bool,
    ) {
        if self.config.exhaustion_policy != ExhaustionPolicy::Park {
            return;
        }
        info!(name, ?target, "Parking unresolved field attachment");
        snapshot.pending.push(PendingAttachment {
            name: name.to_string(),
            target,
            owner,
            required,
        });
    }

    /// Manual retry of parked attachments: one catalog refresh, then every parked field
    /// whose name now resolves is attached. Returns how many were attached.
    ///
    /// A parked view target that no longer exists falls back to its owning step, if that
    /// step still collects information and is unlinked.
    pub async fn retry_pending(&self, snapshot: &mut Snapshot) -> Outcome<usize> {
        let mut report = Report::default();
        if snapshot.pending.is_empty() {
            return report.finish(0);
        }

        let refreshed = report.absorb(self.refresh_catalog(snapshot).await);
        if !refreshed {
            return report.finish(0);
        }

        let mut attached = 0;
        for pending in std::mem::take(&mut snapshot.pending) {
            let Some(field_id) = snapshot.catalog.resolve_name(&pending.name) else {
                snapshot.pending.push(pending);
                continue;
            };
            let reference = FieldReference {
                field_id,
                required: pending.required,
            };
            let target = match (snapshot.authority(pending.target), pending.owner) {
                (Ok(_), _) => pending.target,
                (Err(_), Some(owner)) => EditTarget::Step(owner),
                (Err(_), None) => {
                    debug!(name = %pending.name, "Dropping parked attachment without a target");
                    continue;
                }
            };
            if self
                .attach_reference(snapshot, &mut report, target, reference)
                .await
            {
                attached += 1;
            } else if snapshot.authority(target).is_ok() {
                debug!(name = %pending.name, "Parked attachment could not be applied, keeping it");
                snapshot.pending.push(pending);
            } else {
                debug!(name = %pending.name, "Parked attachment could not be applied");
            }
        }
        report.finish(attached)
    }
}
