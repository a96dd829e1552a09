use super::{Effect, Outcome, ReconciliationEngine, Report, ViewWrite};
use crate::error::{InferenceError, PersistenceError, ValidationError, Warning};
use crate::model::{FieldBinding, FieldReference, NewView, ObjectId, StepId, StepType, ViewModel};
use crate::ordering::dedup_references;
use crate::overlay::OverlayKey;
use crate::snapshot::{Authority, Snapshot};
use tracing::{debug, info};

impl ReconciliationEngine {
    /// Reconciles a step whose type changes from `from` to `to`.
    ///
    /// * into "Collect information": a fresh view is created and linked, then filled with
    ///   `provided` if any were given. A previous link is never reused.
    /// * out of "Collect information": the linked view is deleted and the step's fields
    ///   and link are cleared.
    /// * staying "Collect information": `provided`, when given, replaces the field list
    ///   of the linked view (or of the step itself when unlinked).
    pub async fn on_step_type_change(
        &self,
        snapshot: &mut Snapshot,
        step_id: StepId,
        from: StepType,
        to: StepType,
        provided: Option<Vec<FieldReference>>,
    ) -> Result<Outcome, ValidationError> {
        let step = snapshot
            .workflow
            .step(step_id)
            .ok_or(ValidationError::StepNotFound(step_id))?;
        if step.step_type != from {
            return Err(ValidationError::StepTypeMismatch {
                step_id,
                expected: from,
                found: step.step_type,
            });
        }

        let mut report = Report::default();
        self.apply_type_change(snapshot, &mut report, step_id, to, provided)
            .await;
        Ok(report.finish(()))
    }

    /// Applies a type change to a step known to exist, whatever its current type.
    pub(crate) async fn apply_type_change(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        step_id: StepId,
        to: StepType,
        provided: Option<Vec<FieldReference>>,
    ) {
        let Some(step) = snapshot.workflow.step(step_id) else {
            return;
        };
        let from = step.step_type;
        let provided = provided.map(dedup_references);
        debug!(step_id, %from, %to, "Applying step type change");

        match (from.collects_fields(), to.collects_fields()) {
            (false, true) => {
                self.link_new_view(snapshot, report, step_id, to, provided.unwrap_or_default())
                    .await
            }
            (true, false) => self.unlink_view(snapshot, report, step_id, to).await,
            (true, true) => {
                if let Some(fields) = provided {
                    let view_id = snapshot.workflow.step(step_id).and_then(|s| s.view_id());
                    let authority = match view_id {
                        Some(view_id) => Authority::View {
                            view_id,
                            step_id: Some(step_id),
                        },
                        None => Authority::Step(step_id),
                    };
                    self.write_fields(snapshot, report, authority, true, |_| fields.clone())
                        .await;
                }
            }
            (false, false) => {
                if let Some(step) = snapshot.workflow.step_mut(step_id) {
                    step.step_type = to;
                    snapshot.touch();
                }
            }
        }
    }

    async fn link_new_view(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        step_id: StepId,
        to: StepType,
        provided: Vec<FieldReference>,
    ) {
        let Some(step) = snapshot.workflow.step_mut(step_id) else {
            return;
        };
        step.step_type = to;
        step.binding = FieldBinding::default();
        let view_name = if step.name.trim().is_empty() {
            format!("Step {}", step_id)
        } else {
            step.name.clone()
        };
        snapshot.touch();
        self.overlay.discard(OverlayKey::Step(step_id));

        let object_id = match self.infer_object_id(snapshot, step_id) {
            Ok(id) => id,
            Err(e) => {
                report.warn(Warning::Configuration(e));
                return;
            }
        };

        let new_view = NewView {
            name: view_name,
            object_id,
            model: ViewModel {
                fields: Vec::new(),
                layout: self.config.default_layout.clone(),
            },
        };
        report.issue(Effect::CreateView { step_id });
        let view_id = match self.backend.create_view(new_view.clone()).await {
            Ok(id) => id,
            Err(e) => {
                report.warn(Warning::persistence("create view", e));
                return;
            }
        };

        snapshot.views.upsert(new_view.with_id(view_id));
        if let Some(step) = snapshot.workflow.step_mut(step_id) {
            step.binding = FieldBinding::Linked {
                view_id,
                cached: Vec::new(),
            };
        }
        snapshot.touch();
        info!(step_id, view_id, object_id, "Linked step to new view");

        if !provided.is_empty() {
            let authority = Authority::View {
                view_id,
                step_id: Some(step_id),
            };
            let write = self
                .write_fields(snapshot, report, authority, false, |_| provided.clone())
                .await;
            if write == ViewWrite::Failed {
                debug!(view_id, "New view stays empty after failed population");
            }
        }
    }

    async fn unlink_view(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        step_id: StepId,
        to: StepType,
    ) {
        let Some(step) = snapshot.workflow.step_mut(step_id) else {
            return;
        };
        let linked = step.view_id();
        step.step_type = to;
        step.binding = FieldBinding::default();
        snapshot.touch();
        self.overlay.discard(OverlayKey::Step(step_id));

        let Some(view_id) = linked else {
            return;
        };
        self.overlay.discard(OverlayKey::View(view_id));
        report.issue(Effect::DeleteView(view_id));
        match self.backend.delete_view(view_id).await {
            Ok(()) => {
                snapshot.views.remove(view_id);
                info!(step_id, view_id, "Deleted view of step leaving 'Collect information'");
            }
            Err(PersistenceError::NotFound { .. }) => {
                snapshot.views.remove(view_id);
                debug!(view_id, "View was already gone");
            }
            Err(e) => report.warn(Warning::persistence("delete view", e)),
        }
        snapshot.touch();
    }

    /// The data object a new view for `step_id` belongs to: the object of the first view
    /// in scope, else the ambient route parameter.
    pub fn infer_object_id(
        &self,
        snapshot: &Snapshot,
        step_id: StepId,
    ) -> Result<ObjectId, InferenceError> {
        if let Some(id) = snapshot.views.first_object_id() {
            return Ok(id);
        }
        let param = &self.config.object_route_param;
        match self.route_params.get(param) {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| InferenceError::InvalidRouteParam {
                    param: param.clone(),
                    value: value.clone(),
                }),
            None => Err(InferenceError::ObjectIdUnresolved {
                step_id,
                param: param.clone(),
            }),
        }
    }
}
