use crate::backend::PersistenceBackend;
use crate::config::EngineConfig;
use crate::error::{PersistenceError, ValidationError, Warning};
use crate::model::{FieldId, FieldReference, StepId, View, ViewId};
use crate::overlay::{OverlayHandle, OverlayKey};
use crate::snapshot::{Authority, EditTarget, Snapshot};
use ahash::AHashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

mod attach;
mod catalog;
mod commit;
mod resolution;
mod transition;

pub use attach::NewFieldAttachment;
pub use commit::CommitSummary;
pub use resolution::Resolution;

/// A persistence call the engine issued while applying an intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    CreateView { step_id: StepId },
    ReadView(ViewId),
    UpdateView(ViewId),
    DeleteView(ViewId),
    CreateField { label: String },
    ListFields,
    UpdateField(FieldId),
    DeleteField(FieldId),
}

/// The result of an engine operation that passed validation.
///
/// Persistence failures never abort an operation; they are collected in `warnings`
/// and the snapshot is left in the best state that could be reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T = ()> {
    pub value: T,
    pub effects: Vec<Effect>,
    pub warnings: Vec<Warning>,
}

impl<T> Outcome<T> {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Collects effects and warnings while an operation runs.
#[derive(Debug, Default)]
pub(crate) struct Report {
    effects: Vec<Effect>,
    warnings: Vec<Warning>,
}

impl Report {
    fn issue(&mut self, effect: Effect) {
        debug!(?effect, "Issuing persistence call");
        self.effects.push(effect);
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }

    fn absorb<T>(&mut self, outcome: Outcome<T>) -> T {
        self.effects.extend(outcome.effects);
        self.warnings.extend(outcome.warnings);
        outcome.value
    }

    fn finish<T>(self, value: T) -> Outcome<T> {
        Outcome {
            value,
            effects: self.effects,
            warnings: self.warnings,
        }
    }
}

/// What became of a field-list write addressed to a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ViewWrite {
    Written(Vec<FieldReference>),
    /// The view is gone; the linked step was unlinked and holds the list locally.
    Unlinked(Vec<FieldReference>),
    Failed,
}

/// Where a view write starts from.
enum BaseView {
    Found(View),
    /// Storage reports the view as deleted.
    Gone,
    /// The read failed and there is no local copy to fall back on.
    Unavailable,
}

/// Keeps the workflow tree, the view registry and the field catalog consistent.
///
/// Operations take the current `Snapshot` by mutable reference, apply the intent,
/// issue the persistence calls it needs in order and report what happened.
pub struct ReconciliationEngine {
    backend: Arc<dyn PersistenceBackend>,
    config: EngineConfig,
    route_params: AHashMap<String, String>,
    overlay: OverlayHandle,
}

pub struct EngineBuilder {
    backend: Arc<dyn PersistenceBackend>,
    config: EngineConfig,
    route_params: AHashMap<String, String>,
    overlay: OverlayHandle,
}

impl EngineBuilder {
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            config: EngineConfig::default(),
            route_params: AHashMap::new(),
            overlay: OverlayHandle::new(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds an ambient route parameter, consulted during object-id inference.
    pub fn with_route_param(mut self, key: &str, value: &str) -> Self {
        self.route_params.insert(key.to_string(), value.to_string());
        self
    }

    /// Shares an existing overlay, e.g. one the presentation layer already holds.
    pub fn with_overlay(mut self, overlay: OverlayHandle) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn build(self) -> ReconciliationEngine {
        ReconciliationEngine {
            backend: self.backend,
            config: self.config,
            route_params: self.route_params,
            overlay: self.overlay,
        }
    }
}

impl ReconciliationEngine {
    pub fn builder(backend: Arc<dyn PersistenceBackend>) -> EngineBuilder {
        EngineBuilder::new(backend)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn overlay(&self) -> &OverlayHandle {
        &self.overlay
    }

    /// The list to render for `target`: canonical state with any pending overlay on top.
    pub fn displayed_fields(
        &self,
        snapshot: &Snapshot,
        target: EditTarget,
    ) -> Result<Vec<FieldReference>, ValidationError> {
        let authority = snapshot.authority(target)?;
        let canonical = snapshot.canonical_fields(authority);
        Ok(self.overlay.apply(authority.overlay_key(), &canonical))
    }

    /// Drops every overlay whose canonical source has caught up or moved on.
    /// Returns how many overlays remain pending.
    pub fn observe(&self, snapshot: &Snapshot) -> usize {
        self.overlay.reconcile_all(|key| match key {
            OverlayKey::View(id) => snapshot.views.get(id).map(|v| v.model.fields.clone()),
            OverlayKey::Step(id) => snapshot
                .workflow
                .step(id)
                .map(|s| s.binding.local_fields().to_vec()),
        })
    }

    /// Applies `edit` to the authoritative list of `authority` and persists the result.
    ///
    /// The edit runs once against local canonical state to stage the overlay, and again
    /// against the freshest copy of the view right before it is written.
    pub(crate) async fn write_fields<F>(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        authority: Authority,
        refresh: bool,
        edit: F,
    ) -> ViewWrite
    where
        F: Fn(&[FieldReference]) -> Vec<FieldReference>,
    {
        let (view_id, step_id) = match authority {
            Authority::Step(step_id) => {
                let current = snapshot.canonical_fields(authority);
                let next = edit(&current);
                snapshot.set_step_fields(step_id, next.clone());
                self.overlay.discard(OverlayKey::Step(step_id));
                return ViewWrite::Written(next);
            }
            Authority::View { view_id, step_id } => (view_id, step_id),
        };

        let key = OverlayKey::View(view_id);
        let canonical = snapshot.canonical_fields(authority);
        self.overlay.stage(key, &canonical, edit(&canonical));

        let mut view = match self.base_view(snapshot, report, view_id, refresh).await {
            BaseView::Found(view) => view,
            BaseView::Gone => {
                self.overlay.discard(key);
                return match step_id {
                    Some(step_id) => {
                        let next = edit(&canonical);
                        snapshot.set_step_fields(step_id, next.clone());
                        report.warn(Warning::StaleViewLink { step_id, view_id });
                        ViewWrite::Unlinked(next)
                    }
                    None => ViewWrite::Failed,
                };
            }
            BaseView::Unavailable => {
                self.overlay.discard(key);
                return ViewWrite::Failed;
            }
        };

        let next = edit(&view.model.fields);
        view.model.fields = next.clone();
        report.issue(Effect::UpdateView(view_id));
        match self.backend.update_view(view_id, view).await {
            Ok(()) => {
                snapshot.sync_view_fields(view_id, next.clone());
                self.overlay.reconcile(key, &next);
                debug!(view_id, fields = next.len(), "View field list persisted");
                ViewWrite::Written(next)
            }
            Err(e) => {
                self.overlay.discard(key);
                report.warn(Warning::persistence("update view", e));
                ViewWrite::Failed
            }
        }
    }

    /// The copy of a view a write should start from.
    async fn base_view(
        &self,
        snapshot: &mut Snapshot,
        report: &mut Report,
        view_id: ViewId,
        refresh: bool,
    ) -> BaseView {
        if !refresh || !self.config.refresh_before_write {
            return snapshot
                .views
                .get(view_id)
                .cloned()
                .map_or(BaseView::Gone, BaseView::Found);
        }

        report.issue(Effect::ReadView(view_id));
        match self.backend.read_view(view_id).await {
            Ok(view) => {
                let fields = view.model.fields.clone();
                snapshot.views.upsert(view.clone());
                snapshot.sync_view_fields(view_id, fields);
                BaseView::Found(view)
            }
            Err(PersistenceError::NotFound { .. }) => {
                info!(view_id, "View no longer exists in storage");
                snapshot.views.remove(view_id);
                snapshot.touch();
                BaseView::Gone
            }
            Err(e) => {
                report.warn(Warning::persistence("read view", e));
                match snapshot.views.get(view_id) {
                    Some(view) => BaseView::Found(view.clone()),
                    None => {
                        warn!(view_id, "View is unreadable and has no local copy");
                        BaseView::Unavailable
                    }
                }
            }
        }
    }
}
