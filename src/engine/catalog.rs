use super::{Effect, Outcome, ReconciliationEngine, Report};
use crate::error::{ValidationError, Warning};
use crate::model::FieldPatch;
use crate::snapshot::Snapshot;

impl ReconciliationEngine {
    /// Replaces the catalog with a fresh listing. Returns `false` if the listing failed,
    /// in which case the previous catalog is kept.
    pub async fn refresh_catalog(&self, snapshot: &mut Snapshot) -> Outcome<bool> {
        let mut report = Report::default();
        report.issue(Effect::ListFields);
        let refreshed = match self.backend.list_fields().await {
            Ok(fields) => {
                snapshot.catalog.replace(fields);
                snapshot.touch();
                true
            }
            Err(e) => {
                report.warn(Warning::persistence("list fields", e));
                false
            }
        };
        report.finish(refreshed)
    }

    /// Edits a field in place. The catalog copy is only patched once storage accepted it.
    pub async fn update_field(
        &self,
        snapshot: &mut Snapshot,
        patch: FieldPatch,
    ) -> Result<Outcome<bool>, ValidationError> {
        patch.validate()?;
        if !snapshot.catalog.contains(patch.id) {
            return Err(ValidationError::FieldNotFound(patch.id));
        }

        let mut report = Report::default();
        report.issue(Effect::UpdateField(patch.id));
        let updated = match self.backend.update_field(patch.clone()).await {
            Ok(()) => {
                snapshot.catalog.patch(&patch);
                snapshot.touch();
                true
            }
            Err(e) => {
                report.warn(Warning::persistence("update field", e));
                false
            }
        };
        Ok(report.finish(updated))
    }
}
