//! Merges stored views and collecting steps into one de-duplicated list of field groups.

use crate::model::{FieldReference, StepId, ViewId, Workflow};
use crate::registry::ViewRegistry;
use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupSource {
    View(ViewId),
    Step(StepId),
}

/// One entry of the merged "collection of field groupings".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldGroup {
    pub source: GroupSource,
    pub name: String,
    pub fields: Vec<FieldReference>,
}

/// Views come first, sorted by name (case-insensitive, ties broken by id). Collecting
/// steps follow in workflow order, except those whose view is already listed.
pub fn merge_groups(views: &ViewRegistry, workflow: &Workflow) -> Vec<FieldGroup> {
    let stored = views
        .iter()
        .sorted_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.id.cmp(&b.id))
        })
        .map(|view| FieldGroup {
            source: GroupSource::View(view.id),
            name: view.name.clone(),
            fields: view.model.fields.clone(),
        });

    let unlinked = workflow
        .steps()
        .filter(|step| step.is_collecting())
        .filter(|step| step.view_id().is_none_or(|id| !views.contains(id)))
        .map(|step| FieldGroup {
            source: GroupSource::Step(step.id),
            name: step.name.clone(),
            fields: step.binding.local_fields().to_vec(),
        });

    stored.chain(unlinked).collect()
}
