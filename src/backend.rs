use crate::error::PersistenceError;
use crate::model::{Field, FieldDraft, FieldId, FieldPatch, NewView, View, ViewId};
use async_trait::async_trait;

/// What storage reports back after creating a field.
///
/// Storage normally withholds `id`; the field only becomes addressable once it shows up
/// in a later catalog listing. A backend that does return the id lets the engine skip
/// catalog polling entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedField {
    pub name: String,
    pub id: Option<FieldId>,
}

impl CreatedField {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            id: None,
        }
    }
}

/// The persistence collaborator consumed by the reconciliation engine.
///
/// Every call may fail; the engine turns failures into warnings and never lets them
/// unwind a workflow mutation.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn create_view(&self, view: NewView) -> Result<ViewId, PersistenceError>;

    async fn read_view(&self, id: ViewId) -> Result<View, PersistenceError>;

    async fn update_view(&self, id: ViewId, view: View) -> Result<(), PersistenceError>;

    async fn delete_view(&self, id: ViewId) -> Result<(), PersistenceError>;

    async fn create_field(&self, draft: FieldDraft) -> Result<CreatedField, PersistenceError>;

    /// The catalog snapshot as storage currently sees it.
    async fn list_fields(&self) -> Result<Vec<Field>, PersistenceError>;

    async fn update_field(&self, patch: FieldPatch) -> Result<(), PersistenceError>;

    async fn delete_field(&self, id: FieldId) -> Result<(), PersistenceError>;
}
