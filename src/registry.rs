use crate::model::{FieldReference, ObjectId, View, ViewId};
use serde::{Deserialize, Serialize};

/// The known set of persisted views, in the order storage reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewRegistry {
    views: Vec<View>,
}

impl From<Vec<View>> for ViewRegistry {
    fn from(views: Vec<View>) -> Self {
        let mut registry = ViewRegistry::default();
        for view in views {
            registry.upsert(view);
        }
        registry
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &View> {
        self.views.iter()
    }

    pub fn get(&self, id: ViewId) -> Option<&View> {
        self.views.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: ViewId) -> bool {
        self.get(id).is_some()
    }

    /// The data object of the first view in scope, used when creating new views.
    pub fn first_object_id(&self) -> Option<ObjectId> {
        self.views.first().map(|v| v.object_id)
    }

    /// Inserts a view or replaces the stored copy with the same id, keeping its position.
    pub fn upsert(&mut self, view: View) {
        match self.views.iter_mut().find(|v| v.id == view.id) {
            Some(existing) => *existing = view,
            None => self.views.push(view),
        }
    }

    /// Replaces the field list of a known view. Returns `false` if the view is unknown.
    pub fn set_fields(&mut self, id: ViewId, fields: Vec<FieldReference>) -> bool {
        match self.views.iter_mut().find(|v| v.id == id) {
            Some(view) => {
                view.model.fields = fields;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: ViewId) -> Option<View> {
        let idx = self.views.iter().position(|v| v.id == id)?;
        Some(self.views.remove(idx))
    }
}
