use super::{FieldId, FieldReference, ObjectId, ViewId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LayoutKind {
    Form,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewLayout {
    #[serde(rename = "type")]
    pub kind: LayoutKind,
    pub columns: u32,
}

impl Default for ViewLayout {
    fn default() -> Self {
        Self {
            kind: LayoutKind::Form,
            columns: 1,
        }
    }
}

/// The ordered field layout stored with a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    #[serde(default)]
    pub fields: Vec<FieldReference>,
    #[serde(default)]
    pub layout: ViewLayout,
}

/// An independently persisted, named field layout bound to a data object.
/// The order of `model.fields` is authoritative for display and storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    pub id: ViewId,
    pub name: String,
    pub object_id: ObjectId,
    #[serde(default)]
    pub model: ViewModel,
}

impl View {
    pub fn field_ids(&self) -> Vec<FieldId> {
        self.model.fields.iter().map(|r| r.field_id).collect()
    }
}

/// A view that has not been assigned an id by storage yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewView {
    pub name: String,
    pub object_id: ObjectId,
    pub model: ViewModel,
}

impl NewView {
    pub fn with_id(self, id: ViewId) -> View {
        View {
            id,
            name: self.name,
            object_id: self.object_id,
            model: self.model,
        }
    }
}
