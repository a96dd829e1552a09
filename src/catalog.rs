use crate::model::{Field, FieldId, FieldPatch};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// A versioned snapshot of the global field catalog, indexed by id and by unique name.
///
/// Fields without an id are unpersisted drafts and are never indexed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Field>", into = "Vec<Field>")]
pub struct FieldCatalog {
    fields: Vec<Field>,
    by_id: AHashMap<FieldId, usize>,
    by_name: AHashMap<String, usize>,
    version: u64,
}

impl From<Vec<Field>> for FieldCatalog {
    fn from(fields: Vec<Field>) -> Self {
        let mut catalog = FieldCatalog::default();
        catalog.replace(fields);
        catalog.version = 0;
        catalog
    }
}

impl From<FieldCatalog> for Vec<Field> {
    fn from(catalog: FieldCatalog) -> Self {
        catalog.fields
    }
}

impl FieldCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Incremented every time the catalog contents change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn get(&self, id: FieldId) -> Option<&Field> {
        self.by_id.get(&id).map(|idx| &self.fields[*idx])
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|idx| &self.fields[*idx])
    }

    pub fn contains(&self, id: FieldId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Maps a server-assigned name back to the field's id, if the field is visible yet.
    pub fn resolve_name(&self, name: &str) -> Option<FieldId> {
        self.get_by_name(name).and_then(|f| f.id)
    }

    /// Replaces the whole snapshot with a freshly listed one.
    pub fn replace(&mut self, fields: Vec<Field>) {
        self.by_id.clear();
        self.by_name.clear();
        for (idx, field) in fields.iter().enumerate() {
            if let Some(id) = field.id {
                self.by_id.insert(id, idx);
                self.by_name.insert(field.name.clone(), idx);
            }
        }
        self.fields = fields;
        self.version += 1;
    }

    /// Applies a partial update in place. Returns `false` if the field is unknown.
    pub fn patch(&mut self, patch: &FieldPatch) -> bool {
        match self.by_id.get(&patch.id) {
            Some(idx) => {
                patch.apply(&mut self.fields[*idx]);
                self.version += 1;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: FieldId) -> Option<Field> {
        let idx = *self.by_id.get(&id)?;
        let mut fields = std::mem::take(&mut self.fields);
        let removed = fields.remove(idx);
        self.replace(fields);
        Some(removed)
    }
}
