use crate::backend::{CreatedField, PersistenceBackend};
use crate::error::{PersistenceError, SnapshotError};
use crate::model::{Field, FieldDraft, FieldId, FieldPatch, NewView, View, ViewId};
use crate::snapshot::Snapshot;
use ahash::AHashMap;
use async_trait::async_trait;
use bincode::config::standard;
use bincode::serde::{decode_from_slice, encode_to_vec};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{Read, Write};
use tracing::debug;

/// The persistence operations, used to inject failures and inspect traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateView,
    ReadView,
    UpdateView,
    DeleteView,
    CreateField,
    ListFields,
    UpdateField,
    DeleteField,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    views: Vec<View>,
    fields: Vec<Field>,
    next_view_id: ViewId,
    next_field_id: FieldId,
}

/// An in-process storage with the same contract as a remote one.
///
/// New fields stay out of `list_fields` for `visibility_lag` further listings, which
/// reproduces the delayed catalog refresh that field resolution has to cope with.
pub struct InMemoryBackend {
    state: Mutex<StoreState>,
    hidden: Mutex<AHashMap<FieldId, u32>>,
    failures: Mutex<AHashMap<Operation, PersistenceError>>,
    calls: Mutex<Vec<Operation>>,
    visibility_lag: u32,
    reveal_ids: bool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::from_state(StoreState {
            next_view_id: 1,
            next_field_id: 1,
            ..StoreState::default()
        })
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
            hidden: Mutex::new(AHashMap::new()),
            failures: Mutex::new(AHashMap::new()),
            calls: Mutex::new(Vec::new()),
            visibility_lag: 0,
            reveal_ids: false,
        }
    }

    /// Seeds storage with the views and persisted fields of a snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let views: Vec<View> = snapshot.views.iter().cloned().collect();
        let fields: Vec<Field> = snapshot
            .catalog
            .fields()
            .iter()
            .filter(|f| f.id.is_some())
            .cloned()
            .collect();
        let next_view_id = views.iter().map(|v| v.id).max().unwrap_or(0) + 1;
        let next_field_id = fields.iter().filter_map(|f| f.id).max().unwrap_or(0) + 1;
        Self::from_state(StoreState {
            views,
            fields,
            next_view_id,
            next_field_id,
        })
    }

    pub fn with_visibility_lag(mut self, listings: u32) -> Self {
        self.visibility_lag = listings;
        self
    }

    /// Return the id of created fields right away instead of withholding it.
    pub fn with_revealed_ids(mut self, reveal: bool) -> Self {
        self.reveal_ids = reveal;
        self
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: Operation, error: PersistenceError) {
        self.failures.lock().insert(operation, error);
    }

    pub fn calls(&self) -> Vec<Operation> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls.lock().iter().filter(|op| **op == operation).count()
    }

    pub fn views(&self) -> Vec<View> {
        self.state.lock().views.clone()
    }

    pub fn view(&self, id: ViewId) -> Option<View> {
        self.state.lock().views.iter().find(|v| v.id == id).cloned()
    }

    /// Every stored field, including ones not yet visible through `list_fields`.
    pub fn fields(&self) -> Vec<Field> {
        self.state.lock().fields.clone()
    }

    fn enter(&self, operation: Operation) -> Result<(), PersistenceError> {
        self.calls.lock().push(operation);
        match self.failures.lock().remove(&operation) {
            Some(error) => {
                debug!(?operation, %error, "Injected storage failure");
                Err(error)
            }
            None => Ok(()),
        }
    }

    /// Saves the stored views and fields to a file using the bincode format.
    pub fn save(&self, path: &str) -> Result<(), SnapshotError> {
        let bytes = encode_to_vec(&*self.state.lock(), standard())
            .map_err(|e| SnapshotError::Encoding(format!("Serialization failed: {}", e)))?;
        let mut file = fs::File::create(path).map_err(|e| SnapshotError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        file.write_all(&bytes).map_err(|e| SnapshotError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    pub fn from_file(path: &str) -> Result<Self, SnapshotError> {
        let mut file = fs::File::open(path).map_err(|e| SnapshotError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| SnapshotError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        encode_to_vec(&*self.state.lock(), standard())
            .map_err(|e| SnapshotError::Encoding(format!("Serialization failed: {}", e)))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        decode_from_slice(bytes, standard())
            .map(|(state, _)| Self::from_state(state))
            .map_err(|e| SnapshotError::Encoding(format!("Deserialization failed: {}", e)))
    }
}

/// Derives a unique machine name from a label: "Full name" becomes `full_name`,
/// then `full_name_2`, `full_name_3`, ... on collision.
fn unique_name(label: &str, existing: &[Field]) -> String {
    let base: String = label
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");
    let base = if base.is_empty() { "field".to_string() } else { base };

    let taken = |name: &str| existing.iter().any(|f| f.name == name);
    if !taken(&base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[async_trait]
impl PersistenceBackend for InMemoryBackend {
    async fn create_view(&self, view: NewView) -> Result<ViewId, PersistenceError> {
        self.enter(Operation::CreateView)?;
        let mut state = self.state.lock();
        let id = state.next_view_id;
        state.next_view_id += 1;
        state.views.push(view.with_id(id));
        Ok(id)
    }

    async fn read_view(&self, id: ViewId) -> Result<View, PersistenceError> {
        self.enter(Operation::ReadView)?;
        self.view(id)
            .ok_or(PersistenceError::NotFound { kind: "View", id })
    }

    async fn update_view(&self, id: ViewId, view: View) -> Result<(), PersistenceError> {
        self.enter(Operation::UpdateView)?;
        let mut state = self.state.lock();
        let stored = state
            .views
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(PersistenceError::NotFound { kind: "View", id })?;
        *stored = View { id, ..view };
        Ok(())
    }

    async fn delete_view(&self, id: ViewId) -> Result<(), PersistenceError> {
        self.enter(Operation::DeleteView)?;
        let mut state = self.state.lock();
        let before = state.views.len();
        state.views.retain(|v| v.id != id);
        if state.views.len() == before {
            return Err(PersistenceError::NotFound { kind: "View", id });
        }
        Ok(())
    }

    async fn create_field(&self, draft: FieldDraft) -> Result<CreatedField, PersistenceError> {
        self.enter(Operation::CreateField)?;
        if draft.label.trim().is_empty() {
            return Err(PersistenceError::Rejected("label is required".to_string()));
        }
        let mut state = self.state.lock();
        let id = state.next_field_id;
        state.next_field_id += 1;
        let name = unique_name(&draft.label, &state.fields);
        let mut field = draft.into_field(name.clone());
        field.id = Some(id);
        state.fields.push(field);
        if self.visibility_lag > 0 {
            self.hidden.lock().insert(id, self.visibility_lag);
        }
        Ok(CreatedField {
            name,
            id: self.reveal_ids.then_some(id),
        })
    }

    async fn list_fields(&self) -> Result<Vec<Field>, PersistenceError> {
        self.enter(Operation::ListFields)?;
        let state = self.state.lock();
        let mut hidden = self.hidden.lock();
        let visible = state
            .fields
            .iter()
            .filter(|f| f.id.is_none_or(|id| !hidden.contains_key(&id)))
            .cloned()
            .collect();
        hidden.retain(|_, remaining| {
            *remaining -= 1;
            *remaining > 0
        });
        Ok(visible)
    }

    async fn update_field(&self, patch: FieldPatch) -> Result<(), PersistenceError> {
        self.enter(Operation::UpdateField)?;
        let mut state = self.state.lock();
        let field = state
            .fields
            .iter_mut()
            .find(|f| f.id == Some(patch.id))
            .ok_or(PersistenceError::NotFound {
                kind: "Field",
                id: patch.id,
            })?;
        patch.apply(field);
        Ok(())
    }

    async fn delete_field(&self, id: FieldId) -> Result<(), PersistenceError> {
        self.enter(Operation::DeleteField)?;
        let mut state = self.state.lock();
        let before = state.fields.len();
        state.fields.retain(|f| f.id != Some(id));
        if state.fields.len() == before {
            return Err(PersistenceError::NotFound { kind: "Field", id });
        }
        Ok(())
    }
}
