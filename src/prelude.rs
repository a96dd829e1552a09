//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types from the formflow crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use formflow::prelude::*;
//! use std::sync::Arc;
//!
//! # fn build() -> Result<()> {
//! let snapshot = Snapshot::from_file("path/to/workspace.json")?;
//! let engine = ReconciliationEngine::builder(Arc::new(InMemoryBackend::from_snapshot(&snapshot)))
//!     .with_config(EngineConfig::from_file("path/to/config.json")?)
//!     .build();
//! # Ok(())
//! # }
//! ```

// Engine and its results
pub use crate::engine::{
    CommitSummary, Effect, NewFieldAttachment, Outcome, ReconciliationEngine, Resolution,
};

// State
pub use crate::catalog::FieldCatalog;
pub use crate::grouping::{FieldGroup, GroupSource};
pub use crate::overlay::{OverlayHandle, OverlayKey, Reconciliation};
pub use crate::registry::ViewRegistry;
pub use crate::session::EditorSession;
pub use crate::snapshot::{EditTarget, InvariantViolation, Snapshot};

// Data model
pub use crate::model::{
    Field, FieldBinding, FieldDraft, FieldId, FieldPatch, FieldReference, FieldType, Process,
    Stage, Step, StepId, StepType, View, ViewId, ViewModel, Workflow,
};
pub use crate::ordering::AttachIntent;

// Persistence
pub use crate::backend::{CreatedField, PersistenceBackend};
pub use crate::store::{InMemoryBackend, Operation};

// Configuration
pub use crate::config::{EngineConfig, ExhaustionPolicy};

// Error types
pub use crate::error::{
    InferenceError, PersistenceError, SnapshotError, ValidationError, Warning,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
