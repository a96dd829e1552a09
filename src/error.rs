use crate::model::{FieldId, ObjectId, ProcessId, StageId, StepId, StepType, ViewId};
use thiserror::Error;

/// Errors raised synchronously before any persistence call is attempted.
/// When one of these is returned, no state has changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field label must not be empty")]
    EmptyLabel,

    #[error("No field was selected")]
    NoFieldSelected,

    #[error("Field '{0}' needs at least one option")]
    MissingOptions(String),

    #[error("Reference field '{0}' needs a target object")]
    MissingReferenceObject(String),

    #[error("Step name must not be empty")]
    EmptyStepName,

    #[error("Step {0} not found in the workflow")]
    StepNotFound(StepId),

    #[error("Stage {0} not found in the workflow")]
    StageNotFound(StageId),

    #[error("Process {0} not found in the workflow")]
    ProcessNotFound(ProcessId),

    #[error("View {0} not found")]
    ViewNotFound(ViewId),

    #[error("Field {0} not found in the catalog")]
    FieldNotFound(FieldId),

    #[error("Index {index} is out of range for a list of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Step {step_id} is of type '{found}', but the change was requested from '{expected}'")]
    StepTypeMismatch {
        step_id: StepId,
        expected: StepType,
        found: StepType,
    },

    #[error("Step {step_id} is linked to view {view_id}; address the view instead")]
    BindingMismatch { step_id: StepId, view_id: ViewId },

    #[error("Field {field_id} is not bound to step {step_id}")]
    FieldNotOnStep { step_id: StepId, field_id: FieldId },

    #[error("Step {0} does not collect information")]
    NotCollecting(StepId),
}

/// Failures to determine the data object a new view belongs to.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InferenceError {
    #[error("No data object for step {step_id}: no view in scope and no '{param}' route parameter")]
    ObjectIdUnresolved { step_id: StepId, param: String },

    #[error("Route parameter '{param}' has a non-numeric value '{value}'")]
    InvalidRouteParam { param: String, value: String },
}

/// Failures reported by the persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Storage unreachable: {0}")]
    Transport(String),

    #[error("{kind} {id} does not exist in storage")]
    NotFound { kind: &'static str, id: u64 },

    #[error("Storage rejected the request: {0}")]
    Rejected(String),
}

/// Errors that can occur while loading or saving snapshots and configuration.
#[derive(Error, Debug, Clone)]
pub enum SnapshotError {
    #[error("Could not access '{path}': {message}")]
    Io { path: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    Json(String),

    #[error("Binary encoding failed: {0}")]
    Encoding(String),
}

/// A degraded outcome that did not abort the operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    #[error("{operation} failed: {error}")]
    Persistence {
        operation: &'static str,
        error: PersistenceError,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] InferenceError),

    #[error(
        "Field '{name}' was created but did not appear in the catalog after {attempts} attempts"
    )]
    ResolutionExhausted { name: String, attempts: u32 },

    #[error(
        "Step {step_id} was linked to view {view_id}, which no longer exists; the step was unlinked"
    )]
    StaleViewLink { step_id: StepId, view_id: ViewId },
}

impl Warning {
    pub fn persistence(operation: &'static str, error: PersistenceError) -> Self {
        Warning::Persistence { operation, error }
    }
}
