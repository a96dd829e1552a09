pub mod field;
pub mod view;
pub mod workflow;

pub use field::*;
pub use view::*;
pub use workflow::*;

/// Server-assigned identifier of a `Field`.
pub type FieldId = u64;
/// Identifier of a persisted `View`.
pub type ViewId = u64;
/// Identifier of the data object a `View` (or a reference field) is bound to.
pub type ObjectId = u64;
pub type StageId = u64;
pub type ProcessId = u64;
pub type StepId = u64;
