//! # Formflow - Field Reconciliation Engine
//!
//! **Formflow** keeps three loosely coupled representations of "which fields belong to
//! which step" consistent: the in-memory workflow tree (Stages → Processes → Steps),
//! independently persisted *views* (ordered field layouts a step may be linked to), and
//! a global *field catalog* that only reflects new fields after an asynchronous refresh.
//!
//! ## Core Workflow
//!
//! 1.  **Load a Snapshot**: Build a `Snapshot` (workflow + views + catalog) in code or
//!     load one from JSON with `Snapshot::from_file`.
//! 2.  **Pick a Backend**: Implement `PersistenceBackend` for your storage, or use the
//!     bundled `InMemoryBackend`.
//! 3.  **Build the Engine**: `ReconciliationEngine::builder(backend)` with an optional
//!     `EngineConfig` and ambient route parameters.
//! 4.  **Apply Intents**: Step type changes, field attachment (new or existing), reorder
//!     and removal. Each returns an `Outcome` with the persistence calls issued and any
//!     warnings; only validation errors are returned as `Err`.
//! 5.  **Render**: `displayed_fields` returns canonical state with any pending optimistic
//!     overlay on top; `Snapshot::groups` merges views and unlinked collecting steps.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formflow::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<()> {
//! let mut snapshot = Snapshot::from_file("path/to/workspace.json")?;
//! let backend = Arc::new(InMemoryBackend::from_snapshot(&snapshot));
//! let engine = ReconciliationEngine::builder(backend)
//!     .with_route_param("objectId", "12")
//!     .build();
//!
//! // Turn step 7 into a form: a view is created and linked.
//! let outcome = engine
//!     .on_step_type_change(
//!         &mut snapshot,
//!         7,
//!         StepType::Automation,
//!         StepType::CollectInformation,
//!         None,
//!     )
//!     .await?;
//! for warning in &outcome.warnings {
//!     println!("warning: {}", warning);
//! }
//!
//! // Create a field and attach it once the catalog exposes it.
//! let draft = FieldDraft::new("Email address", FieldType::Email).required(true);
//! engine.attach_new_field(&mut snapshot, EditTarget::Step(7), draft).await?;
//!
//! for group in snapshot.groups() {
//!     println!("{}: {} fields", group.name, group.fields.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod grouping;
pub mod model;
pub mod ordering;
pub mod overlay;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod store;
