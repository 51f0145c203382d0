//! Helmsman-State: persistence for release runs and outcome history
//!
//! This crate owns every byte Helmsman writes. The release core talks to it
//! only through the `RunStore` and `OutcomeStore` traits.
//!
//! ## Layer 0 - Data/Persistence
//!
//! Focus: optimistic concurrency, the one-active-run-per-repository
//! invariant, and append-only history.
//!
//! ## Key Components
//!
//! - `RunStore` / `OutcomeStore`: backend-agnostic contracts
//! - `fakes`: in-memory implementations for tests
//! - `SurrealRunStore` / `SurrealOutcomeStore`: SurrealDB backends

mod error;
pub mod fakes;
mod handle;
mod migrations;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::SurrealHandle;
pub use storage_traits::{
    OutcomeEnvelope, OutcomeStore, RunEnvelope, RunId, RunStore, StorageResult,
};
pub use surreal_store::{SurrealOutcomeStore, SurrealRunStore};

/// Result type for connection and schema operations
pub type Result<T> = std::result::Result<T, StateError>;
