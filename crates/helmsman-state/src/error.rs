//! Error types for helmsman-state

use thiserror::Error;

/// Errors raised while connecting to or preparing a backend.
#[derive(Error, Debug)]
pub enum StateError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    Connection(String),

    /// Database query error
    #[error("Database query failed: {0}")]
    Query(String),

    /// Schema setup error
    #[error("Schema setup failed: {0}")]
    SchemaSetup(String),
}

impl From<surrealdb::Error> for StateError {
    fn from(err: surrealdb::Error) -> Self {
        StateError::Query(err.to_string())
    }
}

/// Errors surfaced through the `RunStore` and `OutcomeStore` contracts.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("release run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("record already exists: {id}")]
    AlreadyExists { id: String },

    #[error("repository {repo_path} already has an active release run ({run_id})")]
    ActiveRunExists { repo_path: String, run_id: String },

    #[error(
        "release run {run_id} was modified concurrently (expected revision {expected}, found {actual})"
    )]
    ConcurrentModification {
        run_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether retrying after a fresh load can succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<StateError> for StorageError {
    fn from(err: StateError) -> Self {
        StorageError::Backend(err.to_string())
    }
}
