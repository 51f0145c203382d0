//! Error types for Release Memory.

use helmsman_state::StorageError;

/// Errors produced by memory operations.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("outcome store error: {0}")]
    Storage(#[from] StorageError),

    #[error("malformed outcome {outcome_id}: {source}")]
    Malformed {
        outcome_id: String,
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for memory operations.
pub type MemoryResult<T> = std::result::Result<T, MemoryError>;
