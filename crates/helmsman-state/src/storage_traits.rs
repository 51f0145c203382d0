//! Storage trait definitions for Helmsman
//!
//! These traits define the persistence contract for the release core:
//! - `RunStore`: one durable record per release run, keyed by `RunId`
//! - `OutcomeStore`: append-only release outcome history per repository
//!
//! Both traits are async and backend-agnostic. The stored payload is the
//! serialized aggregate; the envelope carries only the columns a backend
//! needs to index and to enforce its invariants. In-memory fakes are
//! provided for testing via the `fakes` module.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// RunStore: release run persistence
// ---------------------------------------------------------------------------

/// Opaque identifier for a release run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

/// Persisted form of a release run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEnvelope {
    pub run_id: RunId,
    /// Repository path the run belongs to.
    pub repo_path: String,
    /// Lifecycle state label (informational, e.g. "planned").
    pub state: String,
    /// Whether the run is non-terminal. At most one active run per repository.
    pub active: bool,
    /// Optimistic concurrency token, incremented by every successful save.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Serialized aggregate.
    pub payload: serde_json::Value,
}

/// Release run store.
///
/// Guarantees:
/// - `save(envelope, None)` inserts a new record and fails `AlreadyExists`
///   if the run id is taken, or `ActiveRunExists` if the envelope is active
///   while another active run exists for the same repository path.
/// - `save(envelope, Some(rev))` replaces the record only if its stored
///   revision is still `rev`; otherwise `ConcurrentModification`.
/// - A successful save returns the stored envelope with `revision + 1`.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Load a run by ID. Returns `StorageError::RunNotFound` if absent.
    async fn load(&self, run_id: &RunId) -> StorageResult<RunEnvelope>;

    /// Insert or compare-and-swap a run.
    async fn save(
        &self,
        envelope: RunEnvelope,
        expected_revision: Option<u64>,
    ) -> StorageResult<RunEnvelope>;

    /// The active (non-terminal) run for a repository, if any.
    async fn find_active(&self, repo_path: &str) -> StorageResult<Option<RunEnvelope>>;

    /// The most recently updated run for a repository, active or not.
    async fn find_latest(&self, repo_path: &str) -> StorageResult<Option<RunEnvelope>>;

    /// Delete a run by ID. No-op if absent.
    async fn delete(&self, run_id: &RunId) -> StorageResult<()>;
}

// ---------------------------------------------------------------------------
// OutcomeStore: release memory
// ---------------------------------------------------------------------------

/// Persisted form of a single release outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEnvelope {
    /// Unique identifier of this history entry.
    pub outcome_id: String,
    /// Repository the outcome belongs to.
    pub repository: String,
    /// When the outcome was recorded (recency ordering key).
    pub recorded_at: DateTime<Utc>,
    /// Serialized outcome.
    pub payload: serde_json::Value,
}

/// Append-only release outcome store.
///
/// Semantics:
/// - `append` adds a new entry; entries are never updated or deleted.
/// - `recent` returns up to `limit` entries for a repository, newest first
///   by `recorded_at`.
#[async_trait]
pub trait OutcomeStore: Send + Sync {
    /// Append an outcome. Fails `AlreadyExists` on a duplicate `outcome_id`.
    async fn append(&self, envelope: OutcomeEnvelope) -> StorageResult<()>;

    /// Most recent outcomes for a repository, newest first.
    async fn recent(&self, repository: &str, limit: usize)
        -> StorageResult<Vec<OutcomeEnvelope>>;
}
