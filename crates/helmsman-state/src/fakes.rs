//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryRunStore` and `MemoryOutcomeStore` that satisfy the trait
//! contracts without any external dependencies. Both can be told to fail
//! so callers can exercise their infrastructure-failure paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

// ---------------------------------------------------------------------------
// MemoryRunStore
// ---------------------------------------------------------------------------

/// In-memory run store backed by a `HashMap<run_id, RunEnvelope>`.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<HashMap<String, RunEnvelope>>,
    fail_next_save: AtomicBool,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `save` call fail with a backend error.
    pub fn fail_next_save(&self) {
        self.fail_next_save.store(true, Ordering::SeqCst);
    }

    /// Number of stored runs.
    pub fn len(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn latest_first(a: &RunEnvelope, b: &RunEnvelope) -> std::cmp::Ordering {
    b.updated_at
        .cmp(&a.updated_at)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn load(&self, run_id: &RunId) -> StorageResult<RunEnvelope> {
        let runs = self.runs.lock().unwrap();
        runs.get(&run_id.0)
            .cloned()
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: run_id.0.clone(),
            })
    }

    async fn save(
        &self,
        mut envelope: RunEnvelope,
        expected_revision: Option<u64>,
    ) -> StorageResult<RunEnvelope> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Backend("injected save failure".to_string()));
        }

        let mut runs = self.runs.lock().unwrap();
        let rid = envelope.run_id.0.clone();

        match expected_revision {
            None => {
                if runs.contains_key(&rid) {
                    return Err(StorageError::AlreadyExists { id: rid });
                }
                envelope.revision = 1;
            }
            Some(expected) => {
                let stored = runs
                    .get(&rid)
                    .ok_or_else(|| StorageError::RunNotFound { run_id: rid.clone() })?;
                if stored.revision != expected {
                    return Err(StorageError::ConcurrentModification {
                        run_id: rid,
                        expected,
                        actual: stored.revision,
                    });
                }
                envelope.revision = expected + 1;
            }
        }

        if envelope.active {
            if let Some(other) = runs
                .values()
                .find(|r| r.active && r.repo_path == envelope.repo_path && r.run_id.0 != rid)
            {
                return Err(StorageError::ActiveRunExists {
                    repo_path: envelope.repo_path.clone(),
                    run_id: other.run_id.0.clone(),
                });
            }
        }

        runs.insert(rid, envelope.clone());
        Ok(envelope)
    }

    async fn find_active(&self, repo_path: &str) -> StorageResult<Option<RunEnvelope>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs
            .values()
            .find(|r| r.active && r.repo_path == repo_path)
            .cloned())
    }

    async fn find_latest(&self, repo_path: &str) -> StorageResult<Option<RunEnvelope>> {
        let runs = self.runs.lock().unwrap();
        let mut matching: Vec<&RunEnvelope> =
            runs.values().filter(|r| r.repo_path == repo_path).collect();
        matching.sort_by(|a, b| latest_first(a, b));
        Ok(matching.first().map(|r| (*r).clone()))
    }

    async fn delete(&self, run_id: &RunId) -> StorageResult<()> {
        let mut runs = self.runs.lock().unwrap();
        runs.remove(&run_id.0);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryOutcomeStore
// ---------------------------------------------------------------------------

/// In-memory outcome store backed by a `Vec` in insertion order.
#[derive(Debug, Default)]
pub struct MemoryOutcomeStore {
    outcomes: Mutex<Vec<OutcomeEnvelope>>,
    unavailable: AtomicBool,
}

impl MemoryOutcomeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every call fails with a backend error.
    pub fn unavailable() -> Self {
        let store = Self::default();
        store.unavailable.store(true, Ordering::SeqCst);
        store
    }

    /// Number of stored outcomes across all repositories.
    pub fn len(&self) -> usize {
        self.outcomes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("outcome store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl OutcomeStore for MemoryOutcomeStore {
    async fn append(&self, envelope: OutcomeEnvelope) -> StorageResult<()> {
        self.check_available()?;
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.iter().any(|o| o.outcome_id == envelope.outcome_id) {
            return Err(StorageError::AlreadyExists {
                id: envelope.outcome_id,
            });
        }
        outcomes.push(envelope);
        Ok(())
    }

    async fn recent(
        &self,
        repository: &str,
        limit: usize,
    ) -> StorageResult<Vec<OutcomeEnvelope>> {
        self.check_available()?;
        let outcomes = self.outcomes.lock().unwrap();
        // Stable sort keeps insertion order for equal timestamps; reversing
        // afterwards puts the newest (and last inserted) first.
        let mut matching: Vec<OutcomeEnvelope> = outcomes
            .iter()
            .filter(|o| o.repository == repository)
            .cloned()
            .collect();
        matching.sort_by_key(|o| o.recorded_at);
        matching.reverse();
        matching.truncate(limit);
        Ok(matching)
    }
}
