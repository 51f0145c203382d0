//! Typed access to persisted release runs.
//!
//! Converts between [`ReleaseRun`] and the storage layer's [`RunEnvelope`],
//! carrying the revision needed for optimistic saves.

use std::sync::Arc;

use helmsman_state::{RunEnvelope, RunId, RunStore};

use crate::domain::{ReleaseRun, Result};

/// A run together with the revision it was loaded at.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRun {
    pub run: ReleaseRun,
    pub revision: u64,
}

fn to_envelope(run: &ReleaseRun, revision: u64) -> Result<RunEnvelope> {
    Ok(RunEnvelope {
        run_id: run.run_id().clone(),
        repo_path: run.repo_path().to_string(),
        state: run.state().to_string(),
        active: run.is_active(),
        revision,
        created_at: run.created_at(),
        updated_at: run.updated_at(),
        payload: serde_json::to_value(run)?,
    })
}

fn from_envelope(envelope: RunEnvelope) -> Result<StoredRun> {
    let run: ReleaseRun = serde_json::from_value(envelope.payload)?;
    Ok(StoredRun {
        run,
        revision: envelope.revision,
    })
}

/// Thin typed layer over a [`RunStore`] backend.
pub struct RunRepository<R: RunStore> {
    store: Arc<R>,
}

impl<R: RunStore> Clone for RunRepository<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<R: RunStore> RunRepository<R> {
    pub fn new(store: Arc<R>) -> Self {
        Self { store }
    }

    pub async fn load(&self, run_id: &RunId) -> Result<StoredRun> {
        from_envelope(self.store.load(run_id).await?)
    }

    pub async fn find_active(&self, repo_path: &str) -> Result<Option<StoredRun>> {
        self.store
            .find_active(repo_path)
            .await?
            .map(from_envelope)
            .transpose()
    }

    pub async fn find_latest(&self, repo_path: &str) -> Result<Option<StoredRun>> {
        self.store
            .find_latest(repo_path)
            .await?
            .map(from_envelope)
            .transpose()
    }

    /// Persist a brand-new run.
    pub async fn insert(&self, run: &ReleaseRun) -> Result<StoredRun> {
        let saved = self.store.save(to_envelope(run, 0)?, None).await?;
        Ok(StoredRun {
            run: run.clone(),
            revision: saved.revision,
        })
    }

    /// Persist `run` if the stored copy is still at `expected_revision`.
    pub async fn update(&self, run: &ReleaseRun, expected_revision: u64) -> Result<StoredRun> {
        let envelope = to_envelope(run, expected_revision)?;
        let saved = self.store.save(envelope, Some(expected_revision)).await?;
        Ok(StoredRun {
            run: run.clone(),
            revision: saved.revision,
        })
    }

    pub async fn delete(&self, run_id: &RunId) -> Result<()> {
        self.store.delete(run_id).await?;
        Ok(())
    }
}
