//! SurrealDB-backed `RunStore` and `OutcomeStore` implementations.
//!
//! Rows keep the aggregate as a JSON string plus the indexed columns, and
//! convert to/from the `storage_traits` envelopes at the boundary.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{
    OutcomeEnvelope, OutcomeStore, RunEnvelope, RunId, RunStore, StorageResult,
};
use crate::SurrealHandle;

const RUN_ID_INDEX: &str = "idx_release_run_id";
const ACTIVE_SLOT_INDEX: &str = "idx_release_active_slot";
const OUTCOME_ID_INDEX: &str = "idx_release_outcome_id";

fn backend(e: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(e.to_string())
}

fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{raw}': {e}")))
}

fn active_slot(envelope: &RunEnvelope) -> String {
    if envelope.active {
        format!("active:{}", envelope.repo_path)
    } else {
        format!("closed:{}", envelope.run_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    run_id: String,
    repo_path: String,
    state: String,
    active: bool,
    active_slot: String,
    revision: u64,
    created_at: String,
    updated_at: String,
    created_at_us: i64,
    updated_at_us: i64,
    payload: String,
}

impl RunRow {
    fn from_envelope(envelope: &RunEnvelope) -> StorageResult<Self> {
        Ok(Self {
            id: None,
            run_id: envelope.run_id.0.clone(),
            repo_path: envelope.repo_path.clone(),
            state: envelope.state.clone(),
            active: envelope.active,
            active_slot: active_slot(envelope),
            revision: envelope.revision,
            created_at: envelope.created_at.to_rfc3339(),
            updated_at: envelope.updated_at.to_rfc3339(),
            created_at_us: envelope.created_at.timestamp_micros(),
            updated_at_us: envelope.updated_at.timestamp_micros(),
            payload: serde_json::to_string(&envelope.payload)?,
        })
    }

    fn into_envelope(self) -> StorageResult<RunEnvelope> {
        Ok(RunEnvelope {
            run_id: RunId(self.run_id),
            repo_path: self.repo_path,
            state: self.state,
            active: self.active,
            revision: self.revision,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
            payload: serde_json::from_str(&self.payload)?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OutcomeRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<surrealdb::sql::Thing>,
    outcome_id: String,
    repository: String,
    recorded_at: String,
    recorded_at_us: i64,
    payload: String,
}

// ---------------------------------------------------------------------------
// SurrealRunStore
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`RunStore`].
#[derive(Clone)]
pub struct SurrealRunStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealRunStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }

    async fn select_one(&self, sql: &'static str, key: &str, value: String) -> StorageResult<Option<RunRow>> {
        let mut res = self
            .handle
            .db()
            .query(sql)
            .bind((key.to_string(), value))
            .await
            .map_err(backend)?;
        let rows: Vec<RunRow> = res.take(0).map_err(backend)?;
        Ok(rows.into_iter().next())
    }

    async fn fetch(&self, rid: &str) -> StorageResult<Option<RunRow>> {
        self.select_one(
            "SELECT * FROM release_runs WHERE run_id = $rid",
            "rid",
            rid.to_string(),
        )
        .await
    }

    async fn active_conflict(&self, envelope: &RunEnvelope) -> StorageResult<StorageError> {
        let other = self
            .find_active(&envelope.repo_path)
            .await?
            .map(|e| e.run_id.0)
            .unwrap_or_default();
        Ok(StorageError::ActiveRunExists {
            repo_path: envelope.repo_path.clone(),
            run_id: other,
        })
    }

    async fn insert(&self, mut envelope: RunEnvelope) -> StorageResult<RunEnvelope> {
        let rid = envelope.run_id.0.clone();
        if self.fetch(&rid).await?.is_some() {
            return Err(StorageError::AlreadyExists { id: rid });
        }
        if envelope.active {
            if let Some(other) = self.find_active(&envelope.repo_path).await? {
                return Err(StorageError::ActiveRunExists {
                    repo_path: envelope.repo_path.clone(),
                    run_id: other.run_id.0,
                });
            }
        }

        envelope.revision = 1;
        let row = RunRow::from_envelope(&envelope)?;
        debug!(run_id = %rid, repo_path = %envelope.repo_path, "inserting release run");

        let created: Result<Option<RunRow>, surrealdb::Error> = self
            .handle
            .db()
            .create("release_runs")
            .content(row)
            .await;

        match created {
            Ok(_) => Ok(envelope),
            Err(e) if e.to_string().contains(ACTIVE_SLOT_INDEX) => {
                Err(self.active_conflict(&envelope).await?)
            }
            Err(e) if e.to_string().contains(RUN_ID_INDEX) => {
                Err(StorageError::AlreadyExists { id: rid })
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn compare_and_swap(
        &self,
        mut envelope: RunEnvelope,
        expected: u64,
    ) -> StorageResult<RunEnvelope> {
        let rid = envelope.run_id.0.clone();
        envelope.revision = expected + 1;
        let row = RunRow::from_envelope(&envelope)?;
        debug!(run_id = %rid, revision = envelope.revision, "updating release run");

        let result = self
            .handle
            .db()
            .query("UPDATE release_runs CONTENT $row WHERE run_id = $rid AND revision = $expected")
            .bind(("row", row))
            .bind(("rid", rid.clone()))
            .bind(("expected", expected))
            .await;

        let mut res = match result {
            Ok(res) => res,
            Err(e) => return Err(backend(e)),
        };
        let updated: Result<Vec<RunRow>, surrealdb::Error> = res.take(0);
        match updated {
            Ok(rows) if !rows.is_empty() => Ok(envelope),
            Ok(_) => match self.fetch(&rid).await? {
                None => Err(StorageError::RunNotFound { run_id: rid }),
                Some(stored) => Err(StorageError::ConcurrentModification {
                    run_id: rid,
                    expected,
                    actual: stored.revision,
                }),
            },
            Err(e) if e.to_string().contains(ACTIVE_SLOT_INDEX) => {
                Err(self.active_conflict(&envelope).await?)
            }
            Err(e) => Err(backend(e)),
        }
    }
}

#[async_trait]
impl RunStore for SurrealRunStore {
    async fn load(&self, run_id: &RunId) -> StorageResult<RunEnvelope> {
        self.fetch(&run_id.0)
            .await?
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: run_id.0.clone(),
            })?
            .into_envelope()
    }

    async fn save(
        &self,
        envelope: RunEnvelope,
        expected_revision: Option<u64>,
    ) -> StorageResult<RunEnvelope> {
        match expected_revision {
            None => self.insert(envelope).await,
            Some(expected) => self.compare_and_swap(envelope, expected).await,
        }
    }

    async fn find_active(&self, repo_path: &str) -> StorageResult<Option<RunEnvelope>> {
        self.select_one(
            "SELECT * FROM release_runs WHERE repo_path = $repo AND active = true",
            "repo",
            repo_path.to_string(),
        )
        .await?
        .map(RunRow::into_envelope)
        .transpose()
    }

    async fn find_latest(&self, repo_path: &str) -> StorageResult<Option<RunEnvelope>> {
        self.select_one(
            "SELECT * FROM release_runs WHERE repo_path = $repo \
             ORDER BY updated_at_us DESC, created_at_us DESC LIMIT 1",
            "repo",
            repo_path.to_string(),
        )
        .await?
        .map(RunRow::into_envelope)
        .transpose()
    }

    async fn delete(&self, run_id: &RunId) -> StorageResult<()> {
        self.handle
            .db()
            .query("DELETE release_runs WHERE run_id = $rid")
            .bind(("rid", run_id.0.clone()))
            .await
            .map_err(backend)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SurrealOutcomeStore
// ---------------------------------------------------------------------------

/// SurrealDB-backed implementation of [`OutcomeStore`].
#[derive(Clone)]
pub struct SurrealOutcomeStore {
    handle: Arc<SurrealHandle>,
}

impl SurrealOutcomeStore {
    pub fn new(handle: Arc<SurrealHandle>) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl OutcomeStore for SurrealOutcomeStore {
    async fn append(&self, envelope: OutcomeEnvelope) -> StorageResult<()> {
        let row = OutcomeRow {
            id: None,
            outcome_id: envelope.outcome_id.clone(),
            repository: envelope.repository.clone(),
            recorded_at: envelope.recorded_at.to_rfc3339(),
            recorded_at_us: envelope.recorded_at.timestamp_micros(),
            payload: serde_json::to_string(&envelope.payload)?,
        };

        let created: Result<Option<OutcomeRow>, surrealdb::Error> = self
            .handle
            .db()
            .create("release_outcomes")
            .content(row)
            .await;

        match created {
            Ok(_) => Ok(()),
            Err(e) if e.to_string().contains(OUTCOME_ID_INDEX) => Err(StorageError::AlreadyExists {
                id: envelope.outcome_id,
            }),
            Err(e) => Err(backend(e)),
        }
    }

    async fn recent(
        &self,
        repository: &str,
        limit: usize,
    ) -> StorageResult<Vec<OutcomeEnvelope>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT * FROM release_outcomes WHERE repository = $repo \
             ORDER BY recorded_at_us DESC LIMIT {limit}"
        );
        let mut res = self
            .handle
            .db()
            .query(sql)
            .bind(("repo", repository.to_string()))
            .await
            .map_err(backend)?;
        let rows: Vec<OutcomeRow> = res.take(0).map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                Ok(OutcomeEnvelope {
                    outcome_id: row.outcome_id,
                    repository: row.repository,
                    recorded_at: parse_time(&row.recorded_at)?,
                    payload: serde_json::from_str(&row.payload)?,
                })
            })
            .collect()
    }
}
