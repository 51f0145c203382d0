//! Outcome history and its aggregate queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use helmsman_state::{OutcomeEnvelope, OutcomeStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{MemoryError, MemoryResult};
use crate::domain::{Actor, Outcome, OutcomeStatus};

/// Number of recent outcomes considered when none is configured.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Aggregates over the most recent releases of one repository.
///
/// Rollback markers are not releases: they flag the release they name as
/// rolled back and are otherwise left out of every count. All rates are
/// `0.0` when there is no history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalContext {
    pub recent_releases: usize,
    pub success_rate: f64,
    pub rollback_rate: f64,
    pub failures: usize,
    pub rollbacks: usize,
    /// Mean risk score over releases that carried one.
    pub average_risk_score: f64,
}

impl HistoricalContext {
    pub fn from_outcomes(outcomes: &[Outcome]) -> Self {
        let (markers, releases): (Vec<&Outcome>, Vec<&Outcome>) =
            outcomes.iter().partition(|o| o.rolled_back);
        let total = releases.len();
        if total == 0 {
            return Self::default();
        }
        let is_rolled_back =
            |release: &Outcome| markers.iter().any(|marker| marker.marks(release));

        let rollbacks = releases.iter().filter(|r| is_rolled_back(r)).count();
        let successes = releases
            .iter()
            .filter(|r| r.is_success() && !is_rolled_back(r))
            .count();
        let failures = releases
            .iter()
            .filter(|r| r.status == OutcomeStatus::Failure)
            .count();
        let scores: Vec<f64> = releases.iter().filter_map(|r| r.risk_score).collect();
        let average_risk_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        Self {
            recent_releases: total,
            success_rate: successes as f64 / total as f64,
            rollback_rate: rollbacks as f64 / total as f64,
            failures,
            rollbacks,
            average_risk_score,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recent_releases == 0
    }
}

/// Append-only release history backed by an [`OutcomeStore`].
pub struct ReleaseMemory<O: OutcomeStore> {
    store: Arc<O>,
}

impl<O: OutcomeStore> Clone for ReleaseMemory<O> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<O: OutcomeStore> ReleaseMemory<O> {
    pub fn new(store: Arc<O>) -> Self {
        Self { store }
    }

    /// Append one outcome.
    pub async fn record_outcome(&self, outcome: &Outcome) -> MemoryResult<()> {
        let envelope = OutcomeEnvelope {
            outcome_id: outcome.outcome_id.clone(),
            repository: outcome.repository.clone(),
            recorded_at: outcome.recorded_at,
            payload: serde_json::to_value(outcome)?,
        };
        self.store.append(envelope).await?;
        debug!(
            outcome_id = %outcome.outcome_id,
            repository = %outcome.repository,
            status = %outcome.status,
            "outcome appended"
        );
        Ok(())
    }

    /// Append a marker flagging a published version as rolled back.
    pub async fn record_rollback(
        &self,
        repository: &str,
        version: &str,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> MemoryResult<Outcome> {
        let outcome = Outcome::rollback(repository, version, actor, now);
        self.record_outcome(&outcome).await?;
        Ok(outcome)
    }

    /// Up to `limit` outcomes for `repository`, newest first.
    pub async fn recent_outcomes(&self, repository: &str, limit: usize) -> MemoryResult<Vec<Outcome>> {
        let envelopes = self.store.recent(repository, limit).await?;
        envelopes
            .into_iter()
            .map(|env| {
                serde_json::from_value(env.payload).map_err(|source| MemoryError::Malformed {
                    outcome_id: env.outcome_id,
                    source,
                })
            })
            .collect()
    }

    /// Aggregate the most recent `window` releases for `repository`.
    ///
    /// Rollback markers do not take up window slots. The fetch widens until
    /// the window holds `window` releases or the history is exhausted.
    pub async fn historical_context(
        &self,
        repository: &str,
        window: usize,
    ) -> MemoryResult<HistoricalContext> {
        let mut limit = window;
        let mut outcomes = self.recent_outcomes(repository, limit).await?;
        loop {
            let markers = outcomes.iter().filter(|o| o.rolled_back).count();
            let releases = outcomes.len() - markers;
            if releases >= window || outcomes.len() < limit {
                break;
            }
            limit = window + markers;
            outcomes = self.recent_outcomes(repository, limit).await?;
        }

        let mut kept = 0;
        outcomes.retain(|o| {
            if o.rolled_back {
                return true;
            }
            kept += 1;
            kept <= window
        });
        Ok(HistoricalContext::from_outcomes(&outcomes))
    }
}
