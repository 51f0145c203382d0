//! Governance service: the pure engine plus Release Memory.

use helmsman_state::OutcomeStore;

use super::engine::GovernanceEngine;
use super::evaluation::RiskEvaluation;
use crate::domain::{Actor, ReleaseRun, Result};
use crate::memory::{ReleaseMemory, DEFAULT_HISTORY_WINDOW};
use crate::metrics::METRICS;

/// Serves `evaluate` for release runs.
pub struct GovernanceService<O: OutcomeStore> {
    engine: GovernanceEngine,
    memory: ReleaseMemory<O>,
    history_window: usize,
}

impl<O: OutcomeStore> GovernanceService<O> {
    pub fn new(engine: GovernanceEngine, memory: ReleaseMemory<O>) -> Self {
        Self {
            engine,
            memory,
            history_window: DEFAULT_HISTORY_WINDOW,
        }
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window.max(1);
        self
    }

    pub fn engine(&self) -> &GovernanceEngine {
        &self.engine
    }

    /// Evaluate `run` as proposed by `actor`.
    ///
    /// Reads never touch the run. A run that was never planned fails with
    /// `ChangeSetMissing`.
    pub async fn evaluate(
        &self,
        run: &ReleaseRun,
        actor: &Actor,
        repository: &str,
        include_history: bool,
    ) -> Result<RiskEvaluation> {
        let change_set = run.require_change_set()?;
        let history = if include_history {
            Some(
                self.memory
                    .historical_context(repository, self.history_window)
                    .await?,
            )
        } else {
            None
        };

        let evaluation = self.engine.evaluate(change_set, actor, history.as_ref());
        METRICS.inc_evaluations();
        if evaluation.is_rejected() {
            METRICS.inc_rejections();
        }
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeCommit, ChangeSet, CommitCategory, ReleaseError, TrustLevel};
    use chrono::Utc;
    use helmsman_state::fakes::MemoryOutcomeStore;
    use semver::Version;
    use std::sync::Arc;

    fn planned_run() -> ReleaseRun {
        let mut run = ReleaseRun::new("/repo", "main", Version::new(1, 0, 0), Utc::now());
        run.plan(
            ChangeSet::new(vec![ChangeCommit::new("a", "fix: x", CommitCategory::Fix)]),
            None,
            Utc::now(),
        )
        .unwrap();
        run
    }

    #[tokio::test]
    async fn test_unplanned_run_is_guard_violation() {
        let service = GovernanceService::new(
            GovernanceEngine::default(),
            ReleaseMemory::new(Arc::new(MemoryOutcomeStore::new())),
        );
        let run = ReleaseRun::new("/repo", "main", Version::new(1, 0, 0), Utc::now());
        let err = service
            .evaluate(&run, &Actor::human("dana", TrustLevel::Trusted), "/repo", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::ChangeSetMissing));
    }

    #[tokio::test]
    async fn test_history_is_read_only_when_requested() {
        let store = Arc::new(MemoryOutcomeStore::new());
        let memory = ReleaseMemory::new(Arc::clone(&store));
        let actor = Actor::human("dana", TrustLevel::Trusted);
        memory
            .record_rollback("/repo", "0.9.0", &actor, Utc::now())
            .await
            .unwrap();
        let service = GovernanceService::new(GovernanceEngine::default(), memory);
        let run = planned_run();

        let without = service.evaluate(&run, &actor, "/repo", false).await.unwrap();
        assert!(without.historical_context.is_none());

        let with = service.evaluate(&run, &actor, "/repo", true).await.unwrap();
        let ctx = with.historical_context.clone().unwrap();
        assert_eq!(ctx.rollbacks, 1);
        assert!(with.risk_score > without.risk_score);
    }

    #[tokio::test]
    async fn test_memory_failure_propagates() {
        let service = GovernanceService::new(
            GovernanceEngine::default(),
            ReleaseMemory::new(Arc::new(MemoryOutcomeStore::unavailable())),
        );
        let err = service
            .evaluate(&planned_run(), &Actor::human("dana", TrustLevel::Trusted), "/repo", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ReleaseError::Memory(_)));
    }
}
