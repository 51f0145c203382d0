//! Best-effort outcome recording.

use helmsman_state::OutcomeStore;

use super::history::ReleaseMemory;
use crate::domain::Outcome;
use crate::metrics::METRICS;
use crate::obs;

/// Writes outcomes into Release Memory without ever failing the caller.
pub struct OutcomeRecorder<O: OutcomeStore> {
    memory: ReleaseMemory<O>,
}

impl<O: OutcomeStore> OutcomeRecorder<O> {
    pub fn new(memory: ReleaseMemory<O>) -> Self {
        Self { memory }
    }

    /// Append `outcome`; failures are logged and counted, then dropped.
    /// Returns whether the entry was stored.
    pub async fn record_best_effort(&self, outcome: &Outcome) -> bool {
        match self.memory.record_outcome(outcome).await {
            Ok(()) => true,
            Err(err) => {
                METRICS.inc_outcome_record_failures();
                obs::emit_outcome_record_failed(&outcome.release_id, &err);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Actor, TrustLevel};
    use chrono::Utc;
    use helmsman_state::fakes::MemoryOutcomeStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unavailable_store_is_swallowed() {
        let memory = ReleaseMemory::new(Arc::new(MemoryOutcomeStore::unavailable()));
        let recorder = OutcomeRecorder::new(memory);
        let outcome = Outcome::rollback("/repo", "1.0.0", &Actor::ci("bot", TrustLevel::Trusted), Utc::now());
        assert!(!recorder.record_best_effort(&outcome).await);
    }

    #[tokio::test]
    async fn test_records_when_available() {
        let store = Arc::new(MemoryOutcomeStore::new());
        let recorder = OutcomeRecorder::new(ReleaseMemory::new(Arc::clone(&store)));
        let outcome = Outcome::rollback("/repo", "1.0.0", &Actor::ci("bot", TrustLevel::Trusted), Utc::now());
        assert!(recorder.record_best_effort(&outcome).await);
        assert_eq!(store.len(), 1);
    }
}
