//! Global atomic counters for Helmsman releases.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lock-free release counters.
pub struct Metrics {
    transitions: AtomicU64,
    evaluations: AtomicU64,
    rejections: AtomicU64,
    publishes_succeeded: AtomicU64,
    publishes_failed: AtomicU64,
    outcome_record_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            transitions: AtomicU64::new(0),
            evaluations: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            publishes_succeeded: AtomicU64::new(0),
            publishes_failed: AtomicU64::new(0),
            outcome_record_failures: AtomicU64::new(0),
        }
    }

    /// A persisted state transition.
    pub fn inc_transitions(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "transitions", "counter incremented");
    }

    pub fn inc_evaluations(&self) {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "evaluations", "counter incremented");
    }

    /// An evaluation that ended `rejected`.
    pub fn inc_rejections(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rejections", "counter incremented");
    }

    pub fn inc_publishes_succeeded(&self) {
        self.publishes_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "publishes_succeeded", "counter incremented");
    }

    pub fn inc_publishes_failed(&self) {
        self.publishes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "publishes_failed", "counter incremented");
    }

    /// An outcome that could not be written to Release Memory.
    pub fn inc_outcome_record_failures(&self) {
        self.outcome_record_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "outcome_record_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            transitions = self.transitions(),
            evaluations = self.evaluations(),
            rejections = self.rejections(),
            publishes_succeeded = self.publishes_succeeded(),
            publishes_failed = self.publishes_failed(),
            outcome_record_failures = self.outcome_record_failures(),
        );
    }

    pub fn transitions(&self) -> u64 {
        self.transitions.load(Ordering::Relaxed)
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    pub fn publishes_succeeded(&self) -> u64 {
        self.publishes_succeeded.load(Ordering::Relaxed)
    }

    pub fn publishes_failed(&self) -> u64 {
        self.publishes_failed.load(Ordering::Relaxed)
    }

    pub fn outcome_record_failures(&self) -> u64 {
        self.outcome_record_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.transitions.store(0, Ordering::Relaxed);
        self.evaluations.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
        self.publishes_succeeded.store(0, Ordering::Relaxed);
        self.publishes_failed.store(0, Ordering::Relaxed);
        self.outcome_record_failures.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_transitions();
        m.inc_transitions();
        assert_eq!(m.transitions(), 2);

        m.inc_evaluations();
        m.inc_rejections();
        assert_eq!(m.evaluations(), 1);
        assert_eq!(m.rejections(), 1);

        m.inc_outcome_record_failures();
        assert_eq!(m.outcome_record_failures(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_transitions();
        m.inc_publishes_succeeded();
        m.inc_publishes_failed();
        m.reset();
        assert_eq!(m.transitions(), 0);
        assert_eq!(m.publishes_succeeded(), 0);
        assert_eq!(m.publishes_failed(), 0);
    }
}
