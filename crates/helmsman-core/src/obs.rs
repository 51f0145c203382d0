//! Structured lifecycle events for release runs.
//!
//! Every emitter logs with a stable `event` field so logs can be filtered
//! by lifecycle step. Workflow operations open their own spans via
//! `#[instrument]`.

use tracing::{info, warn};

use crate::domain::{RunState, Transition};
use crate::governance::RiskEvaluation;

pub fn emit_run_started(run_id: &str, repo_path: &str, branch: &str) {
    info!(event = "run.started", run_id = %run_id, repo = %repo_path, branch = %branch);
}

pub fn emit_transition(run_id: &str, transition: &Transition) {
    info!(
        event = "run.transition",
        run_id = %run_id,
        operation = transition.operation,
        from = %transition.from,
        to = %transition.to,
    );
}

/// A call that left the run unchanged.
pub fn emit_noop(run_id: &str, operation: &str, state: RunState) {
    info!(event = "run.noop", run_id = %run_id, operation = operation, state = %state);
}

pub fn emit_evaluated(run_id: &str, evaluation: &RiskEvaluation) {
    info!(
        event = "governance.evaluated",
        run_id = %run_id,
        risk_score = evaluation.risk_score,
        severity = %evaluation.severity,
        decision = %evaluation.decision,
        can_auto_approve = evaluation.can_auto_approve,
        matched_rules = evaluation.matched_rules.len(),
        policy_digest = %evaluation.policy_digest,
    );
}

/// Approval went ahead despite a rejected evaluation (non-strict mode).
pub fn emit_rejection_overridden(run_id: &str, risk_score: f64) {
    warn!(event = "governance.rejection_overridden", run_id = %run_id, risk_score = risk_score);
}

pub fn emit_publish_finished(run_id: &str, duration_ms: u64, success: bool) {
    info!(
        event = "run.publish_finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = success,
    );
}

pub fn emit_outcome_record_failed(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "memory.record_failed", run_id = %run_id, error = %error);
}

pub fn emit_run_discarded(run_id: &str, state: RunState) {
    info!(event = "run.discarded", run_id = %run_id, state = %state);
}
