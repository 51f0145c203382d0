//! Pure risk-gate evaluation.
//!
//! [`GovernanceEngine::evaluate`] has no I/O and reads no clock, so equal
//! inputs always produce an equal [`RiskEvaluation`].

use serde::{Deserialize, Serialize};

use super::context::EvaluationContext;
use super::evaluation::{Decision, RequiredAction, RiskEvaluation, RiskFactor, Severity};
use super::policy::{Action, ValidatedPolicySet};
use crate::domain::{Actor, ChangeSet, CommitCategory, TrustLevel};
use crate::memory::HistoricalContext;

/// Default score below which an unmatched evaluation auto-approves.
pub const DEFAULT_LOW_RISK_THRESHOLD: f64 = 0.3;

/// Weights used to build the base score and apply history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub breaking_per_commit: f64,
    pub breaking_cap: f64,
    pub security_per_file: f64,
    pub security_cap: f64,
    pub per_commit: f64,
    pub commit_cap: f64,
    pub per_file: f64,
    pub file_cap: f64,
    /// Multiplied by the rollback rate and added to the score.
    pub rollback_factor: f64,
    /// Subtracted for a strong track record.
    pub track_record_bonus: f64,
    pub track_record_min_success: f64,
    pub track_record_max_rollback: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            breaking_per_commit: 0.45,
            breaking_cap: 0.6,
            security_per_file: 0.15,
            security_cap: 0.3,
            per_commit: 0.01,
            commit_cap: 0.1,
            per_file: 0.002,
            file_cap: 0.1,
            rollback_factor: 0.3,
            track_record_bonus: 0.05,
            track_record_min_success: 0.9,
            track_record_max_rollback: 0.05,
        }
    }
}

/// Policy set plus scoring parameters.
#[derive(Debug, Clone)]
pub struct GovernanceEngine {
    policy: ValidatedPolicySet,
    weights: RiskWeights,
    low_risk_threshold: f64,
}

impl Default for GovernanceEngine {
    fn default() -> Self {
        Self::new(ValidatedPolicySet::empty())
    }
}

impl GovernanceEngine {
    pub fn new(policy: ValidatedPolicySet) -> Self {
        Self {
            policy,
            weights: RiskWeights::default(),
            low_risk_threshold: DEFAULT_LOW_RISK_THRESHOLD,
        }
    }

    pub fn with_weights(mut self, weights: RiskWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_low_risk_threshold(mut self, threshold: f64) -> Self {
        self.low_risk_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn policy(&self) -> &ValidatedPolicySet {
        &self.policy
    }

    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    pub fn low_risk_threshold(&self) -> f64 {
        self.low_risk_threshold
    }

    /// Score `change_set`, run the rules, and derive the decision.
    ///
    /// `history` adjusts the score only when it holds at least one outcome.
    pub fn evaluate(
        &self,
        change_set: &ChangeSet,
        actor: &Actor,
        history: Option<&HistoricalContext>,
    ) -> RiskEvaluation {
        let mut factors = self.base_factors(change_set);
        let base_score = total(&factors).clamp(0.0, 1.0);
        let mut risk_score = base_score;
        if let Some(ctx) = history.filter(|h| !h.is_empty()) {
            let adjustments = self.history_factors(ctx);
            // History adjusts the clamped base, not the raw sum.
            risk_score = (base_score + total(&adjustments)).clamp(0.0, 1.0);
            factors.extend(adjustments);
        }
        let mut rationale: Vec<String> = factors.iter().map(|f| f.description.clone()).collect();

        let ctx = EvaluationContext::new(change_set, actor, risk_score);
        let mut decision = None;
        let mut block_reason = None;
        let mut matched_rules = Vec::new();
        let mut required_actions = Vec::new();

        'rules: for rule in self.policy.rules() {
            if !rule.matches(&ctx) {
                continue;
            }
            matched_rules.push(rule.name().to_string());
            for action in rule.actions() {
                match action {
                    Action::Block { reason } => {
                        rationale.push(format!("rule '{}' blocked release: {reason}", rule.name()));
                        block_reason = Some(reason.clone());
                        decision = Some(Decision::Rejected);
                        break 'rules;
                    }
                    Action::Approve => {
                        rationale.push(format!("rule '{}' approved release", rule.name()));
                        decision = Some(Decision::Approved);
                        break 'rules;
                    }
                    Action::RequireApproval { role } => {
                        rationale.push(format!(
                            "rule '{}' requires approval from {role}",
                            rule.name()
                        ));
                        required_actions.push(RequiredAction {
                            rule: rule.name().to_string(),
                            role: role.clone(),
                        });
                        decision.get_or_insert(Decision::RequiresReview);
                    }
                }
            }
        }

        let decision = decision.unwrap_or_else(|| {
            if risk_score < self.low_risk_threshold {
                rationale.push(format!(
                    "risk {risk_score:.2} is below the auto-approve threshold {:.2}",
                    self.low_risk_threshold
                ));
                Decision::Approved
            } else {
                rationale.push(format!(
                    "risk {risk_score:.2} is at or above the auto-approve threshold {:.2}",
                    self.low_risk_threshold
                ));
                Decision::RequiresReview
            }
        });

        let severity = Severity::from_score(risk_score);
        let can_auto_approve = decision == Decision::Approved
            && severity != Severity::High
            && actor.trust_level >= TrustLevel::Trusted;

        RiskEvaluation {
            risk_score,
            severity,
            decision,
            can_auto_approve,
            risk_factors: factors,
            required_actions,
            rationale,
            matched_rules,
            block_reason,
            historical_context: history.cloned(),
            policy_digest: self.policy.digest().to_string(),
        }
    }

    fn base_factors(&self, change_set: &ChangeSet) -> Vec<RiskFactor> {
        let w = &self.weights;
        let breaking = change_set.count(CommitCategory::Breaking);
        let security = change_set.security_changes();
        let commits = change_set.total();
        let files = change_set.files_changed();

        let candidates = [
            (
                "breaking_changes",
                capped(breaking, w.breaking_per_commit, w.breaking_cap),
                format!("{breaking} breaking change(s)"),
            ),
            (
                "security_sensitive_files",
                capped(security, w.security_per_file, w.security_cap),
                format!("{security} security-sensitive file(s) changed"),
            ),
            (
                "commit_volume",
                capped(commits, w.per_commit, w.commit_cap),
                format!("{commits} commit(s)"),
            ),
            (
                "file_volume",
                capped(files, w.per_file, w.file_cap),
                format!("{files} file(s) changed"),
            ),
        ];
        candidates
            .into_iter()
            .filter(|(_, contribution, _)| *contribution > 0.0)
            .map(|(name, contribution, description)| RiskFactor {
                name: name.to_string(),
                contribution,
                description,
            })
            .collect()
    }

    fn history_factors(&self, history: &HistoricalContext) -> Vec<RiskFactor> {
        let w = &self.weights;
        let mut factors = Vec::new();
        if history.rollback_rate > 0.0 {
            factors.push(RiskFactor {
                name: "rollback_history".to_string(),
                contribution: w.rollback_factor * history.rollback_rate,
                description: format!(
                    "{:.0}% of the last {} release(s) were rolled back",
                    history.rollback_rate * 100.0,
                    history.recent_releases
                ),
            });
        }
        if history.success_rate >= w.track_record_min_success
            && history.rollback_rate <= w.track_record_max_rollback
        {
            factors.push(RiskFactor {
                name: "track_record".to_string(),
                contribution: -w.track_record_bonus,
                description: format!(
                    "{:.0}% success over the last {} release(s)",
                    history.success_rate * 100.0,
                    history.recent_releases
                ),
            });
        }
        factors
    }
}

fn total(factors: &[RiskFactor]) -> f64 {
    factors.iter().map(|f| f.contribution).sum()
}

fn capped(count: usize, weight: f64, cap: f64) -> f64 {
    (count as f64 * weight).min(cap)
}
