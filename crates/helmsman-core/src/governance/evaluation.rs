//! Risk evaluation value objects.

use serde::{Deserialize, Serialize};

use crate::memory::HistoricalContext;

/// Categorical governance outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
    RequiresReview,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approved => write!(f, "approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::RequiresReview => write!(f, "requires_review"),
        }
    }
}

/// Banded risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// `< 0.4` low, `< 0.7` medium, otherwise high.
    pub fn from_score(score: f64) -> Self {
        if score < 0.4 {
            Self::Low
        } else if score < 0.7 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// One contribution to the risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub name: String,
    /// Signed delta applied to the score.
    pub contribution: f64,
    pub description: String,
}

/// An approval a matched rule demands before release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredAction {
    pub rule: String,
    pub role: String,
}

/// Result of one governance evaluation. Built fresh per call, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvaluation {
    /// Final score in `[0, 1]`.
    pub risk_score: f64,
    pub severity: Severity,
    pub decision: Decision,
    pub can_auto_approve: bool,
    pub risk_factors: Vec<RiskFactor>,
    pub required_actions: Vec<RequiredAction>,
    /// Human-readable reasons in the order they fired.
    pub rationale: Vec<String>,
    /// Rules whose guard matched, in evaluation order.
    pub matched_rules: Vec<String>,
    /// Reason given by the blocking rule, when rejected by policy.
    pub block_reason: Option<String>,
    pub historical_context: Option<HistoricalContext>,
    /// Digest of the policy set this evaluation ran against.
    pub policy_digest: String,
}

impl RiskEvaluation {
    pub fn is_rejected(&self) -> bool {
        self.decision == Decision::Rejected
    }

    /// Reasons to surface when the evaluation blocks a release.
    pub fn rejection_reasons(&self) -> Vec<String> {
        match &self.block_reason {
            Some(reason) => vec![reason.clone()],
            None => self.rationale.clone(),
        }
    }
}
