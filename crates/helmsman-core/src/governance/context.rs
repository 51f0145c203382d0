//! The fixed schema rule guards are evaluated against.

use serde::{Deserialize, Serialize};

use crate::domain::{Actor, ChangeSet, TrustLevel};

/// A field of the [`EvaluationContext`] a predicate may read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextField {
    RiskScore,
    HasBreakingChanges,
    CommitCount,
    Scope,
    ActorTrustLevel,
    FilesChanged,
}

/// Literal type a field compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Fractional score in `[0, 1]`.
    Score,
    /// Non-negative count.
    Count,
    Bool,
    Text,
    Trust,
}

impl ContextField {
    pub fn kind(self) -> FieldKind {
        match self {
            Self::RiskScore => FieldKind::Score,
            Self::HasBreakingChanges => FieldKind::Bool,
            Self::CommitCount | Self::FilesChanged => FieldKind::Count,
            Self::Scope => FieldKind::Text,
            Self::ActorTrustLevel => FieldKind::Trust,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RiskScore => "risk_score",
            Self::HasBreakingChanges => "has_breaking_changes",
            Self::CommitCount => "commit_count",
            Self::Scope => "scope",
            Self::ActorTrustLevel => "actor_trust_level",
            Self::FilesChanged => "files_changed",
        }
    }
}

impl std::fmt::Display for ContextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A borrowed context value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContextValue<'a> {
    Number(f64),
    Bool(bool),
    Text(&'a str),
    Trust(TrustLevel),
}

/// Read-only inputs visible to rule guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    pub risk_score: f64,
    pub has_breaking_changes: bool,
    pub commit_count: usize,
    pub scope: String,
    pub actor_trust_level: TrustLevel,
    pub files_changed: usize,
}

impl EvaluationContext {
    pub fn new(change_set: &ChangeSet, actor: &Actor, risk_score: f64) -> Self {
        Self {
            risk_score,
            has_breaking_changes: change_set.has_breaking_changes(),
            commit_count: change_set.total(),
            scope: change_set.dominant_scope(),
            actor_trust_level: actor.trust_level,
            files_changed: change_set.files_changed(),
        }
    }

    pub fn get(&self, field: ContextField) -> ContextValue<'_> {
        match field {
            ContextField::RiskScore => ContextValue::Number(self.risk_score),
            ContextField::HasBreakingChanges => ContextValue::Bool(self.has_breaking_changes),
            ContextField::CommitCount => ContextValue::Number(self.commit_count as f64),
            ContextField::Scope => ContextValue::Text(&self.scope),
            ContextField::ActorTrustLevel => ContextValue::Trust(self.actor_trust_level),
            ContextField::FilesChanged => ContextValue::Number(self.files_changed as f64),
        }
    }
}
