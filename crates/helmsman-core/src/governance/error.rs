//! Policy load and validation errors.

use super::context::ContextField;
use super::policy::Op;

/// A policy set that cannot be attached to the engine.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy parse error: {0}")]
    Parse(String),

    #[error("rule at position {index} has an empty name")]
    EmptyRuleName { index: usize },

    #[error("duplicate rule name: {0}")]
    DuplicateRule(String),

    #[error("rule '{rule}' has no actions")]
    NoActions { rule: String },

    #[error("rule '{rule}': {field} expects a {expected} literal")]
    TypeMismatch {
        rule: String,
        field: ContextField,
        expected: &'static str,
    },

    #[error("rule '{rule}': operator {op} is not supported on {field}")]
    UnsupportedOperator {
        rule: String,
        field: ContextField,
        op: Op,
    },

    #[error("rule '{rule}': invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rule '{rule}': {field} literal {value} is out of range")]
    OutOfRange {
        rule: String,
        field: ContextField,
        value: f64,
    },

    #[error("rule '{rule}': unknown trust level {value:?}")]
    UnknownTrustLevel { rule: String, value: String },

    #[error("rule '{rule}': action field {field} must not be empty")]
    EmptyActionField { rule: String, field: &'static str },
}

/// Result type for policy operations.
pub type PolicyResult<T> = std::result::Result<T, PolicyError>;
