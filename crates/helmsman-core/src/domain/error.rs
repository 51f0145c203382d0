//! Domain-level error taxonomy for Helmsman.

use helmsman_state::StorageError;

use super::run::RunState;
use crate::memory::MemoryError;

/// Coarse classification callers use to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A transition precondition failed. Fix the preceding step and retry.
    Guard,
    /// Governance rejected the release. A normal business outcome.
    Governance,
    /// Configuration, persistence, or external collaborator failure.
    Infrastructure,
}

/// Release core errors.
#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("cannot {operation} a release run in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: RunState,
    },

    #[error("version {proposed} must be greater than {floor}")]
    VersionNotIncreasing { proposed: String, floor: String },

    #[error("release run has no change set")]
    ChangeSetMissing,

    #[error("release notes are missing or empty")]
    NotesMissing,

    #[error("explicit approval confirmation is required")]
    ApprovalRequired,

    #[error("auto-approval not permitted: {reason}")]
    AutoApproveNotPermitted { reason: String },

    #[error("release run already approved by {approved_by}")]
    AlreadyApproved { approved_by: String },

    #[error("repository {repo_path} already has an active release run ({run_id})")]
    ActiveRunExists { repo_path: String, run_id: String },

    #[error("no active release run for {repo_path}")]
    NoActiveRun { repo_path: String },

    #[error("release run not found: {0}")]
    RunNotFound(String),

    #[error("governance rejected release (risk {risk_score:.2}): {}", reasons.join("; "))]
    GovernanceRejected {
        risk_score: f64,
        reasons: Vec<String>,
    },

    #[error("governance is enabled but no governance service is configured")]
    GovernanceUnavailable,

    #[error("publish of release run {run_id} failed: {reason}")]
    PublishFailed { run_id: String, reason: String },

    #[error("release run {run_id} was modified concurrently; reload and retry")]
    ConcurrentModification { run_id: String },

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReleaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. }
            | Self::VersionNotIncreasing { .. }
            | Self::ChangeSetMissing
            | Self::NotesMissing
            | Self::ApprovalRequired
            | Self::AutoApproveNotPermitted { .. }
            | Self::AlreadyApproved { .. }
            | Self::ActiveRunExists { .. }
            | Self::NoActiveRun { .. }
            | Self::RunNotFound(_) => ErrorKind::Guard,
            Self::GovernanceRejected { .. } => ErrorKind::Governance,
            Self::GovernanceUnavailable
            | Self::PublishFailed { .. }
            | Self::ConcurrentModification { .. }
            | Self::Storage(_)
            | Self::Memory(_)
            | Self::Serialization(_) => ErrorKind::Infrastructure,
        }
    }

    /// Whether repeating the same call (after a reload) can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<StorageError> for ReleaseError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ActiveRunExists { repo_path, run_id } => {
                Self::ActiveRunExists { repo_path, run_id }
            }
            StorageError::ConcurrentModification { run_id, .. } => {
                Self::ConcurrentModification { run_id }
            }
            StorageError::RunNotFound { run_id } => Self::RunNotFound(run_id),
            other => Self::Storage(other),
        }
    }
}

/// Result type for release core operations.
pub type Result<T> = std::result::Result<T, ReleaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_display() {
        let err = ReleaseError::InvalidTransition {
            operation: "publish",
            state: RunState::Planned,
        };
        assert_eq!(err.to_string(), "cannot publish a release run in state planned");
        assert_eq!(err.kind(), ErrorKind::Guard);
    }

    #[test]
    fn test_rejection_is_governance_kind() {
        let err = ReleaseError::GovernanceRejected {
            risk_score: 0.91,
            reasons: vec!["too risky".into(), "freeze".into()],
        };
        assert_eq!(err.kind(), ErrorKind::Governance);
        let msg = err.to_string();
        assert!(msg.contains("0.91"));
        assert!(msg.contains("too risky; freeze"));
    }

    #[test]
    fn test_storage_conflicts_are_mapped() {
        let err: ReleaseError = StorageError::ActiveRunExists {
            repo_path: "/repo".into(),
            run_id: "r1".into(),
        }
        .into();
        assert!(matches!(err, ReleaseError::ActiveRunExists { .. }));

        let err: ReleaseError = StorageError::ConcurrentModification {
            run_id: "r1".into(),
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), ErrorKind::Infrastructure);

        let err: ReleaseError = StorageError::Backend("disk full".into()).into();
        assert!(matches!(err, ReleaseError::Storage(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_governance_unavailable_is_fatal() {
        let err = ReleaseError::GovernanceUnavailable;
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        assert!(!err.is_retryable());
    }
}
