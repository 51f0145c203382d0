//! Release Memory entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::actor::Actor;
use super::change_set::CommitCategory;
use super::run::ReleaseRun;
use crate::governance::Decision;

/// Whether a release attempt succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failure,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
        }
    }
}

/// One immutable history entry for a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub outcome_id: String,
    /// Run id of the release this outcome describes.
    pub release_id: String,
    pub repository: String,
    pub version: String,
    pub actor: String,
    pub risk_score: Option<f64>,
    pub decision: Option<Decision>,
    pub breaking_changes: usize,
    pub security_changes: usize,
    pub files_changed: usize,
    pub status: OutcomeStatus,
    /// Marks a release that was later rolled back.
    #[serde(default)]
    pub rolled_back: bool,
    pub duration_ms: u64,
    pub recorded_at: DateTime<Utc>,
}

impl Outcome {
    /// Snapshot of `run` at the end of a publish attempt.
    pub fn from_run(run: &ReleaseRun, status: OutcomeStatus, now: DateTime<Utc>) -> Self {
        let change_set = run.change_set();
        let approval = run.approval();
        let version = run
            .next_version()
            .unwrap_or_else(|| run.current_version())
            .to_string();
        Self {
            outcome_id: Uuid::new_v4().to_string(),
            release_id: run.run_id().to_string(),
            repository: run.repo_path().to_string(),
            version,
            actor: approval
                .map(|a| a.approved_by.clone())
                .unwrap_or_default(),
            risk_score: approval.and_then(|a| a.risk_score),
            decision: approval.and_then(|a| a.decision),
            breaking_changes: change_set
                .map(|cs| cs.count(CommitCategory::Breaking))
                .unwrap_or(0),
            security_changes: change_set.map(|cs| cs.security_changes()).unwrap_or(0),
            files_changed: change_set.map(|cs| cs.files_changed()).unwrap_or(0),
            status,
            rolled_back: false,
            duration_ms: u64::try_from(run.publish_duration(now).num_milliseconds()).unwrap_or(0),
            recorded_at: now,
        }
    }

    /// A marker flagging the published `version` of `repository` as rolled
    /// back. Markers are not releases of their own.
    pub fn rollback(
        repository: impl Into<String>,
        version: impl Into<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            outcome_id: Uuid::new_v4().to_string(),
            release_id: String::new(),
            repository: repository.into(),
            version: version.into(),
            actor: actor.id.clone(),
            risk_score: None,
            decision: None,
            breaking_changes: 0,
            security_changes: 0,
            files_changed: 0,
            status: OutcomeStatus::Failure,
            rolled_back: true,
            duration_ms: 0,
            recorded_at: now,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// Whether this rollback marker names `release`.
    pub fn marks(&self, release: &Outcome) -> bool {
        self.rolled_back
            && !release.rolled_back
            && self.repository == release.repository
            && self.version == release.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::TrustLevel;
    use crate::domain::change_set::{ChangeCommit, ChangeSet};
    use crate::domain::run::{ApprovalGate, ApproveRequest, ReleaseNotes};
    use chrono::{Duration, TimeZone};
    use semver::Version;

    #[test]
    fn test_from_run_snapshots_change_set_and_approval() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 2, 12, 0, 0).unwrap();
        let mut run = ReleaseRun::new("/srv/app", "main", Version::new(0, 9, 0), t0);
        let cs = ChangeSet::new(vec![
            ChangeCommit::new("a", "feat!: rework", CommitCategory::Breaking)
                .with_files(["src/auth.rs", "src/lib.rs"]),
        ]);
        run.plan(cs, None, t0).unwrap();
        run.set_version(Version::new(1, 0, 0), t0).unwrap();
        run.generate_notes(ReleaseNotes::new("1.0.0", t0), t0).unwrap();
        run.approve(
            &ApproveRequest::confirmed(Actor::human("dana", TrustLevel::Full)),
            None,
            &ApprovalGate::default(),
            t0,
        )
        .unwrap();
        run.begin_publish(t0).unwrap();

        let outcome = Outcome::from_run(&run, OutcomeStatus::Success, t0 + Duration::seconds(3));
        assert_eq!(outcome.version, "1.0.0");
        assert_eq!(outcome.actor, "dana");
        assert_eq!(outcome.breaking_changes, 1);
        assert_eq!(outcome.security_changes, 1);
        assert_eq!(outcome.files_changed, 2);
        assert_eq!(outcome.duration_ms, 3000);
        assert!(outcome.is_success());
        assert!(!outcome.rolled_back);
    }

    #[test]
    fn test_rollback_entry() {
        let now = Utc::now();
        let outcome = Outcome::rollback("/srv/app", "1.0.0", &Actor::ci("bot", TrustLevel::Trusted), now);
        assert_eq!(outcome.status, OutcomeStatus::Failure);
        assert!(outcome.rolled_back);
        assert_eq!(outcome.actor, "bot");
    }
}
