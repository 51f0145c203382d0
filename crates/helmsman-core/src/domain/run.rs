//! Release run aggregate and its lifecycle state machine.
//!
//! Every operation validates its guard before touching any field, so a
//! failed call leaves the run exactly as it was. Operations take `now`
//! explicitly; `updated_at` never moves backwards.

use chrono::{DateTime, Utc};
use helmsman_state::RunId;
use semver::Version;
use serde::{Deserialize, Serialize};

use super::actor::{Actor, ActorKind};
use super::change_set::ChangeSet;
use super::error::{ReleaseError, Result};
use super::version::BumpKind;
use crate::governance::{Decision, RiskEvaluation};

/// Lifecycle state of a release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Draft,
    Planned,
    Versioned,
    NotesReady,
    Approved,
    Publishing,
    Published,
    Failed,
    Canceled,
}

impl RunState {
    pub const ALL: [RunState; 9] = [
        RunState::Draft,
        RunState::Planned,
        RunState::Versioned,
        RunState::NotesReady,
        RunState::Approved,
        RunState::Publishing,
        RunState::Published,
        RunState::Failed,
        RunState::Canceled,
    ];

    /// Terminal states accept no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed | Self::Canceled)
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Planned => "planned",
            Self::Versioned => "versioned",
            Self::NotesReady => "notes_ready",
            Self::Approved => "approved",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release notes plus their provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseNotes {
    pub text: String,
    pub ai_generated: bool,
    pub provider: Option<String>,
    pub generated_at: DateTime<Utc>,
}

impl ReleaseNotes {
    pub fn new(text: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            ai_generated: false,
            provider: None,
            generated_at,
        }
    }

    pub fn ai(
        text: impl Into<String>,
        provider: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            text: text.into(),
            ai_generated: true,
            provider: Some(provider.into()),
            generated_at,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Who approved the run, how, and against which governance verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub approved_by: String,
    pub actor_kind: ActorKind,
    pub auto_approved: bool,
    pub timestamp: DateTime<Utc>,
    pub risk_score: Option<f64>,
    pub decision: Option<Decision>,
    pub policy_digest: Option<String>,
}

/// Caller intent for an approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveRequest {
    pub actor: Actor,
    /// Ask for approval without human confirmation.
    pub auto_approve: bool,
    /// The actor explicitly confirmed the approval.
    pub confirmed: bool,
}

impl ApproveRequest {
    pub fn confirmed(actor: Actor) -> Self {
        Self {
            actor,
            auto_approve: false,
            confirmed: true,
        }
    }

    pub fn auto(actor: Actor) -> Self {
        Self {
            actor,
            auto_approve: true,
            confirmed: false,
        }
    }
}

/// Approval configuration applied by [`ReleaseRun::approve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalGate {
    /// Non-auto approvals need explicit confirmation.
    pub require_approval: bool,
    /// Governance rejections block approval; reviews need confirmation.
    pub strict_mode: bool,
}

/// Effect of one operation on the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub operation: &'static str,
    pub from: RunState,
    pub to: RunState,
    /// `false` when the call was an idempotent no-op.
    pub changed: bool,
}

/// One release attempt for a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRun {
    run_id: RunId,
    repo_path: String,
    branch: String,
    state: RunState,
    change_set: Option<ChangeSet>,
    current_version: Version,
    next_version: Option<Version>,
    bump_kind: Option<BumpKind>,
    notes: Option<ReleaseNotes>,
    approval: Option<ApprovalRecord>,
    publish_started_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    failure_reason: Option<String>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ReleaseRun {
    /// Start a new run in `Draft`.
    pub fn new(
        repo_path: impl Into<String>,
        branch: impl Into<String>,
        current_version: Version,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            repo_path: repo_path.into(),
            branch: branch.into(),
            state: RunState::Draft,
            change_set: None,
            current_version,
            next_version: None,
            bump_kind: None,
            notes: None,
            approval: None,
            publish_started_at: None,
            published_at: None,
            failure_reason: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    // -- accessors -----------------------------------------------------------

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn repo_path(&self) -> &str {
        &self.repo_path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn change_set(&self) -> Option<&ChangeSet> {
        self.change_set.as_ref()
    }

    /// The change set, or `ChangeSetMissing` before planning.
    pub fn require_change_set(&self) -> Result<&ChangeSet> {
        self.change_set.as_ref().ok_or(ReleaseError::ChangeSetMissing)
    }

    pub fn current_version(&self) -> &Version {
        &self.current_version
    }

    pub fn next_version(&self) -> Option<&Version> {
        self.next_version.as_ref()
    }

    pub fn bump_kind(&self) -> Option<BumpKind> {
        self.bump_kind
    }

    /// `current_version` with the planned bump applied. `None` before
    /// planning or when the bump would overflow.
    pub fn proposed_version(&self) -> Option<Version> {
        self.bump_kind.and_then(|b| b.apply(&self.current_version))
    }

    pub fn notes(&self) -> Option<&ReleaseNotes> {
        self.notes.as_ref()
    }

    pub fn approval(&self) -> Option<&ApprovalRecord> {
        self.approval.as_ref()
    }

    pub fn publish_started_at(&self) -> Option<DateTime<Utc>> {
        self.publish_started_at
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    // -- transitions ---------------------------------------------------------

    /// Draft → Planned. Re-planning with the same change set is a no-op.
    pub fn plan(
        &mut self,
        change_set: ChangeSet,
        forced_bump: Option<BumpKind>,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        const OP: &str = "plan";
        let bump = forced_bump.unwrap_or_else(|| change_set.bump_kind());
        match self.state {
            RunState::Draft => {
                self.change_set = Some(change_set);
                self.bump_kind = Some(bump);
                Ok(self.advance(OP, RunState::Planned, now))
            }
            RunState::Planned
                if self.change_set.as_ref() == Some(&change_set)
                    && self.bump_kind == Some(bump) =>
            {
                Ok(self.unchanged(OP))
            }
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// Planned → Versioned, or re-version while still `Versioned`.
    ///
    /// `version` must exceed `current_version` and any `next_version`
    /// already set; equal versions are rejected.
    pub fn set_version(&mut self, version: Version, now: DateTime<Utc>) -> Result<Transition> {
        const OP: &str = "set version on";
        match self.state {
            RunState::Planned | RunState::Versioned => {
                self.require_change_set()?;
                let floor = match &self.next_version {
                    Some(next) if *next > self.current_version => next,
                    _ => &self.current_version,
                };
                if version <= *floor {
                    return Err(ReleaseError::VersionNotIncreasing {
                        proposed: version.to_string(),
                        floor: floor.to_string(),
                    });
                }
                self.next_version = Some(version);
                Ok(self.advance(OP, RunState::Versioned, now))
            }
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// Versioned → NotesReady. In `NotesReady` the notes are regenerated;
    /// identical notes are a no-op.
    pub fn generate_notes(&mut self, notes: ReleaseNotes, now: DateTime<Utc>) -> Result<Transition> {
        const OP: &str = "generate notes for";
        match self.state {
            RunState::Versioned => {
                self.notes = Some(notes);
                Ok(self.advance(OP, RunState::NotesReady, now))
            }
            RunState::NotesReady if self.notes.as_ref() == Some(&notes) => Ok(self.unchanged(OP)),
            RunState::NotesReady => {
                self.notes = Some(notes);
                Ok(self.advance(OP, RunState::NotesReady, now))
            }
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// NotesReady → Approved.
    ///
    /// Guards, in order: notes present; governance rejection in strict mode;
    /// auto-approval only when the evaluation allows it; explicit
    /// confirmation when required. Calling again in `Approved` re-checks
    /// governance and returns the stored record for the same actor.
    pub fn approve(
        &mut self,
        request: &ApproveRequest,
        evaluation: Option<&RiskEvaluation>,
        gate: &ApprovalGate,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        const OP: &str = "approve";
        if !matches!(self.state, RunState::NotesReady | RunState::Approved) {
            return Err(ReleaseError::InvalidTransition {
                operation: OP,
                state: self.state,
            });
        }
        if self.notes.as_ref().is_none_or(ReleaseNotes::is_blank) {
            return Err(ReleaseError::NotesMissing);
        }

        if let Some(eval) = evaluation {
            if gate.strict_mode && eval.is_rejected() {
                return Err(ReleaseError::GovernanceRejected {
                    risk_score: eval.risk_score,
                    reasons: eval.rejection_reasons(),
                });
            }
        }

        if let Some(existing) = &self.approval {
            if existing.approved_by == request.actor.id {
                return Ok(self.unchanged(OP));
            }
            return Err(ReleaseError::AlreadyApproved {
                approved_by: existing.approved_by.clone(),
            });
        }

        if request.auto_approve {
            if let Some(eval) = evaluation.filter(|e| !e.can_auto_approve) {
                return Err(ReleaseError::AutoApproveNotPermitted {
                    reason: format!(
                        "decision {}, severity {}, actor trust {}",
                        eval.decision, eval.severity, request.actor.trust_level
                    ),
                });
            }
        } else {
            let review_needed = gate.strict_mode
                && evaluation.is_some_and(|e| e.decision == Decision::RequiresReview);
            if (gate.require_approval || review_needed) && !request.confirmed {
                return Err(ReleaseError::ApprovalRequired);
            }
        }

        self.approval = Some(ApprovalRecord {
            approved_by: request.actor.id.clone(),
            actor_kind: request.actor.kind,
            auto_approved: request.auto_approve,
            timestamp: now,
            risk_score: evaluation.map(|e| e.risk_score),
            decision: evaluation.map(|e| e.decision),
            policy_digest: evaluation.map(|e| e.policy_digest.clone()),
        });
        Ok(self.advance(OP, RunState::Approved, now))
    }

    /// Approved → Publishing. Already published runs are a no-op.
    pub fn begin_publish(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        const OP: &str = "publish";
        match self.state {
            RunState::Approved => {
                self.publish_started_at = Some(now);
                Ok(self.advance(OP, RunState::Publishing, now))
            }
            RunState::Published => Ok(self.unchanged(OP)),
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// Publishing → Published.
    pub fn complete_publish(&mut self, now: DateTime<Utc>) -> Result<Transition> {
        const OP: &str = "complete publish of";
        match self.state {
            RunState::Publishing => {
                self.published_at = Some(now);
                Ok(self.advance(OP, RunState::Published, now))
            }
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// Publishing → Failed.
    pub fn fail_publish(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Transition> {
        const OP: &str = "fail publish of";
        match self.state {
            RunState::Publishing => {
                self.failure_reason = Some(reason.into());
                Ok(self.advance(OP, RunState::Failed, now))
            }
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// Any pre-publish state → Canceled. Cancelling twice is a no-op.
    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<Transition> {
        const OP: &str = "cancel";
        match self.state {
            RunState::Draft
            | RunState::Planned
            | RunState::Versioned
            | RunState::NotesReady
            | RunState::Approved => {
                self.cancel_reason = reason;
                Ok(self.advance(OP, RunState::Canceled, now))
            }
            RunState::Canceled => Ok(self.unchanged(OP)),
            state => Err(ReleaseError::InvalidTransition {
                operation: OP,
                state,
            }),
        }
    }

    /// Time between `begin_publish` and `now`, zero if never started.
    pub fn publish_duration(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.publish_started_at
            .map(|start| (now - start).max(chrono::Duration::zero()))
            .unwrap_or_else(chrono::Duration::zero)
    }

    fn advance(&mut self, operation: &'static str, to: RunState, now: DateTime<Utc>) -> Transition {
        let from = self.state;
        self.state = to;
        if now > self.updated_at {
            self.updated_at = now;
        }
        Transition {
            operation,
            from,
            to,
            changed: true,
        }
    }

    fn unchanged(&self, operation: &'static str) -> Transition {
        Transition {
            operation,
            from: self.state,
            to: self.state,
            changed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::TrustLevel;
    use crate::domain::change_set::{ChangeCommit, CommitCategory};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    fn change_set() -> ChangeSet {
        ChangeSet::new(vec![
            ChangeCommit::new("a1", "feat: widgets", CommitCategory::Feature),
            ChangeCommit::new("a2", "fix: gizmo", CommitCategory::Fix),
        ])
    }

    fn notes_ready() -> ReleaseRun {
        let mut run = ReleaseRun::new("/repo", "main", v("1.2.0"), t0());
        run.plan(change_set(), None, t0()).unwrap();
        run.set_version(v("1.3.0"), t0()).unwrap();
        run.generate_notes(ReleaseNotes::new("## 1.3.0", t0()), t0())
            .unwrap();
        run
    }

    #[test]
    fn test_plan_derives_bump() {
        let mut run = ReleaseRun::new("/repo", "main", v("1.2.0"), t0());
        let tr = run.plan(change_set(), None, t0()).unwrap();
        assert_eq!((tr.from, tr.to, tr.changed), (RunState::Draft, RunState::Planned, true));
        assert_eq!(run.bump_kind(), Some(BumpKind::Minor));
        assert_eq!(run.proposed_version(), Some(v("1.3.0")));
    }

    #[test]
    fn test_forced_bump_overrides() {
        let mut run = ReleaseRun::new("/repo", "main", v("1.2.0"), t0());
        run.plan(change_set(), Some(BumpKind::Major), t0()).unwrap();
        assert_eq!(run.proposed_version(), Some(v("2.0.0")));
    }

    #[test]
    fn test_proposed_version_none_on_overflow() {
        let mut run = ReleaseRun::new("/repo", "main", Version::new(1, u64::MAX, 0), t0());
        run.plan(change_set(), None, t0()).unwrap();
        assert_eq!(run.bump_kind(), Some(BumpKind::Minor));
        assert_eq!(run.proposed_version(), None);
    }

    #[test]
    fn test_replan_same_change_set_is_noop() {
        let mut run = ReleaseRun::new("/repo", "main", v("1.2.0"), t0());
        let cs = change_set();
        run.plan(cs.clone(), None, t0()).unwrap();
        let tr = run.plan(cs, None, t0()).unwrap();
        assert!(!tr.changed);

        let err = run.plan(change_set(), None, t0()).unwrap_err();
        assert!(matches!(err, ReleaseError::InvalidTransition { .. }));
    }

    #[test]
    fn test_set_version_must_increase() {
        let mut run = ReleaseRun::new("/repo", "main", v("1.2.0"), t0());
        run.plan(change_set(), None, t0()).unwrap();
        let before = run.clone();

        let err = run.set_version(v("1.2.0"), t0()).unwrap_err();
        assert!(matches!(err, ReleaseError::VersionNotIncreasing { .. }));
        assert_eq!(run, before);

        run.set_version(v("1.3.0"), t0()).unwrap();
        run.set_version(v("1.4.0"), t0()).unwrap();
        assert_eq!(run.next_version(), Some(&v("1.4.0")));

        let err = run.set_version(v("1.3.5"), t0()).unwrap_err();
        assert!(matches!(err, ReleaseError::VersionNotIncreasing { .. }));
        assert_eq!(run.next_version(), Some(&v("1.4.0")));
        assert_eq!(run.current_version(), &v("1.2.0"));
    }

    #[test]
    fn test_set_version_before_plan_rejected() {
        let mut run = ReleaseRun::new("/repo", "main", v("1.2.0"), t0());
        let err = run.set_version(v("2.0.0"), t0()).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::InvalidTransition {
                state: RunState::Draft,
                ..
            }
        ));
        assert!(run.next_version().is_none());
    }

    #[test]
    fn test_notes_regeneration() {
        let mut run = notes_ready();
        let same = run.notes().cloned().unwrap();
        assert!(!run.generate_notes(same, t0()).unwrap().changed);

        let ai = ReleaseNotes::ai("## 1.3.0\nbetter", "openai", t0());
        assert!(run.generate_notes(ai, t0()).unwrap().changed);
        assert!(run.notes().unwrap().ai_generated);
        assert_eq!(run.state(), RunState::NotesReady);
    }

    #[test]
    fn test_approve_is_idempotent_for_same_actor() {
        let mut run = notes_ready();
        let req = ApproveRequest::confirmed(Actor::human("dana", TrustLevel::Trusted));
        let gate = ApprovalGate::default();

        run.approve(&req, None, &gate, t0()).unwrap();
        let first = run.approval().cloned().unwrap();

        let later = t0() + Duration::minutes(5);
        let tr = run.approve(&req, None, &gate, later).unwrap();
        assert!(!tr.changed);
        assert_eq!(run.approval(), Some(&first));
    }

    #[test]
    fn test_approve_by_other_actor_rejected() {
        let mut run = notes_ready();
        let gate = ApprovalGate::default();
        run.approve(
            &ApproveRequest::confirmed(Actor::human("dana", TrustLevel::Trusted)),
            None,
            &gate,
            t0(),
        )
        .unwrap();
        let err = run
            .approve(
                &ApproveRequest::confirmed(Actor::human("eli", TrustLevel::Trusted)),
                None,
                &gate,
                t0(),
            )
            .unwrap_err();
        assert!(matches!(err, ReleaseError::AlreadyApproved { .. }));
    }

    #[test]
    fn test_require_approval_needs_confirmation() {
        let mut run = notes_ready();
        let gate = ApprovalGate {
            require_approval: true,
            strict_mode: false,
        };
        let req = ApproveRequest {
            actor: Actor::human("dana", TrustLevel::Trusted),
            auto_approve: false,
            confirmed: false,
        };
        let err = run.approve(&req, None, &gate, t0()).unwrap_err();
        assert!(matches!(err, ReleaseError::ApprovalRequired));
        assert_eq!(run.state(), RunState::NotesReady);
        assert!(run.approval().is_none());
    }

    #[test]
    fn test_publish_path() {
        let mut run = notes_ready();
        run.approve(
            &ApproveRequest::confirmed(Actor::human("dana", TrustLevel::Trusted)),
            None,
            &ApprovalGate::default(),
            t0(),
        )
        .unwrap();
        run.begin_publish(t0()).unwrap();
        assert_eq!(run.state(), RunState::Publishing);
        let end = t0() + Duration::seconds(42);
        run.complete_publish(end).unwrap();
        assert_eq!(run.state(), RunState::Published);
        assert_eq!(run.publish_duration(end), Duration::seconds(42));
        assert!(!run.begin_publish(end).unwrap().changed);
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut run = notes_ready();
        run.approve(
            &ApproveRequest::confirmed(Actor::human("dana", TrustLevel::Trusted)),
            None,
            &ApprovalGate::default(),
            t0(),
        )
        .unwrap();
        run.begin_publish(t0()).unwrap();
        run.fail_publish("registry 503", t0()).unwrap();
        assert_eq!(run.failure_reason(), Some("registry 503"));
        assert!(run.begin_publish(t0()).is_err());
        assert!(run.cancel(None, t0()).is_err());
    }

    #[test]
    fn test_cancel_twice_is_noop() {
        let mut run = ReleaseRun::new("/repo", "main", v("1.0.0"), t0());
        run.cancel(Some("superseded".into()), t0()).unwrap();
        assert!(!run.cancel(None, t0()).unwrap().changed);
        assert_eq!(run.cancel_reason(), Some("superseded"));
    }

    #[test]
    fn test_updated_at_never_moves_backwards() {
        let later = t0() + Duration::hours(1);
        let mut run = ReleaseRun::new("/repo", "main", v("1.0.0"), later);
        run.plan(change_set(), None, t0()).unwrap();
        assert_eq!(run.updated_at(), later);
    }

    #[test]
    fn test_serde_roundtrip_keeps_everything() {
        let run = notes_ready();
        let json = serde_json::to_value(&run).unwrap();
        let back: ReleaseRun = serde_json::from_value(json).unwrap();
        assert_eq!(run, back);
    }
}
