//! Release workflow: persistence, governance, and outcome recording wired
//! around the release run state machine.
//!
//! Each operation loads the current run, applies exactly one transition to a
//! copy, and saves it against the revision it was loaded at. A guard failure
//! or a failed save leaves the stored run untouched.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use helmsman_state::{OutcomeStore, RunId, RunStore};
use semver::Version;
use tracing::instrument;

use crate::config::HelmsmanConfig;
use crate::domain::{
    Actor, ApproveRequest, BumpKind, ChangeSet, Outcome, OutcomeStatus, ReleaseError,
    ReleaseNotes, ReleaseRun, Result, RunState, Transition,
};
use crate::governance::{GovernanceEngine, GovernanceService, RiskEvaluation};
use crate::memory::{OutcomeRecorder, ReleaseMemory};
use crate::metrics::METRICS;
use crate::obs;
use crate::repository::{RunRepository, StoredRun};

/// Performs the external side effects of a release (tags, registry
/// uploads, release pages).
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, run: &ReleaseRun) -> anyhow::Result<()>;
}

/// Input for [`ReleaseWorkflow::plan`].
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub repo_path: String,
    pub branch: String,
    pub current_version: Version,
    pub change_set: ChangeSet,
    /// Overrides the bump derived from the change set.
    pub forced_bump: Option<BumpKind>,
}

/// Release operations over a run store and an outcome store.
pub struct ReleaseWorkflow<R: RunStore, O: OutcomeStore> {
    runs: RunRepository<R>,
    memory: ReleaseMemory<O>,
    recorder: OutcomeRecorder<O>,
    governance: Option<GovernanceService<O>>,
    publisher: Arc<dyn Publisher>,
    config: HelmsmanConfig,
}

impl<R: RunStore, O: OutcomeStore> ReleaseWorkflow<R, O> {
    /// A workflow without a governance service attached.
    pub fn new(
        runs: Arc<R>,
        outcomes: Arc<O>,
        publisher: Arc<dyn Publisher>,
        config: HelmsmanConfig,
    ) -> Self {
        let memory = ReleaseMemory::new(outcomes);
        Self {
            runs: RunRepository::new(runs),
            recorder: OutcomeRecorder::new(memory.clone()),
            memory,
            governance: None,
            publisher,
            config,
        }
    }

    /// Attach `engine`, reading history from this workflow's outcome store.
    pub fn with_governance(mut self, engine: GovernanceEngine) -> Self {
        let service = GovernanceService::new(engine, self.memory.clone())
            .with_history_window(self.config.governance.history_window);
        self.governance = Some(service);
        self
    }

    pub fn config(&self) -> &HelmsmanConfig {
        &self.config
    }

    pub fn memory(&self) -> &ReleaseMemory<O> {
        &self.memory
    }

    /// Start a run and plan it. Fails `ActiveRunExists` while another run
    /// for the repository is active.
    #[instrument(skip_all, fields(repo = %request.repo_path))]
    pub async fn plan(&self, request: PlanRequest) -> Result<ReleaseRun> {
        if let Some(active) = self.runs.find_active(&request.repo_path).await? {
            return Err(ReleaseError::ActiveRunExists {
                repo_path: request.repo_path.clone(),
                run_id: active.run.run_id().to_string(),
            });
        }

        let now = Utc::now();
        let mut run = ReleaseRun::new(
            request.repo_path.clone(),
            request.branch.clone(),
            request.current_version.clone(),
            now,
        );
        obs::emit_run_started(run.run_id().as_str(), run.repo_path(), run.branch());
        let transition = run.plan(request.change_set, request.forced_bump, now)?;
        let stored = self.runs.insert(&run).await?;
        self.after_transition(&stored.run, &transition);
        Ok(stored.run)
    }

    #[instrument(skip_all, fields(repo = %repo_path))]
    pub async fn set_version(&self, repo_path: &str, version: Version) -> Result<ReleaseRun> {
        let stored = self.require_active(repo_path).await?;
        let saved = self
            .apply(stored, |run, now| run.set_version(version, now))
            .await?;
        Ok(saved.run)
    }

    #[instrument(skip_all, fields(repo = %repo_path))]
    pub async fn generate_notes(&self, repo_path: &str, notes: ReleaseNotes) -> Result<ReleaseRun> {
        let stored = self.require_active(repo_path).await?;
        let saved = self
            .apply(stored, |run, now| run.generate_notes(notes, now))
            .await?;
        Ok(saved.run)
    }

    /// Evaluate the active run. Needs an attached governance service.
    #[instrument(skip_all, fields(repo = %repo_path))]
    pub async fn evaluate(&self, repo_path: &str, actor: &Actor) -> Result<RiskEvaluation> {
        let service = self.governance()?;
        let stored = self.require_active(repo_path).await?;
        self.evaluate_run(service, &stored.run, actor).await
    }

    /// Approve the active run, consulting governance when it is enabled.
    #[instrument(skip_all, fields(repo = %repo_path))]
    pub async fn approve(&self, repo_path: &str, request: ApproveRequest) -> Result<ReleaseRun> {
        let stored = self.require_active(repo_path).await?;
        let evaluation = if self.config.governance.enabled {
            let service = self.governance()?;
            Some(self.evaluate_run(service, &stored.run, &request.actor).await?)
        } else {
            None
        };
        let gate = self.config.approval_gate();
        let saved = self
            .apply(stored, |run, now| {
                run.approve(&request, evaluation.as_ref(), &gate, now)
            })
            .await?;
        if let Some(eval) = evaluation.as_ref().filter(|e| e.is_rejected()) {
            obs::emit_rejection_overridden(saved.run.run_id().as_str(), eval.risk_score);
        }
        Ok(saved.run)
    }

    /// Publish the approved run.
    ///
    /// `Publishing` is persisted before the publisher runs; the run then ends
    /// `Published` or `Failed` and an outcome is recorded best-effort. If the
    /// publisher succeeds but saving `Published` fails, the success outcome
    /// is still recorded, the stored run stays `Publishing` and the storage
    /// error is returned. A repository whose latest run is already published
    /// is a no-op.
    #[instrument(skip_all, fields(repo = %repo_path))]
    pub async fn publish(&self, repo_path: &str) -> Result<ReleaseRun> {
        let stored = match self.runs.find_active(repo_path).await? {
            Some(stored) => stored,
            None => match self.runs.find_latest(repo_path).await? {
                Some(latest) if latest.run.state() == RunState::Published => {
                    obs::emit_noop(latest.run.run_id().as_str(), "publish", RunState::Published);
                    return Ok(latest.run);
                }
                _ => return Err(no_active_run(repo_path)),
            },
        };

        let publishing = self.apply(stored, |run, now| run.begin_publish(now)).await?;
        match self.publisher.publish(&publishing.run).await {
            Ok(()) => {
                let published = publishing.run.clone();
                let done = match self
                    .apply(publishing, |run, now| run.complete_publish(now))
                    .await
                {
                    Ok(done) => done,
                    Err(err) => {
                        // The artifact is out; the stored run stays Publishing.
                        METRICS.inc_publishes_succeeded();
                        self.record_outcome(&published, OutcomeStatus::Success).await;
                        return Err(err);
                    }
                };
                METRICS.inc_publishes_succeeded();
                self.record_outcome(&done.run, OutcomeStatus::Success).await;
                Ok(done.run)
            }
            Err(err) => {
                let reason = format!("{err:#}");
                let failed = self
                    .apply(publishing, |run, now| run.fail_publish(reason.clone(), now))
                    .await?;
                METRICS.inc_publishes_failed();
                self.record_outcome(&failed.run, OutcomeStatus::Failure).await;
                Err(ReleaseError::PublishFailed {
                    run_id: failed.run.run_id().to_string(),
                    reason,
                })
            }
        }
    }

    /// Cancel the active run. A repository whose latest run is already
    /// canceled is a no-op.
    #[instrument(skip_all, fields(repo = %repo_path))]
    pub async fn cancel(&self, repo_path: &str, reason: Option<String>) -> Result<ReleaseRun> {
        let stored = match self.runs.find_active(repo_path).await? {
            Some(stored) => stored,
            None => match self.runs.find_latest(repo_path).await? {
                Some(latest) if latest.run.state() == RunState::Canceled => {
                    obs::emit_noop(latest.run.run_id().as_str(), "cancel", RunState::Canceled);
                    return Ok(latest.run);
                }
                _ => return Err(no_active_run(repo_path)),
            },
        };
        let saved = self.apply(stored, |run, now| run.cancel(reason, now)).await?;
        Ok(saved.run)
    }

    /// The active run, or else the most recently updated one.
    pub async fn status(&self, repo_path: &str) -> Result<Option<ReleaseRun>> {
        if let Some(active) = self.runs.find_active(repo_path).await? {
            return Ok(Some(active.run));
        }
        Ok(self.runs.find_latest(repo_path).await?.map(|s| s.run))
    }

    /// Delete a terminal run's record. Outcomes referencing it are kept.
    pub async fn discard(&self, run_id: &RunId) -> Result<()> {
        let stored = self.runs.load(run_id).await?;
        let state = stored.run.state();
        if !state.is_terminal() {
            return Err(ReleaseError::InvalidTransition {
                operation: "discard",
                state,
            });
        }
        self.runs.delete(run_id).await?;
        obs::emit_run_discarded(run_id.as_str(), state);
        Ok(())
    }

    /// Mark a published version as rolled back in Release Memory.
    pub async fn record_rollback(
        &self,
        repo_path: &str,
        version: &Version,
        actor: &Actor,
    ) -> Result<Outcome> {
        let outcome = self
            .memory
            .record_rollback(repo_path, &version.to_string(), actor, Utc::now())
            .await?;
        Ok(outcome)
    }

    fn governance(&self) -> Result<&GovernanceService<O>> {
        self.governance
            .as_ref()
            .ok_or(ReleaseError::GovernanceUnavailable)
    }

    async fn evaluate_run(
        &self,
        service: &GovernanceService<O>,
        run: &ReleaseRun,
        actor: &Actor,
    ) -> Result<RiskEvaluation> {
        let evaluation = service
            .evaluate(
                run,
                actor,
                run.repo_path(),
                self.config.governance.include_history,
            )
            .await?;
        obs::emit_evaluated(run.run_id().as_str(), &evaluation);
        Ok(evaluation)
    }

    async fn require_active(&self, repo_path: &str) -> Result<StoredRun> {
        self.runs
            .find_active(repo_path)
            .await?
            .ok_or_else(|| no_active_run(repo_path))
    }

    /// Apply one transition to a copy of `stored` and save it. No-ops are
    /// not written.
    async fn apply<F>(&self, stored: StoredRun, transition: F) -> Result<StoredRun>
    where
        F: FnOnce(&mut ReleaseRun, DateTime<Utc>) -> Result<Transition> + Send,
    {
        let mut run = stored.run.clone();
        let applied = transition(&mut run, Utc::now())?;
        if !applied.changed {
            obs::emit_noop(run.run_id().as_str(), applied.operation, run.state());
            return Ok(stored);
        }
        let saved = self.runs.update(&run, stored.revision).await?;
        self.after_transition(&saved.run, &applied);
        Ok(saved)
    }

    fn after_transition(&self, run: &ReleaseRun, transition: &Transition) {
        METRICS.inc_transitions();
        obs::emit_transition(run.run_id().as_str(), transition);
    }

    async fn record_outcome(&self, run: &ReleaseRun, status: OutcomeStatus) {
        let outcome = Outcome::from_run(run, status, Utc::now());
        obs::emit_publish_finished(
            run.run_id().as_str(),
            outcome.duration_ms,
            status == OutcomeStatus::Success,
        );
        self.recorder.record_best_effort(&outcome).await;
    }
}

fn no_active_run(repo_path: &str) -> ReleaseError {
    ReleaseError::NoActiveRun {
        repo_path: repo_path.to_string(),
    }
}
