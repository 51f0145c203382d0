//! Helmsman Core Library
//!
//! Release automation with a governance gate. A release run moves through
//! plan, version, notes, approve and publish; approval is authorized by a
//! policy-driven risk evaluation that learns from prior release outcomes.
//!
//! ## Key Components
//!
//! - `domain`: change sets, versions, actors, and the `ReleaseRun` state machine
//! - `governance`: risk scoring plus the policy rule interpreter
//! - `memory`: append-only outcome history and its aggregates
//! - `workflow`: `ReleaseWorkflow`, which persists every transition

pub mod config;
pub mod domain;
pub mod governance;
pub mod memory;
pub mod metrics;
pub mod obs;
pub mod repository;
pub mod telemetry;
pub mod workflow;

pub use config::{ConfigError, GovernanceConfig, HelmsmanConfig};

pub use domain::{
    Actor, ActorKind, ApprovalGate, ApprovalRecord, ApproveRequest, BumpKind, ChangeCommit,
    ChangeSet, CommitCategory, ErrorKind, Outcome, OutcomeStatus, ReleaseError, ReleaseNotes,
    ReleaseRun, Result, RunState, Transition, TrustLevel,
};

pub use governance::{
    Action, ContextField, Decision, GovernanceEngine, GovernanceService, Op, PolicyError,
    PolicySet, RiskEvaluation, RiskWeights, Rule, Severity, ValidatedPolicySet,
};

pub use memory::{HistoricalContext, MemoryError, OutcomeRecorder, ReleaseMemory};

pub use repository::{RunRepository, StoredRun};

pub use workflow::{PlanRequest, Publisher, ReleaseWorkflow};

pub use helmsman_state::{RunId, StorageError};
