//! Change Governance: risk scoring and the policy rule interpreter that
//! gates release approval.
//!
//! ## Layout
//!
//! - `policy`: rules as data, validated into a `ValidatedPolicySet`
//! - `engine`: pure `GovernanceEngine::evaluate`
//! - `service`: `GovernanceService`, the engine plus Release Memory

pub mod context;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod policy;
pub mod service;

pub use context::{ContextField, ContextValue, EvaluationContext};
pub use engine::{GovernanceEngine, RiskWeights, DEFAULT_LOW_RISK_THRESHOLD};
pub use error::{PolicyError, PolicyResult};
pub use evaluation::{Decision, RequiredAction, RiskEvaluation, RiskFactor, Severity};
pub use policy::{Action, CompiledRule, Literal, Op, PolicySet, Predicate, Rule, ValidatedPolicySet};
pub use service::GovernanceService;
