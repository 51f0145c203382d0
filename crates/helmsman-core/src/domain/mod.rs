//! Domain types for Helmsman releases.
//!
//! Pure data and the synchronous release state machine. Nothing in here
//! performs I/O.

pub mod actor;
pub mod change_set;
pub mod error;
pub mod outcome;
pub mod run;
pub mod version;

pub use actor::{Actor, ActorKind, TrustLevel};
pub use change_set::{is_security_sensitive, ChangeCommit, ChangeSet, CommitCategory};
pub use error::{ErrorKind, ReleaseError, Result};
pub use outcome::{Outcome, OutcomeStatus};
pub use run::{
    ApprovalGate, ApprovalRecord, ApproveRequest, ReleaseNotes, ReleaseRun, RunState, Transition,
};
pub use version::BumpKind;
