//! Release Memory: append-only outcome history and the aggregates
//! governance reads from it.

pub mod error;
pub mod history;
pub mod recorder;

pub use error::{MemoryError, MemoryResult};
pub use history::{HistoricalContext, ReleaseMemory, DEFAULT_HISTORY_WINDOW};
pub use recorder::OutcomeRecorder;
