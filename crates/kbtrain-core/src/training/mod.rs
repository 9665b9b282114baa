//! Training jobs for knowledge sources.
//!
//! [`TrainingStatus`] is the per-source state machine. The
//! [`TrainingOrchestrator`] starts jobs against the knowledge service, runs
//! the progress ticker and records the terminal state in the registry.

mod batch;
mod error;
mod orchestrator;
mod status;

pub use batch::{BatchProgress, BatchReport, MemberOutcome};
pub use error::{TrainingError, ValidationError};
pub use orchestrator::{TrainingOrchestrator, TrainingOutcome};
pub use status::{JobId, TickOutcome, TrainingPhase, TrainingStatus};
