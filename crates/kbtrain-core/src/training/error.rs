use thiserror::Error;

use crate::knowledge::SourceId;
use crate::registry::RegistryError;

/// A request that was refused before any state changed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Select at least one knowledge source to train")]
    EmptyBatch,

    #[error("Select at least one URL or document in source {source_id} before retraining")]
    NothingSelected { source_id: SourceId },

    #[error("Knowledge source {source_id} has nothing to train")]
    NothingToTrain { source_id: SourceId },

    #[error("Knowledge source {source_id} is already training")]
    AlreadyTraining { source_id: SourceId },
}

/// Errors returned by the training orchestrator.
///
/// Service faults are not errors here: they move the source to the `Error`
/// phase and come back as [`super::TrainingOutcome::Failed`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrainingError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
