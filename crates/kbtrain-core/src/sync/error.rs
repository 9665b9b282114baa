use thiserror::Error;

use crate::client::ServiceError;

/// Errors returned by the sync coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("Select at least one knowledge source to remove")]
    NothingToRemove,

    #[error("Every selected source is already in the knowledge base")]
    NothingToImport,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl SyncError {
    /// True for requests refused before any state changed.
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::NothingToRemove | SyncError::NothingToImport)
    }
}
