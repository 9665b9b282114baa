use thiserror::Error;

/// Errors that can occur talking to the knowledge-base service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Missing service configuration: {0}")]
    MissingConfig(String),

    #[error("Service returned error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Rate limited. Try again later.")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,
}

impl ServiceError {
    /// True when the fault is about reaching the service rather than the
    /// service rejecting the request. Training faults of this kind set the
    /// source's broken-link flag.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, ServiceError::Network(_) | ServiceError::Timeout)
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::Timeout
        } else if err.is_decode() {
            ServiceError::Parse(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}
