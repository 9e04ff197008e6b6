//! Error types for council-core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for council-core
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the caller of a council
///
/// Only configuration and request errors are fatal. Producer failures never
/// appear here; they are downgraded to neutral proposals instead.
#[derive(Error, Debug)]
pub enum Error {
    /// The council was built with an invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The request could not be constructed
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while persisting a signal
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The signal emitter rejected the decision
    #[error("Emit failed: {0}")]
    Emit(String),
}

/// How a producer call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The call exceeded its wall-clock budget
    Timeout,
    /// The call returned an error
    Exception,
    /// The call returned output that could not be read as a proposal
    Malformed,
}

impl FailureKind {
    /// Short label used in abstention evidence
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Exception => "exception",
            Self::Malformed => "malformed output",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors a [`Producer`](crate::Producer) call can end with
#[derive(Error, Debug, Clone)]
pub enum ProducerError {
    /// The call did not complete within its timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The producer reported a failure
    #[error("{0}")]
    Failed(String),

    /// The producer answered, but not with a readable proposal
    #[error("malformed output: {0}")]
    Malformed(String),
}

impl ProducerError {
    /// Classify this error for abstention evidence
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Failed(_) => FailureKind::Exception,
            Self::Malformed(_) => FailureKind::Malformed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Configuration("role set is empty".to_string());
        assert_eq!(err.to_string(), "Configuration error: role set is empty");

        let err = ProducerError::Malformed("expected a JSON object".to_string());
        assert_eq!(err.to_string(), "malformed output: expected a JSON object");
    }

    #[test]
    fn test_failure_kind() {
        assert_eq!(
            ProducerError::Timeout(Duration::from_secs(1)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            ProducerError::Failed("boom".to_string()).kind(),
            FailureKind::Exception
        );
        assert_eq!(
            ProducerError::Malformed("x".to_string()).kind(),
            FailureKind::Malformed
        );
        assert_eq!(FailureKind::Malformed.to_string(), "malformed output");
    }
}
