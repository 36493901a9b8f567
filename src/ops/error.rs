//! Error types for orchestration operations.

use thiserror::Error;

use crate::api::{ApiError, CallError};
use crate::config::ConfigError;
use crate::session::{SessionError, TransportError};

/// Errors surfaced by [`super::Orchestrator`] operations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Raised when configuration is missing or unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Raised when a request cannot be prepared.
    #[error(transparent)]
    Request(#[from] ApiError),
    /// Raised when a backend call fails.
    #[error("{endpoint}: {source}")]
    Call {
        /// Endpoint path the call was made against.
        endpoint: String,
        /// Classified failure.
        #[source]
        source: CallError,
    },
    /// Raised when a backend replies with no content where a payload is
    /// required.
    #[error("{endpoint}: backend returned no content")]
    EmptyReply {
        /// Endpoint path the call was made against.
        endpoint: String,
    },
    /// Raised when a payload does not have the expected shape.
    #[error("{endpoint}: unexpected reply: {message}")]
    Decode {
        /// Endpoint path the call was made against.
        endpoint: String,
        /// Decoder error message.
        message: String,
    },
    /// Raised when a bounded wait runs out of attempts.
    #[error("gave up waiting for {subject} after {attempts} checks")]
    Timeout {
        /// What was being waited on.
        subject: String,
        /// Number of checks performed.
        attempts: u32,
    },
    /// Raised when too many state fetches fail in a row.
    #[error("gave up waiting for {subject} after {consecutive} failed fetches")]
    Unavailable {
        /// What was being waited on.
        subject: String,
        /// Length of the failure streak.
        consecutive: u32,
    },
    /// Raised when no remote session could be used.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<TransportError> for OpsError {
    fn from(value: TransportError) -> Self {
        Self::Session(SessionError::Transport(value))
    }
}
