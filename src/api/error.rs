//! Error types for the request executor.

use thiserror::Error;

/// Structured errors raised while preparing requests or the HTTP client.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// Raised when a request body cannot be encoded as JSON.
    #[error("failed to encode request body for {endpoint}: {message}")]
    Serialization {
        /// Endpoint the body was destined for.
        endpoint: String,
        /// Encoder error message.
        message: String,
    },
    /// Raised when the HTTP client cannot be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// A failed backend call, obtained from a classified outcome.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CallError {
    /// The host could not be reached.
    #[error("backend unreachable: {message}")]
    Transport {
        /// Description of the transport error.
        message: String,
    },
    /// The backend replied with a non-2xx status.
    #[error("backend returned HTTP {status}")]
    Http {
        /// HTTP status code.
        status: u16,
    },
    /// The backend replied 2xx with an error payload.
    #[error("backend error {code}: {message}")]
    Api {
        /// Backend-specific error code.
        code: String,
        /// Accompanying message.
        message: String,
    },
}
