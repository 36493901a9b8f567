//! Error types for remote session acquisition.

use thiserror::Error;

use crate::types::ResourceId;

/// Errors raised by a transport implementation.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum TransportError {
    /// Raised when the TCP/SSH handshake fails.
    #[error("connection failed: {0}")]
    Connect(String),
    /// Raised when the authentication exchange itself fails.
    #[error("authentication exchange failed: {0}")]
    Auth(String),
    /// Raised when a channel cannot be opened or read.
    #[error("channel error: {0}")]
    Channel(String),
    /// Raised when the connection cannot be shut down cleanly.
    #[error("disconnect failed: {0}")]
    Disconnect(String),
}

/// Why a freshly acquired session is not usable yet. These conditions are
/// expected while a resource is still being provisioned.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NotReady {
    /// The SSH endpoint could not be reached.
    #[error("ssh endpoint unreachable: {message}")]
    Unreachable {
        /// Transport error message.
        message: String,
    },
    /// The server only accepts file transfers so far.
    #[error("service currently allows sftp connections only")]
    SftpOnly,
    /// The readiness probe exited unsuccessfully.
    #[error("readiness probe exited with status {exit_code:?}")]
    ProbeFailed {
        /// Exit status reported by the server, if any.
        exit_code: Option<i32>,
    },
    /// The readiness probe could not be run.
    #[error("readiness probe could not run: {message}")]
    ProbeUnavailable {
        /// Channel error message.
        message: String,
    },
}

/// Errors surfaced while acquiring or using a session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// Raised when the login identity cannot be determined or rotated.
    #[error("cannot resolve credentials for {resource}: {reason}")]
    CredentialResolution {
        /// Resource whose credentials were requested.
        resource: ResourceId,
        /// Description of the failed lookup or rotation.
        reason: String,
    },
    /// Raised when the session is not ready on a single attempt.
    #[error("session for {resource} not ready: {reason}")]
    NotReady {
        /// Resource the session was requested for.
        resource: ResourceId,
        /// Readiness condition that failed.
        reason: NotReady,
    },
    /// Raised when the server refuses the credential. The cached secret is
    /// reused on every attempt, so retrying cannot succeed.
    #[error("ssh login {username} rejected for {resource}")]
    AuthenticationRejected {
        /// Resource the session was requested for.
        resource: ResourceId,
        /// Login that was rejected.
        username: String,
    },
    /// Raised when readiness attempts run out.
    #[error("session for {resource} not ready after {attempts} attempts")]
    ReadinessTimeout {
        /// Resource the session was requested for.
        resource: ResourceId,
        /// Number of attempts made.
        attempts: u32,
    },
    /// Raised when the transport fails in a way retries will not fix.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Raised when a closed session is used.
    #[error("session already closed")]
    Closed,
}
