//! Transport seam between session acquisition and the SSH library.

use super::TransportError;
use crate::backend::OpsFuture;

/// Where the backend's remote shell listens.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SshTarget {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl SshTarget {
    /// Creates a target.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// Output of a command executed over a session.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteCommandOutput {
    /// Exit status reported by the server, if any.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl RemoteCommandOutput {
    /// Returns `true` when the exit status equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Opens transports to a target.
pub trait Connector {
    /// Connection type produced by this connector.
    type Transport: Transport;

    /// Opens an unauthenticated connection.
    fn connect<'a>(&'a self, target: &'a SshTarget)
    -> OpsFuture<'a, Result<Self::Transport, TransportError>>;
}

/// An open connection to a remote shell.
pub trait Transport: Send {
    /// Attempts password authentication. `Ok(false)` means the server
    /// rejected the credential.
    fn authenticate_password<'a>(
        &'a mut self,
        username: &'a str,
        secret: &'a str,
    ) -> OpsFuture<'a, Result<bool, TransportError>>;

    /// Runs one command and collects its output.
    fn exec<'a>(&'a mut self, command: &'a str)
    -> OpsFuture<'a, Result<RemoteCommandOutput, TransportError>>;

    /// Closes the connection.
    fn disconnect(&mut self) -> OpsFuture<'_, Result<(), TransportError>>;
}
