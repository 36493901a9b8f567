//! Remote session acquisition.
//!
//! Acquiring a session walks `NEW → CREDENTIALED → CONNECTED →
//! AUTHENTICATED → READY`. Any failed step ends the attempt and disconnects
//! the transport if one was opened. Conditions that clear up on their own
//! while a resource is provisioned are reported as [`NotReady`]; conditions
//! that retrying cannot fix are reported as [`SessionError`].

mod credentials;
mod error;
mod ssh;
mod transport;

use std::fmt;

use tracing::{debug, info, warn};

use crate::poll::{PollOutcome, PollSpec, ProgressSink, wait_for};
use crate::types::ResourceId;

pub use credentials::{Credential, CredentialCache, CredentialSource};
pub use error::{NotReady, SessionError, TransportError};
pub use ssh::{RusshConnector, RusshTransport};
pub use transport::{Connector, RemoteCommandOutput, SshTarget, Transport};

/// Benign command used to confirm a shell is operational.
pub const READINESS_PROBE: &str = "ls -la";

/// Reply of a shell that so far only accepts file transfers.
pub const SFTP_ONLY_SENTINEL: &str = "This service allows sftp connections only.\n";

/// What the session will be used for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionKind {
    /// Interactive commands; requires the readiness probe to pass.
    Shell,
    /// File transfer only; ready once authenticated.
    Sftp,
}

/// An authenticated, ready connection owned by the caller.
///
/// Call [`Session::close`] when done. Dropping an open session releases the
/// connection without a clean disconnect.
pub struct Session<T: Transport> {
    transport: Option<T>,
    resource: ResourceId,
    username: String,
    kind: SessionKind,
}

impl<T: Transport> Session<T> {
    fn new(transport: T, resource: ResourceId, username: String, kind: SessionKind) -> Self {
        Self {
            transport: Some(transport),
            resource,
            username,
            kind,
        }
    }

    /// Resource the session is connected to.
    #[must_use]
    pub const fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Login used for the session.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Session kind requested at acquisition.
    #[must_use]
    pub const fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Borrows the underlying transport, for example to open a file-transfer
    /// channel.
    pub const fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Runs a command on the remote shell.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Closed`] after [`Session::close`] and
    /// [`SessionError::Transport`] when the command cannot be run.
    pub async fn exec(&mut self, command: &str) -> Result<RemoteCommandOutput, SessionError> {
        let transport = self.transport.as_mut().ok_or(SessionError::Closed)?;
        debug!(resource = %self.resource, command, "executing remote command");
        Ok(transport.exec(command).await?)
    }

    /// Disconnects the transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Disconnect`] when the server does not
    /// acknowledge the shutdown.
    pub async fn close(mut self) -> Result<(), TransportError> {
        if let Some(mut transport) = self.transport.take() {
            transport.disconnect().await?;
            info!(resource = %self.resource, "session closed");
        }
        Ok(())
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("resource", &self.resource)
            .field("username", &self.username)
            .field("kind", &self.kind)
            .field("open", &self.transport.is_some())
            .finish()
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.transport.is_some() {
            warn!(resource = %self.resource, "session dropped without close");
        }
    }
}

/// Result of one acquisition attempt.
pub enum Acquisition<T: Transport> {
    /// Authenticated and ready for use.
    Ready(Session<T>),
    /// Not usable yet; retrying later may succeed.
    NotReady(NotReady),
    /// Not usable; retrying will not help.
    Failed(SessionError),
}

impl<T: Transport> Acquisition<T> {
    /// Returns `true` for [`Acquisition::NotReady`].
    #[must_use]
    pub const fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotReady(_))
    }

    /// Converts the attempt into a `Result`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotReady`] or the permanent failure.
    pub fn into_session(self, resource: &ResourceId) -> Result<Session<T>, SessionError> {
        match self {
            Self::Ready(session) => Ok(session),
            Self::NotReady(reason) => Err(SessionError::NotReady {
                resource: resource.clone(),
                reason,
            }),
            Self::Failed(err) => Err(err),
        }
    }
}

impl<T: Transport> fmt::Debug for Acquisition<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(session) => f.debug_tuple("Ready").field(session).finish(),
            Self::NotReady(reason) => f.debug_tuple("NotReady").field(reason).finish(),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
        }
    }
}

/// Opens ready sessions against the backend's SSH endpoint.
#[derive(Clone, Debug)]
pub struct SessionAcquirer<K> {
    connector: K,
    target: SshTarget,
}

impl<K: Connector> SessionAcquirer<K> {
    /// Creates an acquirer for `target`.
    #[must_use]
    pub const fn new(connector: K, target: SshTarget) -> Self {
        Self { connector, target }
    }

    /// SSH endpoint sessions are opened against.
    #[must_use]
    pub const fn target(&self) -> &SshTarget {
        &self.target
    }

    /// Makes one acquisition attempt for `resource`.
    ///
    /// Credentials come from `cache`, minted through `source` on a miss.
    /// Every path that opened a transport and does not hand back a session
    /// disconnects it before returning.
    pub async fn acquire<C: CredentialSource + ?Sized>(
        &self,
        cache: &mut CredentialCache,
        source: &C,
        resource: &ResourceId,
        kind: SessionKind,
    ) -> Acquisition<K::Transport> {
        let credential = match cache.resolve(source, resource).await {
            Ok(credential) => credential,
            Err(err) => {
                warn!(resource = %resource, error = %err, "credential resolution failed");
                return Acquisition::Failed(err);
            }
        };

        let mut transport = match self.connector.connect(&self.target).await {
            Ok(transport) => transport,
            Err(err) => {
                debug!(resource = %resource, error = %err, "ssh endpoint not reachable");
                return Acquisition::NotReady(NotReady::Unreachable {
                    message: err.to_string(),
                });
            }
        };

        match transport
            .authenticate_password(credential.username(), credential.secret())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                discard(&mut transport, resource).await;
                warn!(
                    resource = %resource,
                    username = credential.username(),
                    "ssh credential rejected"
                );
                return Acquisition::Failed(SessionError::AuthenticationRejected {
                    resource: resource.clone(),
                    username: credential.username().to_owned(),
                });
            }
            Err(err) => {
                discard(&mut transport, resource).await;
                warn!(resource = %resource, error = %err, "ssh authentication failed");
                return Acquisition::Failed(SessionError::Transport(err));
            }
        }

        if kind == SessionKind::Shell {
            if let Err(reason) = probe(&mut transport).await {
                discard(&mut transport, resource).await;
                debug!(resource = %resource, reason = %reason, "shell not ready");
                return Acquisition::NotReady(reason);
            }
        }

        info!(resource = %resource, username = credential.username(), "session ready");
        Acquisition::Ready(Session::new(
            transport,
            resource.clone(),
            credential.username().to_owned(),
            kind,
        ))
    }

    /// Retries [`SessionAcquirer::acquire`] at `spec`'s delay until a
    /// session is ready or a permanent failure occurs.
    ///
    /// # Errors
    ///
    /// Returns the permanent [`SessionError`], or
    /// [`SessionError::ReadinessTimeout`] when the attempt ceiling is hit.
    pub async fn acquire_when_ready<C, S>(
        &self,
        spec: &PollSpec,
        cache: &mut CredentialCache,
        source: &C,
        resource: &ResourceId,
        kind: SessionKind,
        progress: &mut S,
    ) -> Result<Session<K::Transport>, SessionError>
    where
        C: CredentialSource + ?Sized,
        S: ProgressSink + ?Sized,
    {
        let outcome = wait_for(
            spec,
            async || Some(self.acquire(cache, source, resource, kind).await),
            |attempt: &Acquisition<K::Transport>| !attempt.is_not_ready(),
            progress,
        )
        .await;

        match outcome {
            PollOutcome::Done(attempt) => attempt.into_session(resource),
            PollOutcome::TimedOut { attempts, .. } => Err(SessionError::ReadinessTimeout {
                resource: resource.clone(),
                attempts,
            }),
            PollOutcome::FetchFailed { consecutive } => Err(SessionError::ReadinessTimeout {
                resource: resource.clone(),
                attempts: consecutive,
            }),
        }
    }

    /// Acquires a session, runs `work` with it, and always closes it.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error when no session could be opened. A
    /// failed disconnect after `work` is logged, not returned.
    pub async fn with_session<C, F, R>(
        &self,
        cache: &mut CredentialCache,
        source: &C,
        resource: &ResourceId,
        kind: SessionKind,
        work: F,
    ) -> Result<R, SessionError>
    where
        C: CredentialSource + ?Sized,
        F: AsyncFnOnce(&mut Session<K::Transport>) -> R,
    {
        let mut session = self
            .acquire(cache, source, resource, kind)
            .await
            .into_session(resource)?;
        let result = work(&mut session).await;
        if let Err(err) = session.close().await {
            warn!(resource = %resource, error = %err, "session disconnect failed");
        }
        Ok(result)
    }
}

async fn probe<T: Transport>(transport: &mut T) -> Result<(), NotReady> {
    let output = transport
        .exec(READINESS_PROBE)
        .await
        .map_err(|err| NotReady::ProbeUnavailable {
            message: err.to_string(),
        })?;
    if output.stdout == SFTP_ONLY_SENTINEL {
        return Err(NotReady::SftpOnly);
    }
    if !output.is_success() {
        return Err(NotReady::ProbeFailed {
            exit_code: output.exit_code,
        });
    }
    Ok(())
}

async fn discard<T: Transport>(transport: &mut T, resource: &ResourceId) {
    if let Err(err) = transport.disconnect().await {
        debug!(resource = %resource, error = %err, "disconnect after failed attempt");
    }
}
