//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::env;
use std::ffi::OsString;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::Level;

use crate::backend::OpsFuture;
use crate::poll::ProgressSink;
use crate::session::{
    Connector, CredentialSource, RemoteCommandOutput, SessionError, SshTarget, Transport,
    TransportError,
};
use crate::types::ResourceId;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Progress sink that counts ticks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CountingProgress {
    ticks: usize,
}

impl CountingProgress {
    /// Number of ticks received.
    #[must_use]
    pub const fn ticks(&self) -> usize {
        self.ticks
    }
}

impl ProgressSink for CountingProgress {
    fn tick(&mut self) {
        self.ticks += 1;
    }
}

/// Records a single interaction with a [`ScriptedTransport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransportEvent {
    /// A connection was opened.
    Connected,
    /// Password authentication was attempted.
    Authenticated {
        /// Login presented.
        username: String,
        /// Secret presented.
        secret: String,
    },
    /// A command was executed.
    Exec(String),
    /// The connection was closed.
    Disconnected,
}

#[derive(Debug)]
enum AuthReply {
    Accept,
    Reject,
    Error,
}

#[derive(Debug)]
enum ScriptedAttempt {
    Refuse,
    Open {
        auth: AuthReply,
        outputs: VecDeque<RemoteCommandOutput>,
    },
}

#[derive(Debug, Default)]
struct ConnectorState {
    attempts: VecDeque<ScriptedAttempt>,
    events: Vec<TransportEvent>,
}

/// Connector that replays pre-seeded connection attempts in FIFO order.
#[derive(Clone, Debug, Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl ScriptedConnector {
    /// Creates a connector with no queued attempts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an attempt whose connection is refused.
    pub fn push_refused(&self) {
        lock(&self.state).attempts.push_back(ScriptedAttempt::Refuse);
    }

    /// Queues a connection that accepts the credential and replies to
    /// commands with `outputs` in order.
    pub fn push_accepting(&self, outputs: impl IntoIterator<Item = RemoteCommandOutput>) {
        lock(&self.state).attempts.push_back(ScriptedAttempt::Open {
            auth: AuthReply::Accept,
            outputs: outputs.into_iter().collect(),
        });
    }

    /// Queues a connection that rejects the credential.
    pub fn push_rejecting(&self) {
        lock(&self.state).attempts.push_back(ScriptedAttempt::Open {
            auth: AuthReply::Reject,
            outputs: VecDeque::new(),
        });
    }

    /// Queues a connection whose authentication exchange errors.
    pub fn push_auth_error(&self) {
        lock(&self.state).attempts.push_back(ScriptedAttempt::Open {
            auth: AuthReply::Error,
            outputs: VecDeque::new(),
        });
    }

    /// Snapshot of every recorded interaction.
    #[must_use]
    pub fn events(&self) -> Vec<TransportEvent> {
        lock(&self.state).events.clone()
    }

    /// Number of connections opened.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.count(|event| matches!(event, TransportEvent::Connected))
    }

    /// Number of connections closed.
    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.count(|event| matches!(event, TransportEvent::Disconnected))
    }

    fn count(&self, predicate: impl Fn(&TransportEvent) -> bool) -> usize {
        lock(&self.state)
            .events
            .iter()
            .filter(|event| predicate(event))
            .count()
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect<'a>(
        &'a self,
        target: &'a SshTarget,
    ) -> OpsFuture<'a, Result<Self::Transport, TransportError>> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            match state.attempts.pop_front() {
                Some(ScriptedAttempt::Open { auth, outputs }) => {
                    state.events.push(TransportEvent::Connected);
                    Ok(ScriptedTransport {
                        state: Arc::clone(&self.state),
                        auth,
                        outputs,
                    })
                }
                Some(ScriptedAttempt::Refuse) => Err(TransportError::Connect(format!(
                    "connection refused by {}:{}",
                    target.host, target.port
                ))),
                None => Err(TransportError::Connect(String::from(
                    "no scripted connection available",
                ))),
            }
        })
    }
}

/// Transport produced by [`ScriptedConnector`].
#[derive(Debug)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ConnectorState>>,
    auth: AuthReply,
    outputs: VecDeque<RemoteCommandOutput>,
}

impl ScriptedTransport {
    fn record(&self, event: TransportEvent) {
        lock(&self.state).events.push(event);
    }
}

impl Transport for ScriptedTransport {
    fn authenticate_password<'a>(
        &'a mut self,
        username: &'a str,
        secret: &'a str,
    ) -> OpsFuture<'a, Result<bool, TransportError>> {
        Box::pin(async move {
            self.record(TransportEvent::Authenticated {
                username: username.to_owned(),
                secret: secret.to_owned(),
            });
            match self.auth {
                AuthReply::Accept => Ok(true),
                AuthReply::Reject => Ok(false),
                AuthReply::Error => Err(TransportError::Auth(String::from(
                    "no supported authentication methods",
                ))),
            }
        })
    }

    fn exec<'a>(
        &'a mut self,
        command: &'a str,
    ) -> OpsFuture<'a, Result<RemoteCommandOutput, TransportError>> {
        Box::pin(async move {
            self.record(TransportEvent::Exec(command.to_owned()));
            self.outputs
                .pop_front()
                .ok_or_else(|| TransportError::Channel(String::from("no scripted output")))
        })
    }

    fn disconnect(&mut self) -> OpsFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.record(TransportEvent::Disconnected);
            Ok(())
        })
    }
}

/// Builds a command output with the given exit code and stdout.
#[must_use]
pub fn output(exit_code: i32, stdout: &str) -> RemoteCommandOutput {
    RemoteCommandOutput {
        exit_code: Some(exit_code),
        stdout: stdout.to_owned(),
        stderr: String::new(),
    }
}

#[derive(Debug, Default)]
struct CredentialState {
    lookups: usize,
    rotations: usize,
}

/// Credential source returning a fixed login and numbered secrets.
#[derive(Clone, Debug)]
pub struct ScriptedCredentials {
    username: Option<String>,
    state: Arc<Mutex<CredentialState>>,
}

impl ScriptedCredentials {
    /// Source whose login is `username`; each rotation yields `secret-<n>`.
    #[must_use]
    pub fn new(username: &str) -> Self {
        Self {
            username: Some(username.to_owned()),
            state: Arc::default(),
        }
    }

    /// Source whose login lookup always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            username: None,
            state: Arc::default(),
        }
    }

    /// Number of login lookups performed.
    #[must_use]
    pub fn lookups(&self) -> usize {
        lock(&self.state).lookups
    }

    /// Number of rotations performed.
    #[must_use]
    pub fn rotations(&self) -> usize {
        lock(&self.state).rotations
    }
}

impl CredentialSource for ScriptedCredentials {
    fn login_identity<'a>(
        &'a self,
        resource: &'a ResourceId,
    ) -> OpsFuture<'a, Result<String, SessionError>> {
        Box::pin(async move {
            lock(&self.state).lookups += 1;
            self.username
                .clone()
                .ok_or_else(|| SessionError::CredentialResolution {
                    resource: resource.clone(),
                    reason: String::from("no designated login"),
                })
        })
    }

    fn rotate_secret<'a>(
        &'a self,
        _resource: &'a ResourceId,
        _username: &'a str,
    ) -> OpsFuture<'a, Result<String, SessionError>> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.rotations += 1;
            Ok(format!("secret-{}", state.rotations))
        })
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a thread-local subscriber and returns its result together
/// with every `WARN`-or-higher line it logged.
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .with_ansi(false)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&lock(&buffer.0)).into_owned();
    (result, logs)
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets environment variables while holding [`ENV_LOCK`].
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }
        Self {
            previous,
            _guard: guard,
        }
    }

    /// Removes environment variables while holding [`ENV_LOCK`].
    pub async fn remove_vars(keys: &[&str]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(keys.len());
        for key in keys {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`.
            unsafe { env::remove_var(key) };
            previous.push(((*key).to_owned(), old));
        }
        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in self.previous.iter().rev() {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(value) => env::set_var(key, value),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
