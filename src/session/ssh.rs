//! SSH transport backed by the `russh` crate.

use std::sync::Arc;
use std::time::Duration;

use russh::keys::ssh_key;
use russh::{ChannelMsg, Disconnect, client};
use tokio::time::timeout;
use tracing::debug;

use super::transport::{Connector, RemoteCommandOutput, SshTarget, Transport};
use super::TransportError;
use crate::backend::OpsFuture;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const STDERR_STREAM: u32 = 1;

/// Client handler for hosting-platform endpoints.
#[derive(Debug)]
struct HostingHandler;

impl client::Handler for HostingHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Freshly provisioned endpoints have no pinned key yet.
        Ok(true)
    }
}

/// Connector that opens `russh` client sessions.
#[derive(Clone, Debug)]
pub struct RusshConnector {
    connect_timeout: Duration,
}

impl RusshConnector {
    /// Creates a connector with the default connect timeout.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
        }
    }
}

impl Default for RusshConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for RusshConnector {
    type Transport = RusshTransport;

    fn connect<'a>(
        &'a self,
        target: &'a SshTarget,
    ) -> OpsFuture<'a, Result<Self::Transport, TransportError>> {
        Box::pin(async move {
            let config = Arc::new(client::Config::default());
            let connect = client::connect(
                config,
                (target.host.as_str(), target.port),
                HostingHandler,
            );
            let handle = timeout(self.connect_timeout, connect)
                .await
                .map_err(|_| {
                    TransportError::Connect(format!(
                        "timed out after {:?} connecting to {}:{}",
                        self.connect_timeout, target.host, target.port
                    ))
                })?
                .map_err(|err| TransportError::Connect(err.to_string()))?;
            debug!(host = %target.host, port = target.port, "ssh transport opened");
            Ok(RusshTransport { handle })
        })
    }
}

/// Open `russh` client connection.
pub struct RusshTransport {
    handle: client::Handle<HostingHandler>,
}

impl std::fmt::Debug for RusshTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusshTransport").finish_non_exhaustive()
    }
}

impl Transport for RusshTransport {
    fn authenticate_password<'a>(
        &'a mut self,
        username: &'a str,
        secret: &'a str,
    ) -> OpsFuture<'a, Result<bool, TransportError>> {
        Box::pin(async move {
            let result = self
                .handle
                .authenticate_password(username, secret)
                .await
                .map_err(|err| TransportError::Auth(err.to_string()))?;
            Ok(result.success())
        })
    }

    fn exec<'a>(
        &'a mut self,
        command: &'a str,
    ) -> OpsFuture<'a, Result<RemoteCommandOutput, TransportError>> {
        Box::pin(async move {
            let mut channel = self
                .handle
                .channel_open_session()
                .await
                .map_err(|err| TransportError::Channel(err.to_string()))?;
            channel
                .exec(true, command)
                .await
                .map_err(|err| TransportError::Channel(err.to_string()))?;

            let mut exit_code = None;
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            while let Some(message) = channel.wait().await {
                match message {
                    ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
                    ChannelMsg::ExtendedData { data, ext } if ext == STDERR_STREAM => {
                        stderr.extend_from_slice(&data);
                    }
                    ChannelMsg::ExitStatus { exit_status } => {
                        exit_code = Some(exit_status.cast_signed());
                    }
                    _ => {}
                }
            }

            Ok(RemoteCommandOutput {
                exit_code,
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr: String::from_utf8_lossy(&stderr).into_owned(),
            })
        })
    }

    fn disconnect(&mut self) -> OpsFuture<'_, Result<(), TransportError>> {
        Box::pin(async move {
            self.handle
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|err| TransportError::Disconnect(err.to_string()))
        })
    }
}
