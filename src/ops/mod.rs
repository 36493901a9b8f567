//! Operations composed from the request executor, the state poller, and the
//! session acquirer.
//!
//! Every call is awaited before the next one is issued. Waits use the poll
//! settings the orchestrator was built with; remote commands run over a
//! session that is closed before the operation returns.

mod error;
mod model;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, BatchResult, Method, RequestSpec, ResponseOutcome, partition};
use crate::backend::{Backend, batch_body, endpoints};
use crate::config::OpsConfig;
use crate::context::{OpsContext, OpsEvent};
use crate::poll::{
    DEFAULT_POLL_DELAY, DEPLOYMENT_POLL_DELAY, PollOutcome, PollSpec, ProgressSink,
    SSH_POLL_DELAY, wait_for,
};
use crate::session::{
    Connector, RemoteCommandOutput, RusshConnector, Session, SessionAcquirer, SessionKind,
    SshTarget,
};
use crate::types::{ProjectId, ResourceId, RunId};

pub use error::OpsError;
pub use model::{
    CreatedProject, DEPLOYMENT_SUCCESS, DeploymentRun, PROVISIONING_STATE, SiteStatus,
    TERMINAL_DEPLOYMENT_STATUSES,
};
use model::NewProject;

/// Runs site, deployment, and project operations against the backends.
#[derive(Debug)]
pub struct Orchestrator<K> {
    api: ApiClient,
    acquirer: SessionAcquirer<K>,
    site_poll: PollSpec,
    deployment_poll: PollSpec,
    ssh_poll: PollSpec,
}

impl Orchestrator<RusshConnector> {
    /// Builds an orchestrator that talks to the configured gateway and SSH
    /// endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Config`] when validation fails and
    /// [`OpsError::Request`] when the HTTP client cannot be built.
    pub fn from_config(config: &OpsConfig) -> Result<Self, OpsError> {
        config.validate()?;
        let api = ApiClient::from_config(config)?;
        let target = SshTarget::new(config.ssh_host.as_str(), config.ssh_port);
        Ok(
            Self::new(api, SessionAcquirer::new(RusshConnector::new(), target))
                .with_site_poll(config.default_poll())
                .with_deployment_poll(config.deployment_poll())
                .with_ssh_poll(config.ssh_poll()),
        )
    }
}

impl<K: Connector> Orchestrator<K> {
    /// Creates an orchestrator with the default poll settings.
    #[must_use]
    pub const fn new(api: ApiClient, acquirer: SessionAcquirer<K>) -> Self {
        Self {
            api,
            acquirer,
            site_poll: PollSpec::new(DEFAULT_POLL_DELAY),
            deployment_poll: PollSpec::new(DEPLOYMENT_POLL_DELAY),
            ssh_poll: PollSpec::new(SSH_POLL_DELAY),
        }
    }

    /// Overrides the poll settings used while a site is provisioned.
    #[must_use]
    pub const fn with_site_poll(mut self, spec: PollSpec) -> Self {
        self.site_poll = spec;
        self
    }

    /// Overrides the poll settings used while a deployment runs.
    #[must_use]
    pub const fn with_deployment_poll(mut self, spec: PollSpec) -> Self {
        self.deployment_poll = spec;
        self
    }

    /// Overrides the poll settings used while waiting for SSH.
    #[must_use]
    pub const fn with_ssh_poll(mut self, spec: PollSpec) -> Self {
        self.ssh_poll = spec;
        self
    }

    /// Request executor used by every operation.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Fetches a site's current detail.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Call`] when the backend call fails and
    /// [`OpsError::Decode`] when the reply has no `state`.
    pub async fn site_state(&self, site: &ResourceId) -> Result<SiteStatus, OpsError> {
        let request = RequestSpec::get(Backend::Hosting, endpoints::site(site));
        decode(&request, self.api.execute(&request).await)
    }

    /// Waits until a site leaves the provisioning state.
    ///
    /// Failed fetches count as "not yet done" unless the poll settings cap
    /// consecutive failures.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Timeout`] or [`OpsError::Unavailable`] when a
    /// configured ceiling is reached.
    pub async fn wait_for_site<S: ProgressSink + ?Sized>(
        &self,
        ctx: &OpsContext,
        site: &ResourceId,
        progress: &mut S,
    ) -> Result<SiteStatus, OpsError> {
        let outcome = wait_for(
            &self.site_poll,
            async || snapshot(self.site_state(site).await),
            |status: &SiteStatus| !status.is_provisioning(),
            progress,
        )
        .await;
        let status = settle(outcome, format!("site {site}"))?;
        info!(site = %site, state = %status.state, "site ready");
        ctx.emit(OpsEvent::SiteReady {
            site: site.clone(),
            state: status.state.clone(),
        });
        Ok(status)
    }

    /// Fetches one deployment run.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Call`] when the backend call fails and
    /// [`OpsError::Decode`] when the reply has no `status`.
    pub async fn deployment_status(
        &self,
        project: &ProjectId,
        run: &RunId,
    ) -> Result<DeploymentRun, OpsError> {
        let request = RequestSpec::get(Backend::Deploy, endpoints::deployment_run(project, run));
        decode(&request, self.api.execute(&request).await)
    }

    /// Waits until a deployment run reaches a terminal status. A failed run
    /// is returned as `Ok`; inspect [`DeploymentRun::is_success`].
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Timeout`] or [`OpsError::Unavailable`] when a
    /// configured ceiling is reached.
    pub async fn wait_for_deployment<S: ProgressSink + ?Sized>(
        &self,
        ctx: &OpsContext,
        project: &ProjectId,
        run: &RunId,
        progress: &mut S,
    ) -> Result<DeploymentRun, OpsError> {
        let outcome = wait_for(
            &self.deployment_poll,
            async || snapshot(self.deployment_status(project, run).await),
            DeploymentRun::is_terminal,
            progress,
        )
        .await;
        let finished = settle(outcome, format!("deployment {project}/{run}"))?;
        info!(project = %project, run = %run, status = %finished.status, "deployment finished");
        ctx.emit(OpsEvent::DeploymentFinished {
            project: project.clone(),
            run: run.clone(),
            status: finished.status.clone(),
        });
        Ok(finished)
    }

    /// Waits until a site's remote shell accepts commands and returns the
    /// open session. The caller must close it.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Session`] on a permanent failure or when the
    /// readiness ceiling is reached.
    pub async fn wait_for_ssh<S: ProgressSink + ?Sized>(
        &self,
        ctx: &mut OpsContext,
        site: &ResourceId,
        progress: &mut S,
    ) -> Result<Session<K::Transport>, OpsError> {
        let session = self
            .acquirer
            .acquire_when_ready(
                &self.ssh_poll,
                ctx.credentials_mut(),
                &self.api,
                site,
                SessionKind::Shell,
                progress,
            )
            .await?;
        Ok(session)
    }

    /// Waits for a site's shell, runs `command`, and closes the session.
    ///
    /// A non-zero remote exit status is returned, not raised.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Session`] when no session could be opened or the
    /// command could not be started.
    pub async fn run_remote<S: ProgressSink + ?Sized>(
        &self,
        ctx: &mut OpsContext,
        site: &ResourceId,
        command: &str,
        progress: &mut S,
    ) -> Result<RemoteCommandOutput, OpsError> {
        let mut session = self.wait_for_ssh(ctx, site, progress).await?;
        let result = session.exec(command).await;
        if let Err(err) = session.close().await {
            warn!(site = %site, error = %err, "session disconnect failed");
        }
        Ok(result?)
    }

    /// Looks up several sites in one call and splits the reply per site.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Call`] when the call itself fails and
    /// [`OpsError::Decode`] when the reply is not an id-keyed object.
    pub async fn batch_site_info(&self, sites: &[ResourceId]) -> Result<BatchResult, OpsError> {
        if sites.is_empty() {
            return Ok(BatchResult::default());
        }
        let request = RequestSpec::new(Backend::SiteManager, Method::Post, endpoints::SITES_BATCH)
            .with_body(batch_body(sites));
        match require_payload(&request, self.api.execute(&request).await)? {
            Value::Object(map) => {
                let batch = partition(map);
                debug!(
                    resolved = batch.results.len(),
                    failed = batch.errors.len(),
                    "batch site lookup finished"
                );
                Ok(batch)
            }
            other => Err(OpsError::Decode {
                endpoint: request.path(),
                message: format!("expected an object keyed by site, got {other}"),
            }),
        }
    }

    /// Creates a code-hosting project and emits [`OpsEvent::ProjectCreated`].
    /// The call is never retried.
    ///
    /// # Errors
    ///
    /// Returns [`OpsError::Call`] when the backend rejects the request and
    /// [`OpsError::Decode`] when the reply carries no usable id.
    pub async fn create_project(
        &self,
        ctx: &OpsContext,
        name: &str,
    ) -> Result<CreatedProject, OpsError> {
        let request = RequestSpec::new(Backend::CodeHost, Method::Post, endpoints::PROJECTS)
            .with_json(&NewProject { name })?;
        let project: CreatedProject = decode(&request, self.api.execute(&request).await)?;
        info!(project = %project.id, name, "project created");
        ctx.emit(OpsEvent::ProjectCreated {
            project: project.id.clone(),
            name: name.to_owned(),
        });
        Ok(project)
    }
}

fn require_payload(request: &RequestSpec, outcome: ResponseOutcome) -> Result<Value, OpsError> {
    outcome
        .into_result()
        .map_err(|source| OpsError::Call {
            endpoint: request.path(),
            source,
        })?
        .ok_or_else(|| OpsError::EmptyReply {
            endpoint: request.path(),
        })
}

fn decode<T: DeserializeOwned>(
    request: &RequestSpec,
    outcome: ResponseOutcome,
) -> Result<T, OpsError> {
    let payload = require_payload(request, outcome)?;
    serde_json::from_value(payload).map_err(|err| OpsError::Decode {
        endpoint: request.path(),
        message: err.to_string(),
    })
}

fn snapshot<T>(fetched: Result<T, OpsError>) -> Option<T> {
    fetched
        .inspect_err(|err| debug!(error = %err, "state snapshot unavailable"))
        .ok()
}

fn settle<T>(outcome: PollOutcome<T>, subject: String) -> Result<T, OpsError> {
    match outcome {
        PollOutcome::Done(value) => Ok(value),
        PollOutcome::TimedOut { attempts, .. } => Err(OpsError::Timeout { subject, attempts }),
        PollOutcome::FetchFailed { consecutive } => Err(OpsError::Unavailable {
            subject,
            consecutive,
        }),
    }
}
