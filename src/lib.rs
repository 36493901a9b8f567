//! Core library for the siteops orchestration tool.
//!
//! The crate drives several independent REST backends (hosting, code
//! hosting, deployment, site management) behind one gateway. Every backend
//! call goes through a single request executor whose replies are classified
//! into tagged outcomes; waits are expressed as fixed-delay polling loops;
//! remote shells are opened through a session acquirer that memoizes
//! per-site credentials in an explicit orchestration context.

pub mod api;
pub mod backend;
pub mod config;
pub mod context;
pub mod ops;
pub mod poll;
pub mod session;
pub mod test_support;
pub mod types;

pub use api::{ApiClient, BatchResult, RequestSpec, ResponseOutcome, ServiceAccount};
pub use backend::Backend;
pub use config::{ConfigError, OpsConfig};
pub use context::{OpsContext, OpsEvent};
pub use ops::{CreatedProject, DeploymentRun, OpsError, Orchestrator, SiteStatus};
pub use poll::{PollOutcome, PollSpec, ProgressSink, wait_for};
pub use session::{
    Acquisition, Credential, CredentialCache, NotReady, RusshConnector, Session, SessionAcquirer,
    SessionError, SessionKind, SshTarget,
};
pub use types::{ProjectId, ResourceId, RunId};
