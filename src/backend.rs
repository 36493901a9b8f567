//! The REST backends orchestrated by siteops and the endpoints the
//! operations rely on.
//!
//! Every backend lives under the same API gateway and is addressed as
//! `<base>/<segment>/v1/<endpoint>`. Only the handful of endpoints used by
//! the orchestration layer are enumerated here.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde_json::{Value, json};

use crate::types::{ProjectId, ResourceId, RunId};

/// Independent REST services composed by the operations.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Backend {
    /// Hosting platform: sites, SSH logins, credential rotation.
    Hosting,
    /// Code-hosting platform: projects and repositories.
    CodeHost,
    /// Deployment platform: pipelines and runs.
    Deploy,
    /// Site-management platform: bulk site metadata.
    SiteManager,
    /// Feature-module platform.
    Modules,
}

impl Backend {
    /// Path segment used for this backend on the gateway.
    #[must_use]
    pub const fn segment(self) -> &'static str {
        match self {
            Self::Hosting => "hosting",
            Self::CodeHost => "code",
            Self::Deploy => "deploy",
            Self::SiteManager => "site-manager",
            Self::Modules => "modules",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Future returned by backend-facing operations.
pub type OpsFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Endpoint paths (relative to `<backend>/v1/`).
pub mod endpoints {
    use super::{ProjectId, ResourceId, RunId};

    /// Site detail, including its provisioning `state`.
    #[must_use]
    pub fn site(site: &ResourceId) -> String {
        format!("sites/{site}")
    }

    /// Designated SSH login identity for a site.
    #[must_use]
    pub fn site_ssh_login(site: &ResourceId) -> String {
        format!("sites/{site}/ssh")
    }

    /// Password rotation for a site's SSH login.
    #[must_use]
    pub fn site_ssh_password(site: &ResourceId) -> String {
        format!("sites/{site}/ssh/password")
    }

    /// A single deployment run.
    #[must_use]
    pub fn deployment_run(project: &ProjectId, run: &RunId) -> String {
        format!("projects/{project}/runs/{run}")
    }

    /// Bulk site lookup on the site-management platform.
    pub const SITES_BATCH: &str = "sites/batch";

    /// Project collection on the code-hosting platform.
    pub const PROJECTS: &str = "projects";
}

/// Request body for the batch site endpoint.
#[must_use]
pub fn batch_body(sites: &[ResourceId]) -> Value {
    json!({ "sites": sites.iter().map(ResourceId::as_str).collect::<Vec<_>>() })
}
