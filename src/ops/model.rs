//! Typed views of the backend replies the operations depend on.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ProjectId;

/// Site state reported while the hosting platform is still building a site.
pub const PROVISIONING_STATE: &str = "provisioning";

/// Deployment statuses after which a run never changes again.
pub const TERMINAL_DEPLOYMENT_STATUSES: [&str; 4] = ["success", "failed", "canceled", "error"];

/// Deployment status of a run that completed successfully.
pub const DEPLOYMENT_SUCCESS: &str = "success";

/// Site detail from the hosting platform.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SiteStatus {
    /// Lifecycle state, for example `provisioning` or `active`.
    pub state: String,
    /// Remaining fields, passed through unchanged.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl SiteStatus {
    /// Returns `true` while the site is still being provisioned.
    #[must_use]
    pub fn is_provisioning(&self) -> bool {
        self.state == PROVISIONING_STATE
    }
}

/// One deployment run.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DeploymentRun {
    /// Run status, for example `queued`, `running`, or `success`.
    pub status: String,
    /// Remaining fields, passed through unchanged.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl DeploymentRun {
    /// Returns `true` once the run can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        TERMINAL_DEPLOYMENT_STATUSES.contains(&self.status.as_str())
    }

    /// Returns `true` when the run finished successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == DEPLOYMENT_SUCCESS
    }
}

/// Request body for project creation.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct NewProject<'a> {
    pub(crate) name: &'a str,
}

/// Reply to project creation.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CreatedProject {
    /// Identifier assigned by the code-hosting platform.
    #[serde(deserialize_with = "id_from_scalar")]
    pub id: ProjectId,
    /// Remaining fields, passed through unchanged.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

fn id_from_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProjectId, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(id) if !id.is_empty() => Ok(ProjectId::from(id)),
        Value::Number(id) => Ok(ProjectId::from(id.to_string())),
        other => Err(de::Error::custom(format!("unsupported project id {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("queued", false)]
    #[case("running", false)]
    #[case("success", true)]
    #[case("failed", true)]
    #[case("canceled", true)]
    #[case("error", true)]
    fn terminal_statuses(#[case] status: &str, #[case] terminal: bool) {
        let run: DeploymentRun = serde_json::from_value(json!({ "status": status }))
            .unwrap_or_else(|err| panic!("decode run: {err}"));
        assert_eq!(run.is_terminal(), terminal);
    }

    #[rstest]
    fn site_status_keeps_extra_fields() {
        let status: SiteStatus =
            serde_json::from_value(json!({ "id": 7, "state": "active", "name": "blog" }))
                .unwrap_or_else(|err| panic!("decode site: {err}"));
        assert!(!status.is_provisioning());
        assert_eq!(status.details.get("name"), Some(&json!("blog")));
    }

    #[rstest]
    #[case(json!({ "id": 12 }), "12")]
    #[case(json!({ "id": "p-12" }), "p-12")]
    fn project_ids_accept_numbers_and_strings(#[case] reply: Value, #[case] expected: &str) {
        let project: CreatedProject =
            serde_json::from_value(reply).unwrap_or_else(|err| panic!("decode project: {err}"));
        assert_eq!(project.id.as_str(), expected);
    }

    #[rstest]
    fn project_without_usable_id_is_rejected() {
        let result = serde_json::from_value::<CreatedProject>(json!({ "id": null }));
        assert!(result.is_err());
    }
}
