//! Per-resource SSH credentials, memoized for the life of an orchestration
//! context.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Value, json};
use tracing::{debug, info};

use super::SessionError;
use crate::api::{ApiClient, ResponseOutcome};
use crate::backend::{Backend, OpsFuture, endpoints};
use crate::types::ResourceId;

/// Login for one resource's remote shell.
#[derive(Clone, Eq, PartialEq)]
pub struct Credential {
    resource: ResourceId,
    username: String,
    secret: String,
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(resource: ResourceId, username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            resource,
            username: username.into(),
            secret: secret.into(),
        }
    }

    /// Resource the credential belongs to.
    #[must_use]
    pub const fn resource(&self) -> &ResourceId {
        &self.resource
    }

    /// Login name.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Login secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("resource", &self.resource)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Backend operations needed to mint a credential.
pub trait CredentialSource {
    /// Looks up the resource's designated login identity.
    fn login_identity<'a>(
        &'a self,
        resource: &'a ResourceId,
    ) -> OpsFuture<'a, Result<String, SessionError>>;

    /// Asks the owning backend to issue a new secret for `username`.
    fn rotate_secret<'a>(
        &'a self,
        resource: &'a ResourceId,
        username: &'a str,
    ) -> OpsFuture<'a, Result<String, SessionError>>;
}

/// Credentials minted so far, keyed by resource. Entries are never evicted.
#[derive(Debug, Default)]
pub struct CredentialCache {
    entries: HashMap<ResourceId, Credential>,
}

impl CredentialCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized credential for `resource`.
    #[must_use]
    pub fn get(&self, resource: &ResourceId) -> Option<&Credential> {
        self.entries.get(resource)
    }

    /// Number of cached credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the cached credential or mints one by looking up the login
    /// identity and rotating its secret. Failures are not cached.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::CredentialResolution`] when the lookup or the
    /// rotation fails.
    pub async fn resolve<C: CredentialSource + ?Sized>(
        &mut self,
        source: &C,
        resource: &ResourceId,
    ) -> Result<Credential, SessionError> {
        if let Some(cached) = self.entries.get(resource) {
            debug!(resource = %resource, "using cached credential");
            return Ok(cached.clone());
        }

        let username = source.login_identity(resource).await?;
        let secret = source.rotate_secret(resource, &username).await?;
        info!(resource = %resource, username = %username, "rotated ssh credential");

        let credential = Credential::new(resource.clone(), username, secret);
        self.entries.insert(resource.clone(), credential.clone());
        Ok(credential)
    }
}

impl CredentialSource for ApiClient {
    fn login_identity<'a>(
        &'a self,
        resource: &'a ResourceId,
    ) -> OpsFuture<'a, Result<String, SessionError>> {
        Box::pin(async move {
            let outcome = self
                .get(Backend::Hosting, endpoints::site_ssh_login(resource))
                .await;
            string_field(outcome, "username", resource)
        })
    }

    fn rotate_secret<'a>(
        &'a self,
        resource: &'a ResourceId,
        username: &'a str,
    ) -> OpsFuture<'a, Result<String, SessionError>> {
        Box::pin(async move {
            let outcome = self
                .post(
                    Backend::Hosting,
                    endpoints::site_ssh_password(resource),
                    json!({ "username": username }),
                )
                .await;
            string_field(outcome, "password", resource)
        })
    }
}

fn string_field(
    outcome: ResponseOutcome,
    field: &str,
    resource: &ResourceId,
) -> Result<String, SessionError> {
    let resolution_error = |reason: String| SessionError::CredentialResolution {
        resource: resource.clone(),
        reason,
    };
    let payload = outcome
        .into_result()
        .map_err(|err| resolution_error(err.to_string()))?
        .ok_or_else(|| resolution_error(String::from("backend returned no content")))?;
    match payload.get(field) {
        Some(Value::String(value)) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(resolution_error(format!("reply carried no {field}"))),
    }
}
