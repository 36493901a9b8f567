//! Uniform request execution and response classification for every backend
//! call.
//!
//! [`ApiClient::execute`] never fails: transport problems, HTTP errors, and
//! error payloads are all folded into a [`ResponseOutcome`] and logged once
//! at the point of failure. Mutating requests are never retried here, and
//! redirects are reported rather than followed.

mod batch;
mod error;
mod outcome;
mod request;

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::redirect::Policy;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::Backend;
use crate::config::OpsConfig;

pub use batch::{BATCH_ERRORS_FIELD, BatchResult, partition};
pub use error::{ApiError, CallError};
pub use outcome::{ERROR_CODE_FIELD, ResponseOutcome, classify, decode_body};
pub use request::{Method, RequestSpec};

const APPLICATION_JSON: &str = "application/json";

/// Service-account pair sent as HTTP Basic credentials.
#[derive(Clone, Eq, PartialEq)]
pub struct ServiceAccount {
    user: String,
    password: String,
}

impl ServiceAccount {
    /// Creates a service-account pair.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Account user name.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Executes authenticated JSON requests against the backend gateway.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    account: ServiceAccount,
}

impl ApiClient {
    /// Builds a client for `base_url` with a bounded per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] when the HTTP client cannot be created.
    pub fn new(
        base_url: impl Into<String>,
        account: ServiceAccount,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .default_headers(headers)
            .build()
            .map_err(|err| ApiError::Client(err.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            account,
        })
    }

    /// Builds a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Client`] when the HTTP client cannot be created.
    pub fn from_config(config: &OpsConfig) -> Result<Self, ApiError> {
        Self::new(
            config.api_base_url.as_str(),
            ServiceAccount::new(
                config.service_user.as_str(),
                config.service_password.as_str(),
            ),
            config.request_timeout(),
        )
    }

    /// Full URL for a request.
    #[must_use]
    pub fn url_for(&self, request: &RequestSpec) -> String {
        format!("{}/{}", self.base_url, request.path())
    }

    /// Sends one request and classifies the reply.
    pub async fn execute(&self, request: &RequestSpec) -> ResponseOutcome {
        let url = self.url_for(request);
        let endpoint = request.path();
        debug!(method = %request.method(), endpoint = %endpoint, "sending backend request");

        let mut builder = self
            .http
            .request(request.method().into(), &url)
            .basic_auth(&self.account.user, Some(&self.account.password));
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => return transport_failure(&endpoint, &err),
        };
        let status = response.status().as_u16();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(err) => return transport_failure(&endpoint, &err),
        };

        classify(status, decode_body(&bytes), &endpoint)
    }

    /// Issues a `GET`.
    pub async fn get(&self, backend: Backend, endpoint: impl Into<String>) -> ResponseOutcome {
        self.execute(&RequestSpec::get(backend, endpoint)).await
    }

    /// Issues a `POST` with a JSON body.
    pub async fn post(
        &self,
        backend: Backend,
        endpoint: impl Into<String>,
        body: Value,
    ) -> ResponseOutcome {
        self.execute(&RequestSpec::new(backend, Method::Post, endpoint).with_body(body))
            .await
    }

    /// Issues a `PUT` with a JSON body.
    pub async fn put(
        &self,
        backend: Backend,
        endpoint: impl Into<String>,
        body: Value,
    ) -> ResponseOutcome {
        self.execute(&RequestSpec::new(backend, Method::Put, endpoint).with_body(body))
            .await
    }

    /// Issues a `DELETE`.
    pub async fn delete(&self, backend: Backend, endpoint: impl Into<String>) -> ResponseOutcome {
        self.execute(&RequestSpec::new(backend, Method::Delete, endpoint))
            .await
    }
}

fn transport_failure(endpoint: &str, err: &reqwest::Error) -> ResponseOutcome {
    warn!(endpoint, error = %err, "backend unreachable");
    ResponseOutcome::TransportFailure {
        message: err.to_string(),
    }
}
