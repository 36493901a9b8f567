//! Immutable description of a single backend call.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::ApiError;
use crate::backend::Backend;

/// HTTP methods used against the backends.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// Reads a resource.
    Get,
    /// Creates a resource.
    Post,
    /// Replaces a resource.
    Put,
    /// Removes a resource.
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(value: Method) -> Self {
        match value {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        })
    }
}

/// A backend request: target, method, extra headers, and optional JSON body.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    backend: Backend,
    endpoint: String,
    method: Method,
    headers: Vec<(String, String)>,
    body: Option<Value>,
}

impl RequestSpec {
    /// Starts a request without a body.
    #[must_use]
    pub fn new(backend: Backend, method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            backend,
            endpoint: endpoint.into(),
            method,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    #[must_use]
    pub fn get(backend: Backend, endpoint: impl Into<String>) -> Self {
        Self::new(backend, Method::Get, endpoint)
    }

    /// Attaches a JSON body, serialising it eagerly.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Serialization`] when `body` cannot be encoded.
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body).map_err(|err| ApiError::Serialization {
            endpoint: self.endpoint.clone(),
            message: err.to_string(),
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Attaches an already encoded JSON body.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Appends an extra header sent alongside the defaults.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Target backend.
    #[must_use]
    pub const fn backend(&self) -> Backend {
        self.backend
    }

    /// Endpoint path relative to `<backend>/v1/`.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Extra headers in insertion order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// JSON body, when one was attached.
    #[must_use]
    pub const fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Path used in log lines and URLs: `<backend>/v1/<endpoint>`.
    #[must_use]
    pub fn path(&self) -> String {
        format!(
            "{}/v1/{}",
            self.backend.segment(),
            self.endpoint.trim_start_matches('/')
        )
    }
}
