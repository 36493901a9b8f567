//! Classification of backend responses into tagged outcomes.

use serde_json::Value;
use tracing::warn;

use super::CallError;
use super::batch::{BatchResult, partition};

/// Field whose presence in a 2xx body marks an application-level error.
pub const ERROR_CODE_FIELD: &str = "error_code";

/// Result of one backend call. Exactly one variant holds per call.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseOutcome {
    /// 2xx with a body; the decoded payload is passed through unchanged.
    Success(Value),
    /// 2xx with an empty or null body.
    EmptySuccess,
    /// The host could not be reached or the response could not be read.
    TransportFailure {
        /// Description of the transport error.
        message: String,
    },
    /// Non-2xx status.
    HttpError(u16),
    /// 2xx whose body carries an error code.
    ApiError {
        /// Backend-specific error code.
        code: String,
        /// Accompanying message, empty when the backend sent none.
        message: String,
    },
}

impl ResponseOutcome {
    /// Returns `true` for [`Self::Success`] and [`Self::EmptySuccess`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_) | Self::EmptySuccess)
    }

    /// Borrows the payload of a [`Self::Success`].
    #[must_use]
    pub const fn payload(&self) -> Option<&Value> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }

    /// Converts the outcome into a `Result` so callers can use `?`.
    ///
    /// # Errors
    ///
    /// Returns the matching [`CallError`] for every failure variant.
    pub fn into_result(self) -> Result<Option<Value>, CallError> {
        match self {
            Self::Success(value) => Ok(Some(value)),
            Self::EmptySuccess => Ok(None),
            Self::TransportFailure { message } => Err(CallError::Transport { message }),
            Self::HttpError(status) => Err(CallError::Http { status }),
            Self::ApiError { code, message } => Err(CallError::Api { code, message }),
        }
    }

    /// Partitions a successful multi-resource payload.
    ///
    /// Returns `None` for any outcome other than a [`Self::Success`] whose
    /// payload is a JSON object.
    #[must_use]
    pub fn into_batch(self) -> Option<BatchResult> {
        match self {
            Self::Success(Value::Object(map)) => Some(partition(map)),
            _ => None,
        }
    }
}

/// Classifies a raw HTTP status and decoded body for `endpoint`.
///
/// HTTP-level errors take precedence over body inspection; one warning is
/// logged for each error outcome.
#[must_use]
pub fn classify(status: u16, body: Value, endpoint: &str) -> ResponseOutcome {
    if !(200..300).contains(&status) {
        warn!(status, endpoint, "backend returned HTTP error");
        return ResponseOutcome::HttpError(status);
    }

    if let Some(raw_code) = body.get(ERROR_CODE_FIELD) {
        let code = render_scalar(raw_code);
        let message = body
            .get("error_message")
            .or_else(|| body.get("message"))
            .map(render_scalar)
            .unwrap_or_default();
        warn!(code = %code, endpoint, "backend returned API error");
        return ResponseOutcome::ApiError { code, message };
    }

    if is_empty(&body) {
        return ResponseOutcome::EmptySuccess;
    }

    ResponseOutcome::Success(body)
}

/// Decodes a response body: JSON when possible, the raw text as a JSON
/// string otherwise, null when empty.
#[must_use]
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn is_empty(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        _ => false,
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
