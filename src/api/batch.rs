//! Splitting multi-resource responses into successes and failures.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

/// Field whose presence marks a per-resource failure in a batch reply.
pub const BATCH_ERRORS_FIELD: &str = "errors";

/// Per-resource outcomes of a batch call.
///
/// Every key of the partitioned input appears in exactly one of the two
/// maps.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BatchResult {
    /// Payloads of the resources the backend resolved.
    pub results: BTreeMap<String, Value>,
    /// Error objects of the resources the backend rejected.
    pub errors: BTreeMap<String, Value>,
}

impl BatchResult {
    /// Total number of resources across both maps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len() + self.errors.len()
    }

    /// Returns `true` when the batch carried no resources.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.errors.is_empty()
    }

    /// Returns `true` when at least one resource failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Partitions an id-keyed batch reply.
///
/// A sub-response is an error when it is an object carrying an `errors`
/// field; anything else is a success.
#[must_use]
pub fn partition(batch: Map<String, Value>) -> BatchResult {
    let mut outcome = BatchResult::default();
    for (id, sub_response) in batch {
        if is_item_error(&sub_response) {
            outcome.errors.insert(id, sub_response);
        } else {
            outcome.results.insert(id, sub_response);
        }
    }
    outcome
}

fn is_item_error(sub_response: &Value) -> bool {
    sub_response
        .as_object()
        .is_some_and(|object| object.contains_key(BATCH_ERRORS_FIELD))
}
