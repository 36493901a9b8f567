//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Service-account user presented by test clients.
pub const SERVICE_USER: &str = "svc";

/// Service-account password presented by test clients.
pub const SERVICE_PASSWORD: &str = "pw";

/// `Authorization` header value for [`SERVICE_USER`] and [`SERVICE_PASSWORD`].
pub const BASIC_AUTH_HEADER: &str = "Basic c3ZjOnB3";
