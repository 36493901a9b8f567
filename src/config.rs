//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::poll::PollSpec;

/// Default SSH endpoint of the hosting platform.
pub const DEFAULT_SSH_HOST: &str = "ssh.hosting.siteops.dev";

/// Orchestrator settings derived from environment variables and
/// configuration files.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "SITEOPS",
    discovery(
        app_name = "siteops",
        env_var = "SITEOPS_CONFIG_PATH",
        config_file_name = "siteops.toml",
        dotfile_name = ".siteops.toml",
        project_file_name = "siteops.toml"
    )
)]
pub struct OpsConfig {
    /// Gateway URL under which every backend is mounted.
    pub api_base_url: String,
    /// Service-account user for HTTP Basic authentication.
    pub service_user: String,
    /// Service-account password for HTTP Basic authentication.
    pub service_password: String,
    /// Upper bound for a single HTTP request.
    #[ortho_config(default = 30)]
    pub request_timeout_secs: u64,
    /// SSH host of the hosting platform.
    #[ortho_config(default = DEFAULT_SSH_HOST.to_owned())]
    pub ssh_host: String,
    /// SSH port of the hosting platform.
    #[ortho_config(default = 2222)]
    pub ssh_port: u16,
    /// Delay between state checks when no operation-specific delay applies.
    #[ortho_config(default = 10)]
    pub default_poll_delay_secs: u64,
    /// Delay between checks of an in-progress deployment run.
    #[ortho_config(default = 3)]
    pub deployment_poll_delay_secs: u64,
    /// Delay between SSH readiness attempts.
    #[ortho_config(default = 5)]
    pub ssh_poll_delay_secs: u64,
    /// Optional ceiling on state checks; unset polls until done.
    pub poll_max_attempts: Option<u32>,
    /// Optional ceiling on consecutive failed fetches while polling.
    pub poll_max_fetch_failures: Option<u32>,
    /// Optional ceiling on SSH readiness attempts.
    pub ssh_max_attempts: Option<u32>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl OpsConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to siteops.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("siteops")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty
    /// and [`ConfigError::Invalid`] when a numeric setting or poll ceiling
    /// is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.api_base_url,
            &FieldMetadata::new("API base URL", "SITEOPS_API_BASE_URL", "api_base_url"),
        )?;
        Self::require_field(
            &self.service_user,
            &FieldMetadata::new(
                "service-account user",
                "SITEOPS_SERVICE_USER",
                "service_user",
            ),
        )?;
        Self::require_field(
            &self.service_password,
            &FieldMetadata::new(
                "service-account password",
                "SITEOPS_SERVICE_PASSWORD",
                "service_password",
            ),
        )?;
        Self::require_field(
            &self.ssh_host,
            &FieldMetadata::new("SSH host", "SITEOPS_SSH_HOST", "ssh_host"),
        )?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(String::from(
                "request_timeout_secs must be greater than zero",
            )));
        }
        if self.ssh_port == 0 {
            return Err(ConfigError::Invalid(String::from(
                "ssh_port must be greater than zero",
            )));
        }
        Self::require_positive_ceiling(self.poll_max_attempts, "poll_max_attempts")?;
        Self::require_positive_ceiling(self.poll_max_fetch_failures, "poll_max_fetch_failures")?;
        Self::require_positive_ceiling(self.ssh_max_attempts, "ssh_max_attempts")?;
        Ok(())
    }

    fn require_positive_ceiling(limit: Option<u32>, toml_key: &str) -> Result<(), ConfigError> {
        if limit == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "{toml_key} must be greater than zero; leave it unset for no limit"
            )));
        }
        Ok(())
    }

    /// Timeout applied to every backend request.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Poll settings for generic state transitions (site provisioning).
    #[must_use]
    pub const fn default_poll(&self) -> PollSpec {
        PollSpec::new(Duration::from_secs(self.default_poll_delay_secs))
            .with_max_attempts(self.poll_max_attempts)
            .with_max_consecutive_failures(self.poll_max_fetch_failures)
    }

    /// Poll settings for in-progress deployment runs.
    #[must_use]
    pub const fn deployment_poll(&self) -> PollSpec {
        PollSpec::new(Duration::from_secs(self.deployment_poll_delay_secs))
            .with_max_attempts(self.poll_max_attempts)
            .with_max_consecutive_failures(self.poll_max_fetch_failures)
    }

    /// Poll settings for SSH readiness.
    #[must_use]
    pub const fn ssh_poll(&self) -> PollSpec {
        PollSpec::new(Duration::from_secs(self.ssh_poll_delay_secs))
            .with_max_attempts(self.ssh_max_attempts)
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates a configuration value is present but unusable.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
