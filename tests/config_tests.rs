//! Unit tests for configuration loading and validation.

use std::time::Duration;

use rstest::*;
use siteops::config::{ConfigError, DEFAULT_SSH_HOST};
use siteops::test_support::EnvGuard;
use siteops::OpsConfig;
use tempfile::TempDir;

#[fixture]
fn valid_config() -> OpsConfig {
    OpsConfig {
        api_base_url: String::from("https://api.siteops.test"),
        service_user: String::from("svc"),
        service_password: String::from("pw"),
        request_timeout_secs: 30,
        ssh_host: String::from(DEFAULT_SSH_HOST),
        ssh_port: 2222,
        default_poll_delay_secs: 10,
        deployment_poll_delay_secs: 3,
        ssh_poll_delay_secs: 5,
        poll_max_attempts: None,
        poll_max_fetch_failures: None,
        ssh_max_attempts: None,
    }
}

#[rstest]
fn valid_config_passes_validation(valid_config: OpsConfig) {
    assert_eq!(valid_config.validate(), Ok(()));
}

/// Verifies that validation produces actionable errors mentioning both the
/// environment variable and configuration file for each required field.
#[rstest]
#[case::base_url(|cfg: &mut OpsConfig| cfg.api_base_url.clear(), "SITEOPS_API_BASE_URL", "api_base_url")]
#[case::user(|cfg: &mut OpsConfig| cfg.service_user.clear(), "SITEOPS_SERVICE_USER", "service_user")]
#[case::password(|cfg: &mut OpsConfig| cfg.service_password = String::from("  "), "SITEOPS_SERVICE_PASSWORD", "service_password")]
#[case::ssh_host(|cfg: &mut OpsConfig| cfg.ssh_host.clear(), "SITEOPS_SSH_HOST", "ssh_host")]
fn validation_errors_are_actionable(
    mut valid_config: OpsConfig,
    #[case] mutate: fn(&mut OpsConfig),
    #[case] env_var: &str,
    #[case] toml_key: &str,
) {
    mutate(&mut valid_config);

    let error = valid_config
        .validate()
        .expect_err("validation should fail");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error, got {error:?}");
    };
    assert!(
        message.contains(env_var),
        "error should mention env var {env_var}: {message}"
    );
    assert!(
        message.contains("siteops.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains(toml_key),
        "error should mention TOML key {toml_key}: {message}"
    );
}

#[rstest]
#[case::timeout(|cfg: &mut OpsConfig| cfg.request_timeout_secs = 0, "request_timeout_secs")]
#[case::port(|cfg: &mut OpsConfig| cfg.ssh_port = 0, "ssh_port")]
#[case::poll_attempts(|cfg: &mut OpsConfig| cfg.poll_max_attempts = Some(0), "poll_max_attempts")]
#[case::fetch_failures(|cfg: &mut OpsConfig| cfg.poll_max_fetch_failures = Some(0), "poll_max_fetch_failures")]
#[case::ssh_attempts(|cfg: &mut OpsConfig| cfg.ssh_max_attempts = Some(0), "ssh_max_attempts")]
fn zero_numeric_settings_are_invalid(
    mut valid_config: OpsConfig,
    #[case] mutate: fn(&mut OpsConfig),
    #[case] field: &str,
) {
    mutate(&mut valid_config);

    let error = valid_config
        .validate()
        .expect_err("validation should fail");
    assert!(
        matches!(error, ConfigError::Invalid(ref message) if message.contains(field)),
        "unexpected error: {error:?}"
    );
}

#[rstest]
fn positive_poll_ceilings_are_accepted(valid_config: OpsConfig) {
    let cfg = OpsConfig {
        poll_max_attempts: Some(1),
        poll_max_fetch_failures: Some(1),
        ssh_max_attempts: Some(1),
        ..valid_config
    };

    assert_eq!(cfg.validate(), Ok(()));
}

#[rstest]
fn poll_settings_follow_configuration(valid_config: OpsConfig) {
    let cfg = OpsConfig {
        poll_max_attempts: Some(20),
        ssh_max_attempts: Some(6),
        ..valid_config
    };

    assert_eq!(cfg.default_poll().delay(), Duration::from_secs(10));
    assert_eq!(cfg.default_poll().max_attempts(), Some(20));
    assert_eq!(cfg.deployment_poll().delay(), Duration::from_secs(3));
    assert_eq!(cfg.ssh_poll().delay(), Duration::from_secs(5));
    assert_eq!(cfg.ssh_poll().max_attempts(), Some(6));
    assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
}

#[tokio::test(flavor = "current_thread")]
async fn environment_overrides_defaults() {
    let _guard = EnvGuard::set_vars(&[
        ("SITEOPS_API_BASE_URL", "https://env.siteops.test"),
        ("SITEOPS_SERVICE_USER", "env-user"),
        ("SITEOPS_SERVICE_PASSWORD", "env-pw"),
        ("SITEOPS_SSH_PORT", "2022"),
        ("SITEOPS_POLL_MAX_ATTEMPTS", "4"),
    ])
    .await;

    let cfg = OpsConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config should load: {err}"));

    assert_eq!(cfg.api_base_url, "https://env.siteops.test");
    assert_eq!(cfg.service_user, "env-user");
    assert_eq!(cfg.ssh_port, 2022);
    assert_eq!(cfg.poll_max_attempts, Some(4));
    assert_eq!(cfg.ssh_host, DEFAULT_SSH_HOST);
    assert_eq!(cfg.deployment_poll_delay_secs, 3);
    assert_eq!(cfg.validate(), Ok(()));
}

#[tokio::test(flavor = "current_thread")]
async fn configuration_file_is_read_from_explicit_path() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = tmp.path().join("siteops.toml");
    std::fs::write(
        &path,
        concat!(
            "api_base_url = \"https://file.siteops.test\"\n",
            "service_user = \"file-user\"\n",
            "service_password = \"file-pw\"\n",
            "ssh_poll_delay_secs = 1\n",
        ),
    )
    .unwrap_or_else(|err| panic!("write config: {err}"));
    let path_str = path
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8: {}", path.display()))
        .to_owned();
    let _guard = EnvGuard::set_vars(&[("SITEOPS_CONFIG_PATH", path_str.as_str())]).await;

    let cfg = OpsConfig::load_without_cli_args()
        .unwrap_or_else(|err| panic!("config should load: {err}"));

    assert_eq!(cfg.api_base_url, "https://file.siteops.test");
    assert_eq!(cfg.ssh_poll().delay(), Duration::from_secs(1));
    assert_eq!(cfg.request_timeout_secs, 30);
}

#[tokio::test(flavor = "current_thread")]
async fn absent_credentials_are_rejected() {
    let _guard = EnvGuard::remove_vars(&[
        "SITEOPS_CONFIG_PATH",
        "SITEOPS_API_BASE_URL",
        "SITEOPS_SERVICE_USER",
        "SITEOPS_SERVICE_PASSWORD",
    ])
    .await;

    let result = OpsConfig::load_without_cli_args().and_then(|cfg| cfg.validate());

    assert!(result.is_err(), "loading without credentials should fail");
}
