//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use tempfile::TempDir;

#[test]
fn cli_without_arguments_prints_usage() {
    let mut cmd = cargo_bin_cmd!("siteops");
    cmd.assert()
        .failure()
        .stdout("")
        .stderr(contains("Usage: siteops"));
}

#[test]
fn help_lists_every_subcommand() {
    let mut cmd = cargo_bin_cmd!("siteops");
    let outcome = cmd.arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&outcome.get_output().stdout).into_owned();
    for name in [
        "site-status",
        "wait-site",
        "wait-deploy",
        "batch-info",
        "ssh",
        "create-project",
    ] {
        assert!(stdout.contains(name), "help should list {name}: {stdout}");
    }
}

#[test]
fn missing_configuration_is_reported() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let mut cmd = cargo_bin_cmd!("siteops");
    cmd.current_dir(tmp.path())
        .env("HOME", tmp.path())
        .env("XDG_CONFIG_HOME", tmp.path())
        .env_remove("SITEOPS_CONFIG_PATH")
        .env_remove("SITEOPS_API_BASE_URL")
        .env_remove("SITEOPS_SERVICE_USER")
        .env_remove("SITEOPS_SERVICE_PASSWORD")
        .args(["site-status", "7"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(contains("configuration"));
}
