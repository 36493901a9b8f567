//! Command-line interface definitions for the `siteops` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `siteops` binary.
#[derive(Debug, Parser)]
#[command(
    name = "siteops",
    version,
    about = "Provision sites, watch deployments, and run commands across the hosting backends",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Print a site's current detail.
    #[command(name = "site-status", about = "Print a site's current detail")]
    SiteStatus(SiteArgs),
    /// Wait until a site leaves the provisioning state.
    #[command(name = "wait-site", about = "Wait until a site leaves provisioning")]
    WaitSite(SiteArgs),
    /// Wait until a deployment run reaches a terminal status.
    #[command(
        name = "wait-deploy",
        about = "Wait until a deployment run finishes; exits non-zero unless it succeeded"
    )]
    WaitDeploy(DeployArgs),
    /// Look up several sites in one call.
    #[command(name = "batch-info", about = "Look up several sites in one call")]
    BatchInfo(BatchArgs),
    /// Wait for a site's shell and run a command on it.
    #[command(name = "ssh", about = "Wait for a site's shell and run a command on it")]
    Ssh(SshArgs),
    /// Create a code-hosting project.
    #[command(name = "create-project", about = "Create a code-hosting project")]
    CreateProject(CreateProjectArgs),
}

/// Arguments naming a single site.
#[derive(Debug, Parser)]
pub(crate) struct SiteArgs {
    /// Site identifier.
    #[arg(value_name = "SITE")]
    pub(crate) site: String,
}

/// Arguments for `siteops wait-deploy`.
#[derive(Debug, Parser)]
pub(crate) struct DeployArgs {
    /// Project owning the run.
    #[arg(value_name = "PROJECT")]
    pub(crate) project: String,
    /// Deployment run identifier.
    #[arg(value_name = "RUN")]
    pub(crate) run: String,
}

/// Arguments for `siteops batch-info`.
#[derive(Debug, Parser)]
pub(crate) struct BatchArgs {
    /// Site identifiers to look up.
    #[arg(value_name = "SITE", required = true, num_args = 1..)]
    pub(crate) sites: Vec<String>,
}

/// Arguments for `siteops ssh`.
#[derive(Debug, Parser)]
pub(crate) struct SshArgs {
    /// Site whose shell runs the command.
    #[arg(value_name = "SITE")]
    pub(crate) site: String,
    /// Command to execute on the site (use -- to separate flags).
    #[arg(required = true, trailing_var_arg = true)]
    pub(crate) command: Vec<String>,
}

/// Arguments for `siteops create-project`.
#[derive(Debug, Parser)]
pub(crate) struct CreateProjectArgs {
    /// Name of the new project.
    #[arg(value_name = "NAME")]
    pub(crate) name: String,
}
