//! Binary entry point for the siteops CLI.

use std::io::{self, IsTerminal, Write};
use std::process;

use clap::Parser;
use indicatif::ProgressBar;
use serde::Serialize;
use shell_escape::unix::escape;
use thiserror::Error;
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use siteops::poll::{hidden, spinner};
use siteops::session::Connector;
use siteops::{
    ConfigError, OpsConfig, OpsContext, OpsError, Orchestrator, ProjectId, ResourceId, RunId,
    RusshConnector,
};

mod cli;

use cli::{BatchArgs, Cli, CreateProjectArgs, DeployArgs, SiteArgs, SshArgs};

/// Environment variable holding the log filter directive.
const LOG_ENV: &str = "SITEOPS_LOG";
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ops(#[from] OpsError),
    #[error("invalid command argument: {0}")]
    InvalidCommand(String),
    #[error("remote command terminated without an exit status")]
    MissingExitCode,
    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();
    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    if let Cli::Ssh(args) = &cli {
        validate_command_args(&args.command)?;
    }
    let orchestrator = load_orchestrator()?;
    let mut ctx = OpsContext::new();
    let span = ctx.span().clone();
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr();
    dispatch(cli, &orchestrator, &mut ctx, &mut stdout, &mut stderr)
        .instrument(span)
        .await
}

fn load_orchestrator() -> Result<Orchestrator<RusshConnector>, CliError> {
    let config = OpsConfig::load_without_cli_args()?;
    Ok(Orchestrator::from_config(&config)?)
}

async fn dispatch<K: Connector>(
    cli: Cli,
    orchestrator: &Orchestrator<K>,
    ctx: &mut OpsContext,
    out: &mut impl Write,
    notices: &mut impl Write,
) -> Result<i32, CliError> {
    match cli {
        Cli::SiteStatus(args) => site_status(orchestrator, args, out).await,
        Cli::WaitSite(args) => wait_site(orchestrator, ctx, args, out, notices).await,
        Cli::WaitDeploy(args) => wait_deploy(orchestrator, ctx, args, out, notices).await,
        Cli::BatchInfo(args) => batch_info(orchestrator, args, out).await,
        Cli::Ssh(args) => ssh(orchestrator, ctx, args, out, notices).await,
        Cli::CreateProject(args) => create_project(orchestrator, ctx, args, out, notices).await,
    }
}

async fn site_status<K: Connector>(
    orchestrator: &Orchestrator<K>,
    args: SiteArgs,
    out: &mut impl Write,
) -> Result<i32, CliError> {
    let status = orchestrator
        .site_state(&ResourceId::from(args.site))
        .await?;
    write_json(out, &status)?;
    Ok(0)
}

async fn wait_site<K: Connector>(
    orchestrator: &Orchestrator<K>,
    ctx: &mut OpsContext,
    args: SiteArgs,
    out: &mut impl Write,
    notices: &mut impl Write,
) -> Result<i32, CliError> {
    let site = ResourceId::from(args.site);
    let mut progress = progress_for(&format!("waiting for site {site}"));
    let waited = orchestrator.wait_for_site(ctx, &site, &mut progress).await;
    progress.finish_and_clear();
    let status = waited?;
    announce(ctx, notices)?;
    write_json(out, &status)?;
    Ok(0)
}

async fn wait_deploy<K: Connector>(
    orchestrator: &Orchestrator<K>,
    ctx: &mut OpsContext,
    args: DeployArgs,
    out: &mut impl Write,
    notices: &mut impl Write,
) -> Result<i32, CliError> {
    let project = ProjectId::from(args.project);
    let run = RunId::from(args.run);
    let mut progress = progress_for(&format!("waiting for deployment {project}/{run}"));
    let waited = orchestrator
        .wait_for_deployment(ctx, &project, &run, &mut progress)
        .await;
    progress.finish_and_clear();
    let finished = waited?;
    announce(ctx, notices)?;
    write_json(out, &finished)?;
    Ok(i32::from(!finished.is_success()))
}

async fn batch_info<K: Connector>(
    orchestrator: &Orchestrator<K>,
    args: BatchArgs,
    out: &mut impl Write,
) -> Result<i32, CliError> {
    let sites: Vec<ResourceId> = args.sites.into_iter().map(ResourceId::from).collect();
    let batch = orchestrator.batch_site_info(&sites).await?;
    write_json(out, &batch)?;
    Ok(i32::from(batch.has_errors()))
}

async fn ssh<K: Connector>(
    orchestrator: &Orchestrator<K>,
    ctx: &mut OpsContext,
    args: SshArgs,
    out: &mut impl Write,
    notices: &mut impl Write,
) -> Result<i32, CliError> {
    let remote_command = render_remote_command(&args.command);
    let site = ResourceId::from(args.site);
    let mut progress = progress_for(&format!("waiting for the shell of site {site}"));
    let ran = orchestrator
        .run_remote(ctx, &site, &remote_command, &mut progress)
        .await;
    progress.finish_and_clear();
    let output = ran?;
    out.write_all(output.stdout.as_bytes())?;
    notices.write_all(output.stderr.as_bytes())?;
    output.exit_code.ok_or(CliError::MissingExitCode)
}

async fn create_project<K: Connector>(
    orchestrator: &Orchestrator<K>,
    ctx: &mut OpsContext,
    args: CreateProjectArgs,
    out: &mut impl Write,
    notices: &mut impl Write,
) -> Result<i32, CliError> {
    let project = orchestrator.create_project(ctx, &args.name).await?;
    announce(ctx, notices)?;
    write_json(out, &project)?;
    Ok(0)
}

fn progress_for(message: &str) -> ProgressBar {
    if io::stderr().is_terminal() {
        spinner(message)
    } else {
        hidden()
    }
}

fn announce(ctx: &mut OpsContext, notices: &mut impl Write) -> Result<(), CliError> {
    for event in ctx.drain() {
        writeln!(notices, "{event}")?;
    }
    Ok(())
}

fn write_json<T: Serialize + ?Sized>(out: &mut impl Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn render_remote_command(args: &[String]) -> String {
    args.iter()
        .map(|arg| escape(arg.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_command_args(args: &[String]) -> Result<(), CliError> {
    for arg in args {
        if arg
            .chars()
            .any(|ch| matches!(ch, '\n' | '\r' | '\u{0000}'..='\u{001F}' | '\u{007F}'))
        {
            return Err(CliError::InvalidCommand(String::from(concat!(
                "command arguments must not contain control characters (ASCII ",
                "0x00-0x1F or 0x7F, e.g. newline, carriage return, tab, NUL)"
            ))));
        }
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
