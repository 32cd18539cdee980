//! Cronyx command-line client.
//!
//! Provides the `cronyx` binary for running shell jobs under a cronyx lock and
//! for operating on locks by hand. Every subcommand goes through the same
//! `CronyxClient` that embedding applications use.

mod error;
#[cfg(test)]
mod testing;

use std::cell::Cell;
use std::io::{self, Write};
use std::process;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cronyx_client::config::{PASSWORD_ENV, URL_ENV, USERNAME_ENV};
use cronyx_client::{ClientConfig, ConfigError, CronyxClient, Job, ReleaseKind, RequestJobOptions};
use cronyx_core::{DurationSpec, JobInterval};

use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "cronyx_cli=info,cronyx_client=info";

/// Run jobs under a cronyx lock.
#[derive(Parser)]
#[command(name = "cronyx", about = "Run jobs under a cronyx lock")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a command if this interval is ours, then finish or interrupt.
    Exec {
        #[command(flatten)]
        server: ServerArgs,

        #[command(flatten)]
        job: JobArgs,

        /// Command to run, after `--`.
        #[arg(last = true, required = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// Acquire a lock and print the grant as JSON (`null` if not eligible).
    Start {
        #[command(flatten)]
        server: ServerArgs,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Mark a held lock as finished.
    Finish(ReleaseArgs),

    /// Give back a held lock so the interval can be retried.
    Interrupt(ReleaseArgs),
}

/// Lock server connection.
#[derive(Args, Debug)]
struct ServerArgs {
    /// Base URL of the lock server.
    #[arg(long, env = "CRONYX_URL")]
    url: Option<String>,

    /// Basic-auth username.
    #[arg(long, env = "CRONYX_USERNAME")]
    username: Option<String>,

    /// Basic-auth password.
    #[arg(long, env = "CRONYX_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl ServerArgs {
    fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::from_lookup(|key| match key {
            URL_ENV => self.url.clone(),
            USERNAME_ENV => self.username.clone(),
            PASSWORD_ENV => self.password.clone(),
            _ => None,
        })
    }

    fn client(&self) -> Result<CronyxClient, CliError> {
        Ok(CronyxClient::new(self.client_config()?)?)
    }
}

/// What to lock and how.
#[derive(Args, Debug)]
struct JobArgs {
    /// Job name.
    #[arg(long = "job", value_name = "NAME")]
    name: String,

    /// Interval: milliseconds, a cron or duration expression, or a JSON
    /// calendar duration such as `{"days":1}`.
    #[arg(long)]
    interval: JobInterval,

    /// IANA timezone for calendar intervals.
    #[arg(long)]
    timezone: Option<String>,

    /// Job that must have finished this interval first. Repeatable.
    #[arg(long = "requires", value_name = "JOB")]
    requires: Vec<String>,

    /// How long before the interval start the job may begin.
    #[arg(long)]
    start_buffer: Option<DurationSpec>,

    /// How long after an interrupt before the interval may be retried.
    #[arg(long)]
    retry_interval: Option<DurationSpec>,

    /// Ask for an advisory grant without taking the lock.
    #[arg(long)]
    no_lock: bool,

    /// Interval start to use instead of the server's clock.
    #[arg(long, value_name = "RFC3339")]
    interval_started_at: Option<DateTime<Utc>>,
}

impl JobArgs {
    fn to_options(&self) -> RequestJobOptions {
        let mut options = RequestJobOptions::new(self.name.clone(), self.interval.clone());
        if let Some(timezone) = &self.timezone {
            options = options.timezone(timezone.clone());
        }
        if !self.requires.is_empty() {
            options = options.required_job_names(self.requires.iter().cloned());
        }
        if let Some(buffer) = self.start_buffer {
            options = options.start_buffer(buffer);
        }
        if let Some(retry) = self.retry_interval {
            options = options.retry_interval(retry);
        }
        if self.no_lock {
            options = options.no_lock(true);
        }
        if let Some(started_at) = self.interval_started_at {
            options = options.job_interval_started_at(started_at);
        }
        options
    }
}

/// A lock to release by id.
#[derive(Args, Debug)]
struct ReleaseArgs {
    #[command(flatten)]
    server: ServerArgs,

    /// Job name.
    #[arg(long = "job", value_name = "NAME")]
    job_name: String,

    /// Lock id from the grant.
    #[arg(long)]
    lock_id: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let exit_code = match run(cli.command).await {
        Ok(()) => 0,
        Err(err) => {
            report(&err);
            err.exit_code()
        }
    };
    process::exit(exit_code);
}

async fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Exec {
            server,
            job,
            command,
        } => run_exec(&server, &job, &command).await,
        Commands::Start { server, job } => run_start(&server, &job, &mut io::stdout()).await,
        Commands::Finish(args) => run_release(&args, ReleaseKind::Finish).await,
        Commands::Interrupt(args) => run_release(&args, ReleaseKind::Interrupt).await,
    }
}

/// Execute the exec subcommand.
async fn run_exec(server: &ServerArgs, job: &JobArgs, command: &[String]) -> Result<(), CliError> {
    let client = server.client()?;
    let ran = Cell::new(false);

    client
        .request_job_exec(job.to_options(), |handle| {
            ran.set(true);
            run_command(handle, command)
        })
        .await?;

    if !ran.get() {
        tracing::info!(job = %job.name, "job is not eligible to run now; skipping");
    }
    Ok(())
}

/// Runs the child with the grant exposed through `CRONYX_*` variables.
async fn run_command(job: Arc<Job>, command: &[String]) -> Result<(), CliError> {
    let command_line = command.join(" ");
    let Some((program, args)) = command.split_first() else {
        return Err(CliError::Spawn {
            command: command_line,
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        });
    };

    let grant = job.grant()?;
    let mut child = tokio::process::Command::new(program);
    child
        .args(args)
        .env("CRONYX_JOB_NAME", job.job_name())
        .env("CRONYX_INTERVAL_STARTED_AT", grant.interval_started_at.to_rfc3339())
        .env("CRONYX_INTERVAL_ENDED_AT", grant.interval_ended_at.to_rfc3339());
    if let Some(id) = &grant.id {
        child.env("CRONYX_LOCK_ID", id);
    }

    tracing::info!(
        job = %job.job_name(),
        lock_id = grant.id.as_deref().unwrap_or("<advisory>"),
        command = %command_line,
        "running job"
    );

    let status = child.status().await.map_err(|source| CliError::Spawn {
        command: command_line.clone(),
        source,
    })?;

    if status.success() {
        tracing::info!(job = %job.job_name(), "job succeeded");
        Ok(())
    } else {
        Err(CliError::Command {
            command: command_line,
            status,
        })
    }
}

/// Execute the start subcommand, writing the grant (or `null`) to `out`.
async fn run_start(
    server: &ServerArgs,
    job: &JobArgs,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let client = server.client()?;
    let grant = match client.request_job_start(job.to_options()).await? {
        Some(handle) => Some(handle.grant()?),
        None => None,
    };
    let json = serde_json::to_string_pretty(&grant)?;
    writeln!(out, "{}", json).map_err(CliError::Output)?;
    Ok(())
}

/// Execute the finish and interrupt subcommands.
async fn run_release(args: &ReleaseArgs, kind: ReleaseKind) -> Result<(), CliError> {
    let client = args.server.client()?;
    client
        .release_lock(&args.job_name, &args.lock_id, kind)
        .await
        .map_err(|source| CliError::Release {
            job_name: args.job_name.clone(),
            kind,
            source,
        })?;
    tracing::info!(job = %args.job_name, lock_id = %args.lock_id, %kind, "lock released");
    Ok(())
}

fn report(err: &CliError) {
    eprintln!("Error: {}", err);
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = std::error::Error::source(cause);
    }
}
