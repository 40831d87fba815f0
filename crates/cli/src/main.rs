//! Ticketforge CLI entry point.
//!
//! This binary is the composition root for the whole system:
//!
//! 1. **Load configuration**: `.env`, then flags and environment variables
//!    (see [`config`]).
//! 2. **Wire observability**: `tracing-subscriber` with an `EnvFilter`, human
//!    or JSON output, and an OpenTelemetry OTLP exporter when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Construct infrastructure**: `JiraClient` and `GeminiProvider`, injected
//!    into the `materializer` services as trait objects.
//! 4. **Run one command** and print its result as JSON on stdout.
//!
//! Exit status is `0` when every issue was created, `1` when the report is
//! partial or the tracker is not configured, and `2` when the request failed
//! as a whole (configuration, model or parse error).

mod config;
mod input;
mod telemetry;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use materializer::{TicketReport, TicketService};
use pipeline::{extract_document, CreationStatus, PipelineError};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{ModelArgs, TrackerArgs};
use crate::telemetry::LogFormat;

#[derive(Debug, Parser)]
#[command(name = "ticketforge")]
#[command(about = "Turn requirements documents into Jira epics, stories and subtasks")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// OTLP gRPC endpoint for trace export.
    #[arg(long, global = true, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyse requirements with the model and print the extracted hierarchy
    Analyze {
        /// Requirement text files (.txt, .md) and architecture images
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Prompt used instead of the default for this request
        #[arg(long)]
        prompt: Option<String>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Analyse requirements and create the resulting issues
    Create {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(long)]
        prompt: Option<String>,

        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Create issues from a previously generated JSON document
    CreateFromJson {
        file: PathBuf,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Print the tracker schema discovered for the project
    Discover {
        #[command(flatten)]
        tracker: TrackerArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _telemetry = telemetry::init(cli.log_format, cli.otlp_endpoint.as_deref())?;

    let outcome = match cli.command {
        Command::Analyze {
            files,
            prompt,
            model,
        } => analyze(&files, prompt.as_deref(), &model).await,
        Command::Create {
            files,
            prompt,
            model,
            tracker,
        } => create(&files, prompt.as_deref(), &model, &tracker).await,
        Command::CreateFromJson { file, tracker } => create_from_json(&file, &tracker).await,
        Command::Discover { tracker } => discover(&tracker).await,
    };

    match outcome {
        Ok(code) => Ok(code),
        Err(error) => match error.downcast_ref::<PipelineError>() {
            Some(pipeline_error) => {
                error!(error = %pipeline_error, "request failed");
                print_json(&ErrorOutput {
                    error: pipeline_error.to_string(),
                })?;
                Ok(ExitCode::from(2))
            }
            None => Err(error),
        },
    }
}

#[derive(Debug, Serialize)]
struct ErrorOutput {
    error: String,
}

async fn analyze(
    files: &[PathBuf],
    prompt: Option<&str>,
    model: &ModelArgs,
) -> anyhow::Result<ExitCode> {
    let requirements = input::load_requirements(files)?;
    let analyzer = model.analyzer()?;
    let analysis = analyzer.analyze(&requirements, prompt).await?;
    print_json(&analysis)?;
    Ok(ExitCode::SUCCESS)
}

async fn create(
    files: &[PathBuf],
    prompt: Option<&str>,
    model: &ModelArgs,
    tracker: &TrackerArgs,
) -> anyhow::Result<ExitCode> {
    let service = TicketService::from_configuration(tracker.session());
    if let Some(reason) = service.configuration_error() {
        warn!(%reason, "tracker not configured; skipping analysis");
        return report(&TicketReport::not_configured(reason));
    }

    let requirements = input::load_requirements(files)?;
    let analyzer = model.analyzer()?;
    let cancel = cancel_on_ctrl_c();
    let ticket_report = service
        .create_from_requirements(&analyzer, &requirements, prompt, &cancel)
        .await?;
    report(&ticket_report)
}

async fn create_from_json(file: &Path, tracker: &TrackerArgs) -> anyhow::Result<ExitCode> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let document = extract_document(&raw).map_err(PipelineError::from)?;
    let stats = document.stats();
    info!(
        epics = stats.epics,
        stories = stats.stories,
        subtasks = stats.subtasks,
        "loaded requirements document"
    );

    let service = TicketService::from_configuration(tracker.session());
    let cancel = cancel_on_ctrl_c();
    report(&service.create_from_document(&document, &cancel).await)
}

async fn discover(tracker: &TrackerArgs) -> anyhow::Result<ExitCode> {
    let session = tracker.session()?;
    let schema = session.schema().await;
    print_json(&schema)?;
    Ok(ExitCode::SUCCESS)
}

/// A token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling ticket creation");
            child.cancel();
        }
    });
    token
}

fn report(report: &TicketReport) -> anyhow::Result<ExitCode> {
    print_json(report)?;
    Ok(ExitCode::from(exit_status(report)))
}

fn exit_status(report: &TicketReport) -> u8 {
    match report.status {
        CreationStatus::Succeeded => 0,
        CreationStatus::PartiallySucceeded | CreationStatus::NotConfigured => 1,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}
