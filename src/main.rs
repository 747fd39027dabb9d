use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dast_realtime::config::SubmissionConfig;
use dast_realtime::container::ActiveContainer;
use dast_realtime::reaper::Reaper;
use dast_realtime::reporter::HttpResultsClient;
use dast_realtime::runtime::{CliRuntime, ContainerRuntime};
use dast_realtime::types::{
    ScanMode, ScanRequest, DEFAULT_ENGINE, DEFAULT_TIMEOUT_SECS, DEFAULT_UPDATE_INTERVAL_SECS,
};
use dast_realtime::Scanner;

/// dast-realtime: run a containerized DAST scan and submit its results.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dast-realtime",
    version,
    about = "Run a one-shot containerized DAST scan and submit its results for scoring.",
    long_about = None
)]
struct Cli {
    /// Show engine output and debug diagnostics on stderr.
    #[arg(long, short = 'v', global = true, visible_alias = "debug")]
    verbose: bool,

    #[command(flatten)]
    submission: SubmissionConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create and run a dast Web scan using the engine image.
    #[command(alias = "dast-realtime-web")]
    Web(ScanArgs),

    /// Create and run a dast API scan using the engine image.
    #[command(alias = "dast-realtime-api")]
    Api {
        #[command(flatten)]
        scan: ScanArgs,

        /// Path to the open API specification file.
        #[arg(long = "openapi", visible_alias = "open-api")]
        openapi: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Path to the dast configuration file.
    #[arg(long)]
    file: PathBuf,

    /// Directory the report and engine log are copied to.
    #[arg(long, default_value = ".")]
    output: PathBuf,

    /// Name in $PATH of the container engine, e.g. podman.
    #[arg(long, default_value = DEFAULT_ENGINE)]
    engine: String,

    /// Scan timeout passed to the engine, in seconds.
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Progress update interval passed to the engine, in seconds.
    #[arg(long = "update-interval", default_value_t = DEFAULT_UPDATE_INTERVAL_SECS)]
    update_interval: u64,
}

impl Command {
    fn into_request(self) -> ScanRequest {
        let (mode, scan, openapi) = match self {
            Command::Web(scan) => (ScanMode::Web, scan, None),
            Command::Api { scan, openapi } => (ScanMode::Api, scan, Some(openapi)),
        };
        ScanRequest {
            mode,
            input_file: scan.file,
            openapi_file: openapi,
            output_dir: scan.output,
            engine: scan.engine,
            timeout_secs: scan.timeout,
            update_interval_secs: scan.update_interval,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String> {
    let request = cli.command.into_request();
    let runtime: Arc<dyn ContainerRuntime> = Arc::new(CliRuntime::new(request.engine.clone()));
    let active = ActiveContainer::new();

    Reaper::new(Arc::clone(&runtime), active.clone())
        .spawn()
        .context("failed to start container reaper")?;

    let submitter = Arc::new(HttpResultsClient::new(&cli.submission)?);
    let summary = Scanner::new(runtime, submitter, active)
        .verbose(cli.verbose)
        .run(&request)
        .await?;
    Ok(serde_json::to_string(&summary)?)
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "warn,dast_realtime=debug"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}
