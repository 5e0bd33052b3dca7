//! linewatch - production efficiency and downtime attribution
//!
//! Reads daily per-machine production rows plus free-text downtime reasons,
//! prices them against a capacity mapping, and reports availability,
//! performance, OEE and downtime by reason bucket.
//!
//! # Usage
//!
//! ```bash
//! # Serve the JSON API
//! linewatch --records data/records.json --reasons data/reasons.json serve
//!
//! # One-off reports to stdout
//! linewatch --records data/records.json summary --from 2024-03-01 --to 2024-03-31
//! linewatch --records data/records.json reasons --weekdays-only --kind prod
//!
//! # Validate a mapping file
//! linewatch check-config capacity_mapping.json
//! ```
//!
//! # Environment Variables
//!
//! - `LINEWATCH_MAPPING`: Path to the capacity mapping (JSON or TOML)
//! - `LINEWATCH_RECORDS` / `LINEWATCH_REASONS`: Paths to the row files
//! - `LINEWATCH_SERVER_ADDR`: Bind address (default: 0.0.0.0:8080)
//! - `LINEWATCH_QUALITY`: Override the OEE quality constant
//! - `LINEWATCH_LOG_FORMAT`: `json` for structured log lines
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use linewatch::api::{create_app, handlers::resolve_range, ApiState};
use linewatch::config::watcher::{run_config_watcher, ConfigEvent};
use linewatch::config::{self, defaults, CapacityMappingConfig, ConfigOrigin};
use linewatch::service::ProductionService;
use linewatch::source::JsonFileSource;
use linewatch::types::{AllocationKind, ProductionQuery};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "linewatch")]
#[command(about = "Production efficiency (OEE) and downtime-reason attribution")]
#[command(version)]
struct CliArgs {
    /// Capacity mapping file (JSON or TOML). Without it the standard search order applies.
    #[arg(long, global = true, value_name = "PATH")]
    mapping: Option<PathBuf>,

    /// JSON array of daily production rows
    #[arg(long, global = true, env = "LINEWATCH_RECORDS", value_name = "PATH")]
    records: Option<PathBuf>,

    /// JSON array of downtime reason rows
    #[arg(long, global = true, env = "LINEWATCH_REASONS", value_name = "PATH")]
    reasons: Option<PathBuf>,

    #[command(subcommand)]
    command: SubCommand,
}

/// Date-range flags shared by the report subcommands.
#[derive(clap::Args, Debug)]
struct RangeArgs {
    /// First date (YYYY-MM-DD), default 30 days before --to
    #[arg(long)]
    from: Option<String>,
    /// Last date (YYYY-MM-DD), default today
    #[arg(long)]
    to: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Run the HTTP API
    Serve {
        /// Override the server address
        #[arg(short, long, env = "LINEWATCH_SERVER_ADDR", default_value = defaults::DEFAULT_SERVER_ADDR)]
        addr: String,
        /// Do not watch the mapping file for changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Print range totals, ratios and daily aggregates
    Summary {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Print per machine-day audit records
    Diagnostics {
        #[command(flatten)]
        range: RangeArgs,
        /// Only this machine (aliases accepted)
        #[arg(long)]
        machine: Option<String>,
    },

    /// Print downtime hours per reason bucket
    Reasons {
        #[command(flatten)]
        range: RangeArgs,
        #[arg(long)]
        machine: Option<String>,
        /// Drop Saturdays and Sundays
        #[arg(long)]
        weekdays_only: bool,
        /// prod (residual production downtime) or maint (maintenance hours)
        #[arg(long, default_value = "prod")]
        kind: AllocationKind,
    },

    /// Validate a mapping file and print the resolved snapshot
    CheckConfig {
        /// File to check (defaults to the standard search order)
        path: Option<PathBuf>,
    },
}

// ============================================================================
// Supervisor
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ConfigWatcher,
    ReloadListener,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HttpServer => write!(f, "HttpServer"),
            Self::ConfigWatcher => write!(f, "ConfigWatcher"),
            Self::ReloadListener => write!(f, "ReloadListener"),
        }
    }
}

/// Monitor spawned tasks; any failure cancels the rest.
async fn run_supervisor(task_set: &mut JoinSet<Result<TaskName>>, cancel_token: CancellationToken) -> Result<()> {
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => info!(task = %task_name, "Supervisor: task completed"),
                    Some(Ok(Err(e))) => {
                        error!(error = %e, "Supervisor: task failed");
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "Supervisor: task panicked");
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {e}"));
                    }
                    None => break,
                }
            }
        }
    }

    // Let the server finish in-flight requests
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!(task = %task_name, "Supervisor: task stopped");
        }
    }
    Ok(())
}

fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel_token.cancelled().await })
            .await
            .context("HTTP server error")?;
        info!("HTTP server: graceful shutdown complete");
        Ok(TaskName::HttpServer)
    });
}

/// Watch the mapping file and drop cached results whenever it reloads.
fn spawn_config_watcher(
    task_set: &mut JoinSet<Result<TaskName>>,
    service: Arc<ProductionService>,
    path: PathBuf,
    cancel_token: CancellationToken,
) {
    let (tx, mut rx) = mpsc::channel::<ConfigEvent>(8);
    let store = Arc::clone(service.store());

    let watch_cancel = cancel_token.clone();
    task_set.spawn(async move {
        run_config_watcher(store, path, tx, watch_cancel).await;
        Ok(TaskName::ConfigWatcher)
    });

    task_set.spawn(async move {
        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                event = rx.recv() => match event {
                    Some(ConfigEvent::Reloaded(summary)) => {
                        service.invalidate_cache();
                        info!(path = %summary.path.display(), changes = summary.changes.len(), "Mapping hot-reloaded");
                    }
                    Some(ConfigEvent::Error(e)) => warn!(error = %e, "Mapping hot-reload rejected"),
                    None => break,
                },
            }
        }
        Ok(TaskName::ReloadListener)
    });
}

// ============================================================================
// Commands
// ============================================================================

fn load_mapping(explicit: Option<&Path>) -> Result<(CapacityMappingConfig, ConfigOrigin)> {
    match explicit {
        Some(path) => {
            let mapping = CapacityMappingConfig::load_from_file(path)
                .with_context(|| format!("Failed to load mapping {}", path.display()))?
                .with_env_overrides();
            info!(path = %path.display(), lines = mapping.known_line_count(), "Loaded capacity mapping");
            Ok((mapping, ConfigOrigin::File(path.to_path_buf())))
        }
        None => Ok(CapacityMappingConfig::load()),
    }
}

fn build_service(args: &CliArgs) -> Result<Arc<ProductionService>> {
    let (mapping, origin) = load_mapping(args.mapping.as_deref())?;
    info!(origin = %origin, quality = mapping.quality, "Capacity mapping active");
    let store = config::init(mapping, origin);

    let records = args
        .records
        .clone()
        .context("No production rows configured: pass --records or set LINEWATCH_RECORDS")?;
    let source = Arc::new(JsonFileSource::new(records, args.reasons.clone()));
    Ok(Arc::new(ProductionService::with_default_cache(store, source)))
}

fn build_query(range: &RangeArgs) -> Result<ProductionQuery> {
    let today = chrono::Local::now().date_naive();
    let range = resolve_range(range.from.as_deref(), range.to.as_deref(), today).map_err(anyhow::Error::msg)?;
    Ok(ProductionQuery::new(range))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

async fn serve(args: &CliArgs, addr: &str, no_watch: bool) -> Result<()> {
    let service = build_service(args)?;
    let app = create_app(ApiState::new(Arc::clone(&service)));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(addr = %addr, source = service.source_name(), "HTTP server listening");

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    match service.store().path().map(Path::to_path_buf) {
        Some(path) if !no_watch => {
            spawn_config_watcher(&mut task_set, Arc::clone(&service), path, cancel_token.clone());
        }
        Some(_) => info!("Mapping watcher disabled"),
        None => info!("Running on built-in mapping defaults, nothing to watch"),
    }

    run_supervisor(&mut task_set, cancel_token).await
}

fn check_config(explicit: Option<&Path>) -> Result<()> {
    let (mapping, origin) = load_mapping(explicit)?;
    mapping.validate().context("Mapping failed validation")?;
    info!(origin = %origin, lines = mapping.known_line_count(), "Mapping is valid");
    print_json(&mapping)
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LINEWATCH_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    // Logs go to stderr so report output on stdout stays machine-readable
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = CliArgs::parse();

    match &args.command {
        SubCommand::Serve { addr, no_watch } => serve(&args, addr, *no_watch).await,
        SubCommand::Summary { range } => {
            let service = build_service(&args)?;
            print_json(&service.summary(&build_query(range)?).await?)
        }
        SubCommand::Diagnostics { range, machine } => {
            let service = build_service(&args)?;
            let mut query = build_query(range)?;
            query.machine.clone_from(machine);
            print_json(&service.diagnostics(&query).await?)
        }
        SubCommand::Reasons { range, machine, weekdays_only, kind } => {
            let service = build_service(&args)?;
            let mut query = build_query(range)?.weekdays_only(*weekdays_only).with_kind(*kind);
            query.machine.clone_from(machine);
            print_json(&service.downtime_reasons(&query).await?)
        }
        SubCommand::CheckConfig { path } => check_config(path.as_deref().or(args.mapping.as_deref())),
    }
}
