//! atlas: provision the store, load data and inspect it from the shell.
//!
//! Every subcommand prints a single JSON document on stdout; logs go to
//! stderr (or `LOG_FILE`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atlas_core::{defaults, BoundingBox, HealthStatus, SpatialEntity};
use atlas_db::Database;
use atlas_ingest::{BoundaryIngestor, DocumentIngestor, IngestConfig};

#[derive(Parser)]
#[command(name = "atlas")]
#[command(author, version, about = "Capability-adaptive spatial record store")]
#[command(propagate_version = true)]
struct Cli {
    /// Database URL (default: $DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe extensions and create the schema
    Init,

    /// Load village boundaries from a GeoJSON FeatureCollection
    IngestBoundaries {
        /// Path to the dataset
        path: PathBuf,

        /// Failed records tolerated before stopping (default: $INGEST_ERROR_BUDGET or 10)
        #[arg(long)]
        error_budget: Option<usize>,
    },

    /// Load every OCR payload (*.json) in a directory
    IngestDocuments {
        /// Directory of OCR output files
        dir: PathBuf,
    },

    /// Report store health and row counts
    Health,

    /// List records inside a bounding box
    Bbox {
        /// village, claimant or micro_asset
        #[arg(long, default_value = "village")]
        entity: SpatialEntity,

        #[arg(long, allow_negative_numbers = true)]
        min_lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        min_lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        max_lon: f64,

        #[arg(long, allow_negative_numbers = true)]
        max_lat: f64,

        /// Maximum rows (default: $BBOX_DEFAULT_LIMIT or 100)
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, daily rotation)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "atlas=info,warn")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "atlas=info,atlas_db=info,atlas_ingest=info,warn".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("atlas.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // stdout is reserved for command output.
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stderr)"),
        "Logging initialized"
    );
    guard
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn default_bbox_limit() -> i64 {
    std::env::var("BBOX_DEFAULT_LIMIT")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(defaults::BBOX_LIMIT)
}

async fn connect(database_url: Option<String>) -> anyhow::Result<Database> {
    let url = match database_url {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
    };
    Database::connect(&url)
        .await
        .context("connecting to the store")
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let db = connect(cli.database_url).await?;

    match cli.command {
        Commands::Init => {
            let report = db.provisioner().initialize_schema().await?;
            print_json(&report)?;
        }
        Commands::IngestBoundaries { path, error_budget } => {
            db.provisioner().initialize_schema().await?;
            let mut config = IngestConfig::from_env();
            if let Some(budget) = error_budget {
                config = config.with_error_budget(budget);
            }
            let summary = BoundaryIngestor::new(db.villages.clone(), config)
                .run(&path)
                .await?;
            print_json(&summary)?;
        }
        Commands::IngestDocuments { dir } => {
            db.provisioner().initialize_schema().await?;
            let outcomes = DocumentIngestor::new(db.clone()).ingest_dir(&dir).await?;
            print_json(&outcomes)?;
        }
        Commands::Health => {
            let report = db.health().check_health().await;
            print_json(&report)?;
            if report.status != HealthStatus::Healthy {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Bbox {
            entity,
            min_lon,
            min_lat,
            max_lon,
            max_lat,
            limit,
        } => {
            let bbox = BoundingBox::new(min_lon, min_lat, max_lon, max_lat)?;
            let limit = limit.unwrap_or_else(default_bbox_limit);
            let records = db
                .geometry
                .query_by_bounding_box(entity, &bbox, limit)
                .await?;
            print_json(&records)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
