//! CLI entry point for the trip distance report.
//!
//! `analyze` loads trip exports, derives duration and distance for every
//! trip, and reports long-trip surcharge revenue and distance buckets.
//! `distance` spot-checks the great-circle distance between two points.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_distance_report::{
    config::{DistanceBuckets, DistanceUnit, PipelineConfig},
    error::PipelineError,
    geo::haversine_distance,
    output::{log_report, write_bucket_csv, write_json},
    pipeline,
};

#[derive(Parser)]
#[command(name = "trip_distance_report")]
#[command(about = "Trip duration, distance and long-trip surcharge report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze trip CSV files (plain or gzip) and directories of them
    Analyze {
        /// Files or directories to read
        #[arg(value_name = "FILES_OR_DIRS", required = true)]
        inputs: Vec<PathBuf>,

        /// JSON config file; flags below override its values
        #[arg(short, long)]
        config: Option<String>,

        /// Distance unit for results and bucket edges
        #[arg(short, long, value_enum)]
        unit: Option<DistanceUnit>,

        /// Trips longer than this many seconds count as long trips
        #[arg(short = 't', long)]
        threshold_seconds: Option<i64>,

        /// Surcharge applied per long trip
        #[arg(short, long)]
        surcharge: Option<f64>,

        /// Comma-separated bucket upper edges, e.g. "1,4,9"
        #[arg(short, long, value_delimiter = ',')]
        bucket_edges: Option<Vec<f64>>,

        /// Worker threads (defaults to one per core)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Write the full report as JSON to this path
        #[arg(long)]
        json_out: Option<PathBuf>,

        /// Write the ordered bucket-count table as CSV to this path
        #[arg(long)]
        csv_out: Option<PathBuf>,
    },
    /// Great-circle distance between two points
    Distance {
        #[arg(allow_negative_numbers = true)]
        lat1: f64,
        #[arg(allow_negative_numbers = true)]
        lng1: f64,
        #[arg(allow_negative_numbers = true)]
        lat2: f64,
        #[arg(allow_negative_numbers = true)]
        lng2: f64,

        #[arg(short, long, value_enum, default_value_t = DistanceUnit::Miles)]
        unit: DistanceUnit,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/trip_distance_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_distance_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            inputs,
            config,
            unit,
            threshold_seconds,
            surcharge,
            bucket_edges,
            threads,
            json_out,
            csv_out,
        } => {
            let mut pipeline_config = match config {
                Some(path) => PipelineConfig::load(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(unit) = unit {
                pipeline_config.unit = unit;
            }
            if let Some(threshold) = threshold_seconds {
                pipeline_config.long_trip_threshold_seconds = threshold;
            }
            if let Some(surcharge) = surcharge {
                pipeline_config.surcharge = surcharge;
            }
            if let Some(edges) = bucket_edges {
                pipeline_config.buckets = DistanceBuckets::from_edges(edges)?;
            }
            if threads.is_some() {
                pipeline_config.threads = threads;
            }

            let report = match pipeline::run(&inputs, &pipeline_config) {
                Ok(report) => report,
                Err(e @ PipelineError::NoValidRecords { .. }) => {
                    error!(error = %e, "Nothing to report");
                    return Err(e.into());
                }
                Err(e) => return Err(e.into()),
            };

            log_report(&report);

            if let Some(path) = json_out {
                write_json(&path, &report)?;
                info!(path = %path.display(), "JSON report written");
            }
            if let Some(path) = csv_out {
                write_bucket_csv(&path, &report)?;
                info!(path = %path.display(), "Bucket table written");
            }
        }
        Commands::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
            unit,
        } => {
            let distance = haversine_distance(lat1, lng1, lat2, lng2, unit.radius());
            info!(
                distance = %format!("{distance:.4}"),
                unit = unit.abbreviation(),
                "Great-circle distance"
            );
        }
    }

    Ok(())
}
