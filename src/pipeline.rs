//! Drives loading, enrichment and aggregation end to end.

use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::aggregator::{AggregateResult, aggregate};
use crate::config::{DistanceUnit, PipelineConfig};
use crate::enrich::enrich_all;
use crate::error::PipelineError;
use crate::loader::{LoadOutcome, expand_inputs, load_files};

/// Everything a run produces: what was loaded and what it aggregated to.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub unit: DistanceUnit,
    pub load: LoadOutcome,
    pub result: AggregateResult,
}

/// Runs the full pipeline over files and directories.
///
/// Uses a dedicated worker pool when `config.threads` is set.
///
/// # Errors
///
/// Fails on invalid configuration, I/O errors, or when no record survives
/// loading ([`PipelineError::NoValidRecords`]).
#[tracing::instrument(skip_all, fields(inputs = inputs.len()))]
pub fn run(inputs: &[PathBuf], config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    config.validate()?;

    let files = expand_inputs(inputs)?;
    info!(files = files.len(), "Resolved input files");

    match config.threads {
        Some(threads) => {
            let pool = ThreadPoolBuilder::new().num_threads(threads).build()?;
            pool.install(|| run_files(&files, config))
        }
        None => run_files(&files, config),
    }
}

fn run_files(files: &[PathBuf], config: &PipelineConfig) -> Result<PipelineReport, PipelineError> {
    let load = load_files(files)?;
    run_loaded(load, config)
}

/// Enriches and aggregates already-loaded records.
///
/// # Errors
///
/// Returns [`PipelineError::NoValidRecords`] if `load` holds no records.
pub fn run_loaded(
    load: LoadOutcome,
    config: &PipelineConfig,
) -> Result<PipelineReport, PipelineError> {
    info!(
        files = load.files,
        rows_read = load.rows_read,
        loaded = load.kept(),
        dropped = load.dropped,
        "Loaded trip records"
    );

    if load.records.is_empty() {
        return Err(PipelineError::NoValidRecords {
            files: load.files,
            dropped: load.dropped,
        });
    }

    let trips = enrich_all(&load.records, config.radius());
    let result = aggregate(&trips, config)?;

    info!(
        trips = result.summary.trips,
        long_trips = result.long_trip_count,
        non_positive_durations = result.non_positive_duration_count,
        "Aggregation complete"
    );

    Ok(PipelineReport {
        unit: config.unit,
        load,
        result,
    })
}
