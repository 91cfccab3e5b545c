//! Fatal pipeline errors.
//!
//! Per-row problems never show up here; they are counted by the loader as
//! [`DropReason`](crate::loader::DropReason)s and the batch keeps going.

use thiserror::Error;

/// Conditions that stop a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Nothing survived loading, so there is nothing to aggregate.
    #[error("no valid trip records in {files} input file(s) ({dropped} row(s) dropped)")]
    NoValidRecords { files: usize, dropped: u64 },

    /// The aggregator was handed an empty set of trips.
    #[error("no trips to aggregate")]
    NoTrips,

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
