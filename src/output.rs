//! Output formatting and persistence for pipeline reports.
//!
//! Supports a logged summary, a full JSON report, and the ordered
//! bucket-count CSV consumed by chart renderers.

use anyhow::Result;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, File};
use std::path::Path;
use tracing::{debug, info};

use crate::pipeline::PipelineReport;

/// One row of the bucket-count table.
#[derive(Debug, Serialize)]
struct BucketRow<'a> {
    distance_bucket: &'a str,
    count: u64,
    share_percent: f64,
}

/// Logs a human-readable summary of the report. Revenue is shown with two
/// decimals.
pub fn log_report(report: &PipelineReport) {
    let result = &report.result;
    let unit = report.unit.abbreviation();

    info!(
        rows_read = report.load.rows_read,
        dropped = report.load.dropped,
        trips = result.summary.trips,
        "Input summary"
    );
    info!(
        long_trips = result.long_trip_count,
        long_trip_percent = %format!("{:.1}", result.summary.long_trip_percent),
        expected_revenue = %format!("{:.2}", result.expected_revenue),
        non_positive_durations = result.non_positive_duration_count,
        "Long trips"
    );
    for bucket in &result.bucket_counts {
        info!(
            bucket = %format!("{} {unit}", bucket.label),
            count = bucket.count,
            share_percent = %format!("{:.1}", bucket.share_percent),
            "Distance bucket"
        );
    }
    debug!("{:#?}", result.summary);
}

/// Writes the whole report as pretty-printed JSON.
pub fn write_json(path: &Path, report: &PipelineReport) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, report)?;
    debug!(path = %path.display(), "Wrote JSON report");
    Ok(())
}

/// Writes the ordered `(distance_bucket, count, share_percent)` table as CSV,
/// replacing any existing file.
pub fn write_bucket_csv(path: &Path, report: &PipelineReport) -> Result<()> {
    create_parent(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_path(path)?;

    for bucket in &report.result.bucket_counts {
        writer.serialize(BucketRow {
            distance_bucket: &bucket.label,
            count: bucket.count,
            share_percent: bucket.share_percent,
        })?;
    }
    writer.flush()?;

    debug!(path = %path.display(), "Wrote bucket CSV");
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}
