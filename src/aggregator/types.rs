//! Data types produced by the aggregation pass.

use serde::Serialize;

use crate::aggregator::utility::RunningStats;

/// One distance category and how many trips fell into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceBucket {
    pub label: String,
    pub count: u64,
    /// Share of all aggregated trips, in percent.
    pub share_percent: f64,
}

/// Descriptive statistics for one derived field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSummary {
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

impl From<&RunningStats> for StatSummary {
    fn from(stats: &RunningStats) -> Self {
        if stats.count == 0 {
            return StatSummary {
                mean: 0.0,
                stddev: 0.0,
                min: 0.0,
                max: 0.0,
            };
        }
        StatSummary {
            mean: stats.mean(),
            stddev: stats.stddev(),
            min: stats.min,
            max: stats.max,
        }
    }
}

/// Describe-style overview of the aggregated trips.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub trips: u64,
    pub duration_seconds: StatSummary,
    pub distance: StatSummary,
    pub long_trip_percent: f64,
}

/// End of the pipeline, handed to whatever renders the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// Trips whose duration is strictly above the threshold.
    pub long_trip_count: u64,
    /// `long_trip_count * surcharge`, unrounded.
    pub expected_revenue: f64,
    /// Trips whose end time is not after their start time. They are still
    /// bucketed by distance.
    pub non_positive_duration_count: u64,
    /// Buckets in display order.
    pub bucket_counts: Vec<DistanceBucket>,
    pub summary: TripSummary,
}

impl AggregateResult {
    /// Count for the bucket labelled `label`, if there is one.
    pub fn bucket_count(&self, label: &str) -> Option<u64> {
        self.bucket_counts
            .iter()
            .find(|b| b.label == label)
            .map(|b| b.count)
    }

    pub fn labels(&self) -> Vec<&str> {
        self.bucket_counts.iter().map(|b| b.label.as_str()).collect()
    }
}
