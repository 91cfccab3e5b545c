use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::aggregator::types::{AggregateResult, DistanceBucket, StatSummary, TripSummary};
use crate::aggregator::utility::{RunningStats, pct};
use crate::config::{DistanceBuckets, PipelineConfig};
use crate::enrich::EnrichedTrip;
use crate::error::PipelineError;

/// Partial aggregate over some subset of trips.
///
/// Every field is a sum (or min/max), so [`TripTally::merge`] is associative
/// and commutative.
#[derive(Debug, Clone, Default)]
pub struct TripTally {
    pub trips: u64,
    pub long_trips: u64,
    pub non_positive_durations: u64,
    /// Keyed by bucket index; absent buckets have no trips.
    pub bucket_counts: HashMap<usize, u64>,
    pub duration: RunningStats,
    pub distance: RunningStats,
}

impl TripTally {
    pub fn record(&mut self, trip: &EnrichedTrip, config: &PipelineConfig) {
        self.trips += 1;

        if is_long_trip(trip.duration_seconds, config.long_trip_threshold_seconds) {
            self.long_trips += 1;
        }
        if trip.duration_seconds <= 0 {
            self.non_positive_durations += 1;
        }

        let bucket = config.buckets.index_of(trip.distance);
        *self.bucket_counts.entry(bucket).or_default() += 1;

        self.duration.push(trip.duration_seconds as f64);
        self.distance.push(trip.distance);
    }

    pub fn merge(mut self, other: TripTally) -> Self {
        self.trips += other.trips;
        self.long_trips += other.long_trips;
        self.non_positive_durations += other.non_positive_durations;
        for (bucket, n) in other.bucket_counts {
            *self.bucket_counts.entry(bucket).or_default() += n;
        }
        self.duration.merge(&other.duration);
        self.distance.merge(&other.distance);
        self
    }

    /// Turns the tally into the final result.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoTrips`] if nothing was tallied.
    pub fn finish(self, config: &PipelineConfig) -> Result<AggregateResult, PipelineError> {
        if self.trips == 0 {
            return Err(PipelineError::NoTrips);
        }

        let labels = config.buckets.labels();
        let counts = self
            .bucket_counts
            .into_iter()
            .filter_map(|(i, n)| labels.get(i).map(|label| (label.clone(), n)));

        Ok(AggregateResult {
            long_trip_count: self.long_trips,
            expected_revenue: expected_revenue(self.long_trips, config.surcharge),
            non_positive_duration_count: self.non_positive_durations,
            bucket_counts: order_buckets(&config.buckets, counts),
            summary: TripSummary {
                trips: self.trips,
                duration_seconds: StatSummary::from(&self.duration),
                distance: StatSummary::from(&self.distance),
                long_trip_percent: pct(self.long_trips, self.trips),
            },
        })
    }
}

/// A trip is long when it lasts strictly longer than `threshold_seconds`, so
/// zero and negative durations never qualify.
pub fn is_long_trip(duration_seconds: i64, threshold_seconds: i64) -> bool {
    duration_seconds > threshold_seconds
}

/// Projected surcharge revenue. Rounding is left to presentation.
pub fn expected_revenue(long_trip_count: u64, surcharge: f64) -> f64 {
    long_trip_count as f64 * surcharge
}

/// Arranges `(label, count)` pairs, in any order, into the buckets' display
/// order. Buckets without an entry get a zero count, repeated labels are
/// summed, and labels the buckets don't know are ignored.
pub fn order_buckets<I>(buckets: &DistanceBuckets, counts: I) -> Vec<DistanceBucket>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let mut by_label: HashMap<String, u64> = HashMap::new();
    for (label, n) in counts {
        *by_label.entry(label).or_default() += n;
    }

    let total: u64 = buckets
        .labels()
        .iter()
        .filter_map(|label| by_label.get(label))
        .sum();

    let ordered: Vec<DistanceBucket> = buckets
        .labels()
        .iter()
        .map(|label| {
            let count = by_label.remove(label).unwrap_or(0);
            DistanceBucket {
                label: label.clone(),
                count,
                share_percent: pct(count, total),
            }
        })
        .collect();

    if !by_label.is_empty() {
        debug!(
            unknown = ?by_label.keys().collect::<Vec<_>>(),
            "Ignoring counts for unknown bucket labels"
        );
    }

    ordered
}

/// Aggregates all trips in one parallel fold/reduce pass.
///
/// # Errors
///
/// Returns [`PipelineError::NoTrips`] when `trips` is empty.
#[tracing::instrument(skip_all, fields(trips = trips.len()))]
pub fn aggregate(
    trips: &[EnrichedTrip],
    config: &PipelineConfig,
) -> Result<AggregateResult, PipelineError> {
    trips
        .par_iter()
        .fold(TripTally::default, |mut tally, trip| {
            tally.record(trip, config);
            tally
        })
        .reduce(TripTally::default, TripTally::merge)
        .finish(config)
}
