//! Derives duration and distance for each trip.

use rayon::prelude::*;

use crate::geo::{duration_seconds, haversine_distance};
use crate::loader::TripRecord;

/// A [`TripRecord`] with its derived fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichedTrip {
    pub record: TripRecord,
    /// `end_time - start_time`, whole seconds. Zero or negative for
    /// inconsistent inputs.
    pub duration_seconds: i64,
    /// Great-circle distance in the unit of the radius used, never negative.
    pub distance: f64,
}

impl EnrichedTrip {
    /// Enriches one record against a sphere of `radius`.
    pub fn from_record(record: TripRecord, radius: f64) -> Self {
        Self {
            duration_seconds: duration_seconds(record.start_time, record.end_time),
            distance: haversine_distance(
                record.start_lat,
                record.start_lng,
                record.end_lat,
                record.end_lng,
                radius,
            ),
            record,
        }
    }
}

/// Enriches every record independently, in parallel. Output order matches
/// input order.
pub fn enrich_all(records: &[TripRecord], radius: f64) -> Vec<EnrichedTrip> {
    records
        .par_iter()
        .map(|record| EnrichedTrip::from_record(*record, radius))
        .collect()
}
