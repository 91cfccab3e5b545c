//! Long-trip counting, surcharge revenue and distance bucketing.
//!
//! Enriched trips are folded into per-worker [`tally::TripTally`] partials
//! that merge by plain addition, so the result does not depend on how the
//! input was split across threads.

pub mod tally;
pub mod types;
pub mod utility;

pub use tally::{TripTally, aggregate, expected_revenue, is_long_trip, order_buckets};
pub use types::{AggregateResult, DistanceBucket, StatSummary, TripSummary};
