//! Elapsed-time and great-circle distance math.
//!
//! Both functions are pure and hold no state, so they can run on any number
//! of records in parallel.

use chrono::NaiveDateTime;

/// Mean Earth radius in statute miles.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Returns `end - start` in whole seconds, truncated toward zero.
///
/// No clamping: the result is zero or negative when `end` does not come
/// after `start`.
pub fn duration_seconds(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    (end - start).num_seconds()
}

/// Great-circle distance between two points given in decimal degrees, using
/// the Haversine formula on a sphere of the given `radius`.
///
/// The result is in the same unit as `radius`. The haversine term is clamped
/// into `[0, 1]` before the square root and arcsine, so rounding overshoot
/// near antipodal points never yields `NaN`.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64, radius: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = lng2.to_radians() - lng1.to_radians();

    let a = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let a = a.clamp(0.0, 1.0);

    2.0 * radius * a.sqrt().asin()
}
