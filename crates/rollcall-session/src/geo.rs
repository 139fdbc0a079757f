//! Great-circle distance and present/absent classification.

use rollcall_core::types::{AttendanceStatus, GeoPoint};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
pub fn distance_meters(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// A distance exactly on the threshold counts as present.
pub fn classify(distance_meters: f64, threshold_meters: f64) -> AttendanceStatus {
    if distance_meters <= threshold_meters {
        AttendanceStatus::Present
    } else {
        AttendanceStatus::Absent
    }
}
