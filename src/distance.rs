//! Great-circle distance
//!
//! Haversine distance on a sphere with the WGS-84 equatorial radius. At the
//! scales stay points care about (tens to hundreds of meters) the spherical
//! error is negligible.

use crate::types::TrajectoryPoint;

/// Sphere radius used for all distances (WGS-84 equatorial, meters)
pub const EARTH_RADIUS_METERS: f64 = 6_378_137.0;

/// Haversine distance in meters between two (lat, lon) pairs in degrees
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Distance in meters between two trajectory points
pub fn distance(a: &TrajectoryPoint, b: &TrajectoryPoint) -> f64 {
    haversine_meters(a.latitude, a.longitude, b.latitude, b.longitude)
}
