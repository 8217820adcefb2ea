//! Stay point aggregation
//!
//! Collapses a candidate window into a single [`StayPoint`]: unweighted mean
//! of latitude and longitude, arrival at the first member, departure at the
//! last. Longitudes are averaged as plain numbers, so a window straddling
//! the antimeridian lands near 0° instead of ±180°.

use crate::error::ComputeError;
use crate::types::{CandidateRange, StayPoint, TrajectoryPoint};

/// Aggregator for candidate windows
pub struct StayPointAggregator;

impl StayPointAggregator {
    /// Summarize a non-empty contiguous window of points
    pub fn aggregate(window: &[TrajectoryPoint]) -> Result<StayPoint, ComputeError> {
        let (first, last) = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ComputeError::EmptyWindow),
        };

        let count = window.len() as f64;
        let latitude = window.iter().map(|p| p.latitude).sum::<f64>() / count;
        let longitude = window.iter().map(|p| p.longitude).sum::<f64>() / count;

        Ok(StayPoint {
            latitude,
            longitude,
            arrival: first.timestamp,
            departure: last.timestamp,
        })
    }

    /// Summarize `range` of `points`
    pub fn aggregate_range(
        points: &[TrajectoryPoint],
        range: CandidateRange,
    ) -> Result<StayPoint, ComputeError> {
        let window = points.get(range.as_range()).ok_or(ComputeError::EmptyWindow)?;
        Self::aggregate(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn pt(lat: f64, lon: f64, secs: i64) -> TrajectoryPoint {
        TrajectoryPoint::new(lat, lon, Utc.timestamp_opt(secs, 0).unwrap())
    }

    #[test]
    fn test_mean_position_and_bounds() {
        let window = vec![pt(10.0, 20.0, 100), pt(12.0, 22.0, 160), pt(14.0, 27.0, 400)];
        let sp = StayPointAggregator::aggregate(&window).unwrap();

        assert_eq!(
            sp,
            StayPoint {
                latitude: 12.0,
                longitude: 23.0,
                arrival: Utc.timestamp_opt(100, 0).unwrap(),
                departure: Utc.timestamp_opt(400, 0).unwrap(),
            }
        );
    }

    #[test]
    fn test_single_point_window() {
        let sp = StayPointAggregator::aggregate(&[pt(1.5, -2.5, 42)]).unwrap();
        assert_eq!(sp.latitude, 1.5);
        assert_eq!(sp.longitude, -2.5);
        assert_eq!(sp.arrival, sp.departure);
    }

    #[test]
    fn test_empty_window_fails() {
        assert!(matches!(
            StayPointAggregator::aggregate(&[]),
            Err(ComputeError::EmptyWindow)
        ));
    }

    #[test]
    fn test_no_antimeridian_correction() {
        let window = vec![pt(0.0, 179.9, 0), pt(0.0, -179.9, 10)];
        let sp = StayPointAggregator::aggregate(&window).unwrap();
        assert!(sp.longitude.abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_range() {
        let points = vec![pt(0.0, 0.0, 0), pt(2.0, 4.0, 30), pt(4.0, 8.0, 60), pt(9.0, 9.0, 90)];

        let sp = StayPointAggregator::aggregate_range(&points, CandidateRange::new(1, 3)).unwrap();
        assert_eq!(sp.latitude, 3.0);
        assert_eq!(sp.longitude, 6.0);
        assert_eq!(sp.arrival, points[1].timestamp);
        assert_eq!(sp.departure, points[2].timestamp);

        assert!(StayPointAggregator::aggregate_range(&points, CandidateRange::new(2, 2)).is_err());
        assert!(StayPointAggregator::aggregate_range(&points, CandidateRange::new(3, 9)).is_err());
    }
}
