//! Pipeline orchestration
//!
//! This module provides the public API for stay-point detection.
//! Every entry point follows the same stages:
//!
//! 1. Parameter validation
//! 2. Sequence validation (coordinates, timestamp ordering)
//! 3. SegmentationScanner - candidate ranges
//! 4. StayPointAggregator - one stay point per range
//!
//! All of them are pure functions of (points, parameters). Nothing is cached
//! between calls.

use crate::aggregator::StayPointAggregator;
use crate::config::StayPointParams;
use crate::encoder::{StayPointEncoder, StayPointReport};
use crate::error::ComputeError;
use crate::schema::PositionAdapter;
use crate::segmentation::{CancellationToken, SegmentationScanner};
use crate::types::{CandidateRange, StayPoint, TrajectoryPoint};

/// Detect stay points in a time-ordered trajectory.
///
/// # Arguments
/// * `points` - Trajectory ordered by non-decreasing timestamp
/// * `radius_meters` - Spatial radius a stay must remain within (> 0)
/// * `min_duration_seconds` - Duration a stay must strictly exceed (> 0)
///
/// # Returns
/// Stay points in temporal order; empty when fewer than two points are given
///
/// # Example
/// ```ignore
/// let stays = compute_stay_points(&points, 100.0, 60.0)?;
/// ```
pub fn compute_stay_points(
    points: &[TrajectoryPoint],
    radius_meters: f64,
    min_duration_seconds: f64,
) -> Result<Vec<StayPoint>, ComputeError> {
    let params = StayPointParams::new(radius_meters, min_duration_seconds)?;
    compute_stay_points_with(points, &params)
}

/// Detect stay points using a full parameter set
pub fn compute_stay_points_with(
    points: &[TrajectoryPoint],
    params: &StayPointParams,
) -> Result<Vec<StayPoint>, ComputeError> {
    if !prepare(points, params)? {
        return Ok(Vec::new());
    }
    let ranges = SegmentationScanner::scan(points, params);
    aggregate_all(points, &ranges)
}

/// Detect stay points, giving up as soon as `token` is cancelled.
///
/// The token is checked before each anchor iteration. A cancelled run returns
/// [`ComputeError::Cancelled`], never a partial list.
pub fn compute_stay_points_cancellable(
    points: &[TrajectoryPoint],
    params: &StayPointParams,
    token: &CancellationToken,
) -> Result<Vec<StayPoint>, ComputeError> {
    if !prepare(points, params)? {
        return Ok(Vec::new());
    }
    let ranges = SegmentationScanner::scan_cancellable(points, params, token)?;
    aggregate_all(points, &ranges)
}

/// Convert a JSON array of positions into a stay point report (JSON).
///
/// Accepts `lat`/`latitude`, `lon`/`lng`/`longitude` and `time`/`timestamp`
/// field names.
///
/// # Example
/// ```ignore
/// let report_json = trajectory_json_to_stay_points(json, 100.0, 60.0)?;
/// ```
pub fn trajectory_json_to_stay_points(
    raw_json: String,
    radius_meters: f64,
    min_duration_seconds: f64,
) -> Result<String, ComputeError> {
    let params = StayPointParams::new(radius_meters, min_duration_seconds)?;
    StayPointDetector::new(params)?.detect_json(&raw_json)
}

/// Check coordinates and timestamp ordering of a whole sequence.
///
/// Fails with the index of the first offending point.
pub fn validate_sequence(points: &[TrajectoryPoint]) -> Result<(), ComputeError> {
    for (index, point) in points.iter().enumerate() {
        point.validate(index)?;
        if index > 0 && point.timestamp < points[index - 1].timestamp {
            return Err(ComputeError::malformed(
                index,
                "timestamp precedes the previous point",
            ));
        }
    }
    Ok(())
}

/// Validates inputs; returns false when there is nothing to scan
fn prepare(points: &[TrajectoryPoint], params: &StayPointParams) -> Result<bool, ComputeError> {
    params.validate()?;
    if points.len() < 2 {
        return Ok(false);
    }
    validate_sequence(points)?;
    tracing::debug!(
        points = points.len(),
        radius_meters = params.radius_meters,
        min_duration_seconds = params.min_duration_seconds,
        "scanning trajectory"
    );
    Ok(true)
}

fn aggregate_all(
    points: &[TrajectoryPoint],
    ranges: &[CandidateRange],
) -> Result<Vec<StayPoint>, ComputeError> {
    let stays = ranges
        .iter()
        .map(|range| StayPointAggregator::aggregate_range(points, *range))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::debug!(stay_points = stays.len(), "scan complete");
    Ok(stays)
}

/// Reusable detector bound to one parameter set.
///
/// Holds no results between calls; callers that want to skip recomputation
/// for unchanged inputs keep their own cache.
#[derive(Debug, Clone, Default)]
pub struct StayPointDetector {
    params: StayPointParams,
    encoder: StayPointEncoder,
    cancellation: Option<CancellationToken>,
}

impl StayPointDetector {
    /// Create a detector with validated parameters
    pub fn new(params: StayPointParams) -> Result<Self, ComputeError> {
        params.validate()?;
        Ok(Self {
            params,
            encoder: StayPointEncoder::new(),
            cancellation: None,
        })
    }

    /// Attach a cancellation token checked by every subsequent detection
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn params(&self) -> &StayPointParams {
        &self.params
    }

    /// Detect stay points in canonical trajectory points
    pub fn detect(&self, points: &[TrajectoryPoint]) -> Result<Vec<StayPoint>, ComputeError> {
        match &self.cancellation {
            Some(token) => compute_stay_points_cancellable(points, &self.params, token),
            None => compute_stay_points_with(points, &self.params),
        }
    }

    /// Detect with an explicit token, ignoring any attached one
    pub fn detect_cancellable(
        &self,
        points: &[TrajectoryPoint],
        token: &CancellationToken,
    ) -> Result<Vec<StayPoint>, ComputeError> {
        compute_stay_points_cancellable(points, &self.params, token)
    }

    /// Detect and wrap the result in a report
    pub fn detect_report(&self, points: &[TrajectoryPoint]) -> Result<StayPointReport, ComputeError> {
        let stays = self.detect(points)?;
        Ok(self.encoder.encode(&stays, &self.params, points.len()))
    }

    /// Parse a JSON array of positions, detect, and encode the report as JSON
    pub fn detect_json(&self, raw_json: &str) -> Result<String, ComputeError> {
        let positions = PositionAdapter::parse_array(raw_json)?;
        let points = PositionAdapter::to_trajectory(&positions)?;
        let stays = self.detect(&points)?;
        self.encoder.encode_to_json(&stays, &self.params, points.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrailingWindow;
    use crate::distance::distance;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn pt(lat: f64, lon: f64, secs: i64) -> TrajectoryPoint {
        TrajectoryPoint::new(lat, lon, at(secs))
    }

    /// A walk through Milan with two clear stops
    fn sample_walk() -> Vec<TrajectoryPoint> {
        vec![
            pt(45.4640, 9.1900, 0),
            pt(45.4641, 9.1901, 120),
            pt(45.4640, 9.1902, 300),
            pt(45.4642, 9.1900, 600),
            pt(45.4700, 9.1950, 630),
            pt(45.4760, 9.2000, 660),
            pt(45.4820, 9.2050, 690),
            pt(45.4821, 9.2051, 1000),
            pt(45.4822, 9.2050, 1300),
            pt(45.4900, 9.2100, 1330),
        ]
    }

    #[test]
    fn test_reference_scenario() {
        let points = vec![pt(0.0, 0.0, 0), pt(0.0, 0.0, 30), pt(0.0, 0.002, 90)];
        let stays = compute_stay_points(&points, 100.0, 20.0).unwrap();

        assert_eq!(
            stays,
            vec![StayPoint {
                latitude: 0.0,
                longitude: 0.0,
                arrival: at(0),
                departure: at(30),
            }]
        );
    }

    #[test]
    fn test_sample_walk_finds_two_stops() {
        let stays = compute_stay_points(&sample_walk(), 100.0, 60.0).unwrap();

        assert_eq!(stays.len(), 2);
        assert_eq!(stays[0].arrival, at(0));
        assert_eq!(stays[0].departure, at(600));
        assert_eq!(stays[1].arrival, at(690));
        assert_eq!(stays[1].departure, at(1300));
        assert!((stays[1].latitude - 45.4821).abs() < 1e-9);
    }

    #[test]
    fn test_output_sorted_and_non_overlapping() {
        let stays = compute_stay_points(&sample_walk(), 100.0, 60.0).unwrap();
        for pair in stays.windows(2) {
            assert!(pair[0].arrival <= pair[1].arrival);
            assert!(pair[0].departure < pair[1].arrival);
        }
    }

    #[test]
    fn test_fewer_than_two_points() {
        assert!(compute_stay_points(&[], 100.0, 60.0).unwrap().is_empty());
        assert!(compute_stay_points(&[pt(1.0, 1.0, 0)], 100.0, 60.0)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_all_within_radius_with_trailing_emit() {
        let points: Vec<_> = (0..30)
            .map(|i| pt(45.0, 9.0 + (i % 3) as f64 * 0.0001, i * 60))
            .collect();
        for p in &points {
            assert!(distance(&points[0], p) <= 100.0);
        }

        let params = StayPointParams::new(100.0, 600.0)
            .unwrap()
            .with_trailing_window(TrailingWindow::Emit);
        let stays = compute_stay_points_with(&points, &params).unwrap();

        assert_eq!(stays.len(), 1);
        assert_eq!(stays[0].arrival, points[0].timestamp);
        assert_eq!(stays[0].departure, points[29].timestamp);
    }

    #[test]
    fn test_trailing_stay_not_emitted_by_default() {
        // The subject is still inside the radius when the recording stops
        let points: Vec<_> = (0..30)
            .map(|i| pt(45.0, 9.0 + (i % 3) as f64 * 0.0001, i * 60))
            .collect();
        let stays = compute_stay_points(&points, 100.0, 600.0).unwrap();
        assert!(stays.is_empty());
    }

    #[test]
    fn test_rapid_movement_is_empty() {
        let points: Vec<_> = (0..50).map(|i| pt(45.0 + i as f64 * 0.01, 9.0, i * 30)).collect();
        assert!(compute_stay_points(&points, 100.0, 60.0).unwrap().is_empty());
    }

    #[test]
    fn test_short_stays_are_empty() {
        let points = vec![
            pt(45.0, 9.0, 0),
            pt(45.0, 9.0001, 20),
            pt(45.01, 9.0, 40),
            pt(45.01, 9.0001, 60),
            pt(45.02, 9.0, 80),
        ];
        assert!(compute_stay_points(&points, 100.0, 60.0).unwrap().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let points = sample_walk();
        let a = compute_stay_points(&points, 100.0, 60.0).unwrap();
        let b = compute_stay_points(&points, 100.0, 60.0).unwrap();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.latitude.to_bits(), y.latitude.to_bits());
            assert_eq!(x.longitude.to_bits(), y.longitude.to_bits());
            assert_eq!(x.arrival, y.arrival);
            assert_eq!(x.departure, y.departure);
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let points = sample_walk();
        assert!(matches!(
            compute_stay_points(&points, 0.0, 60.0),
            Err(ComputeError::InvalidParameter { .. })
        ));
        assert!(matches!(
            compute_stay_points(&points, 100.0, -1.0),
            Err(ComputeError::InvalidParameter { .. })
        ));
        // Parameters are checked even when there is nothing to scan
        assert!(compute_stay_points(&[], -5.0, 60.0).is_err());
    }

    #[test]
    fn test_malformed_point_reports_index() {
        let mut points = sample_walk();
        points[4].longitude = f64::NAN;

        match compute_stay_points(&points, 100.0, 60.0) {
            Err(ComputeError::MalformedPoint { index, .. }) => assert_eq!(index, 4),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_timestamps_rejected() {
        let points = vec![pt(0.0, 0.0, 100), pt(0.0, 0.0, 50), pt(0.0, 0.01, 200)];
        assert!(matches!(
            compute_stay_points(&points, 100.0, 20.0),
            Err(ComputeError::MalformedPoint { index: 1, .. })
        ));
    }

    #[test]
    fn test_cancellation_returns_no_result() {
        let token = CancellationToken::new();
        token.cancel();

        let result =
            compute_stay_points_cancellable(&sample_walk(), &StayPointParams::default(), &token);
        assert!(matches!(result, Err(ComputeError::Cancelled)));
    }

    #[test]
    fn test_cancellation_from_another_thread() {
        let points: Vec<_> = (0..5_000).map(|i| pt(0.0, 0.0, i)).collect();
        let params = StayPointParams::new(100.0, 1e9).unwrap();
        let token = CancellationToken::new();

        let worker_token = token.clone();
        let handle = std::thread::spawn(move || {
            compute_stay_points_cancellable(&points, &params, &worker_token)
        });
        token.cancel();

        // Either the scan saw the flag, or it finished first with no stays
        match handle.join().unwrap() {
            Err(ComputeError::Cancelled) => {}
            Ok(stays) => assert!(stays.is_empty()),
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    #[test]
    fn test_detector_matches_free_function() {
        let params = StayPointParams::new(100.0, 60.0).unwrap();
        let detector = StayPointDetector::new(params).unwrap();

        assert_eq!(
            detector.detect(&sample_walk()).unwrap(),
            compute_stay_points_with(&sample_walk(), &params).unwrap()
        );
    }

    #[test]
    fn test_detector_with_cancelled_token() {
        let token = CancellationToken::new();
        let detector = StayPointDetector::default().with_cancellation(token.clone());

        assert!(detector.detect(&sample_walk()).is_ok());
        token.cancel();
        assert!(matches!(
            detector.detect(&sample_walk()),
            Err(ComputeError::Cancelled)
        ));
    }

    #[test]
    fn test_detector_report() {
        let detector = StayPointDetector::default();
        let report = detector.detect_report(&sample_walk()).unwrap();

        assert_eq!(report.input_points, 10);
        assert_eq!(report.stay_points.len(), 2);
        assert_eq!(report.stay_points[0].dwell_seconds, 600.0);
        assert_eq!(report.stay_points[0].radius_meters, 100.0);
    }

    #[test]
    fn test_trajectory_json_to_stay_points() {
        let json = r#"[
            {"lat": 0.0, "lon": 0.0, "time": "2021-03-01T10:00:00Z"},
            {"latitude": 0.0, "longitude": 0.0, "timestamp": "2021-03-01T10:00:30Z"},
            {"lat": 0.0, "lng": 0.002, "time": "2021-03-01T10:01:30Z"}
        ]"#;

        let result = trajectory_json_to_stay_points(json.to_string(), 100.0, 20.0).unwrap();
        let report: serde_json::Value = serde_json::from_str(&result).unwrap();

        assert_eq!(report["input_points"], 3);
        assert_eq!(report["stay_points"].as_array().unwrap().len(), 1);
        assert_eq!(report["stay_points"][0]["arrival"], "2021-03-01T10:00:00Z");
        assert_eq!(report["stay_points"][0]["departure"], "2021-03-01T10:00:30Z");
        assert_eq!(report["stay_points"][0]["dwell_seconds"], 30.0);
    }

    #[test]
    fn test_trajectory_json_invalid() {
        assert!(trajectory_json_to_stay_points("not json".to_string(), 100.0, 20.0).is_err());
        assert!(matches!(
            trajectory_json_to_stay_points(r#"[{"lat": 1.0}]"#.to_string(), 100.0, 20.0),
            Err(ComputeError::MalformedPoint { index: 0, .. })
        ));
    }
}
