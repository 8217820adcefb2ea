//! Adapter for converting raw positions to canonical trajectory points
//!
//! Parsing (JSON array, NDJSON, GPX) and normalization are separate steps so
//! that the CLI can report every bad record instead of stopping at the first.

use crate::error::ComputeError;
use crate::schema::raw_position::*;
use crate::types::TrajectoryPoint;

/// Adapter for converting raw position records to trajectory points
pub struct PositionAdapter;

impl PositionAdapter {
    /// Parse a JSON string containing an array of positions
    pub fn parse_array(json: &str) -> Result<Vec<RawPosition>, ComputeError> {
        let positions: Vec<RawPosition> = serde_json::from_str(json)?;
        Ok(positions)
    }

    /// Parse NDJSON (newline-delimited JSON), one position per line
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawPosition>, ComputeError> {
        let mut positions = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawPosition>(trimmed) {
                Ok(position) => positions.push(position),
                Err(e) => {
                    return Err(ComputeError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(positions)
    }

    /// Parse a GPX document and return the points of its first track.
    ///
    /// Segments are concatenated in document order. Points without a
    /// `<time>` element keep `timestamp: None` and are rejected later by
    /// [`PositionAdapter::to_trajectory`].
    #[cfg(feature = "gpx")]
    pub fn parse_gpx(input: &[u8]) -> Result<Vec<RawPosition>, ComputeError> {
        let document = gpx::read(input).map_err(|e| ComputeError::GpxError(e.to_string()))?;

        let track = document
            .tracks
            .into_iter()
            .next()
            .ok_or_else(|| ComputeError::MissingField("trk".to_string()))?;

        let mut positions = Vec::new();
        for segment in track.segments {
            for waypoint in segment.points {
                let timestamp = match &waypoint.time {
                    Some(time) => Some(RawTimestamp::Text(
                        time.format()
                            .map_err(|e| ComputeError::GpxError(e.to_string()))?,
                    )),
                    None => None,
                };
                let point = waypoint.point();
                positions.push(RawPosition {
                    latitude: Some(point.y()),
                    longitude: Some(point.x()),
                    timestamp,
                });
            }
        }
        Ok(positions)
    }

    /// Normalize raw positions, aborting at the first malformed record
    pub fn to_trajectory(positions: &[RawPosition]) -> Result<Vec<TrajectoryPoint>, ComputeError> {
        positions
            .iter()
            .enumerate()
            .map(|(index, raw)| normalize(index, raw))
            .collect()
    }

    /// Check every record and collect the problems instead of aborting.
    ///
    /// Ordering is checked between consecutive well-formed records.
    pub fn validate_positions(positions: &[RawPosition]) -> Vec<PositionIssue> {
        let mut issues = Vec::new();
        let mut previous: Option<TrajectoryPoint> = None;

        for (index, raw) in positions.iter().enumerate() {
            match normalize(index, raw) {
                Ok(point) => {
                    if let Some(prev) = previous {
                        if point.timestamp < prev.timestamp {
                            issues.push(PositionIssue {
                                index,
                                message: format!(
                                    "timestamp {} precedes previous point {}",
                                    point.timestamp.to_rfc3339(),
                                    prev.timestamp.to_rfc3339()
                                ),
                            });
                        }
                    }
                    previous = Some(point);
                }
                Err(e) => issues.push(PositionIssue {
                    index,
                    message: e.to_string(),
                }),
            }
        }

        issues
    }
}

/// A problem found in one record
#[derive(Debug, Clone, PartialEq)]
pub struct PositionIssue {
    pub index: usize,
    pub message: String,
}

fn normalize(index: usize, raw: &RawPosition) -> Result<TrajectoryPoint, ComputeError> {
    let latitude = raw
        .latitude
        .ok_or_else(|| ComputeError::malformed(index, "missing latitude"))?;
    let longitude = raw
        .longitude
        .ok_or_else(|| ComputeError::malformed(index, "missing longitude"))?;
    let timestamp = raw
        .timestamp
        .as_ref()
        .ok_or_else(|| ComputeError::malformed(index, "missing timestamp"))?
        .to_utc()
        .map_err(|e| ComputeError::malformed(index, e.to_string()))?;

    let point = TrajectoryPoint::new(latitude, longitude, timestamp);
    point.validate(index)?;
    Ok(point)
}
