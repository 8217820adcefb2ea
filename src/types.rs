//! Core types for stay-point detection
//!
//! This module defines the data structures that flow through the pipeline:
//! canonical trajectory points in, candidate index ranges in the middle, and
//! stay points out.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::error::ComputeError;

/// A single timestamped position of a trajectory (canonical shape)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Absolute point in time (UTC)
    pub timestamp: DateTime<Utc>,
}

impl TrajectoryPoint {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Seconds elapsed from `self` to `later` (negative if `later` is earlier)
    pub fn seconds_until(&self, later: &TrajectoryPoint) -> f64 {
        duration_seconds(later.timestamp - self.timestamp)
    }

    /// Check that coordinates are finite and within WGS-84 degree bounds.
    ///
    /// `index` is the position of this point in its sequence and is only used
    /// to build the error.
    pub fn validate(&self, index: usize) -> Result<(), ComputeError> {
        if !self.latitude.is_finite() {
            return Err(ComputeError::malformed(index, "latitude is not finite"));
        }
        if !self.longitude.is_finite() {
            return Err(ComputeError::malformed(index, "longitude is not finite"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ComputeError::malformed(
                index,
                format!("latitude {} outside [-90, 90]", self.latitude),
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ComputeError::malformed(
                index,
                format!("longitude {} outside [-180, 180]", self.longitude),
            ));
        }
        Ok(())
    }
}

/// A summarized dwell episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StayPoint {
    /// Mean latitude of the member points (degrees)
    pub latitude: f64,
    /// Mean longitude of the member points (degrees)
    pub longitude: f64,
    /// Timestamp of the first member point
    pub arrival: DateTime<Utc>,
    /// Timestamp of the last member point
    pub departure: DateTime<Utc>,
}

impl StayPoint {
    /// Time spent at this stay point
    pub fn dwell(&self) -> Duration {
        self.departure - self.arrival
    }

    /// Dwell time in (fractional) seconds
    pub fn dwell_seconds(&self) -> f64 {
        duration_seconds(self.dwell())
    }
}

/// Contiguous index span `[start, end)` that qualified as a stay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRange {
    /// Anchor index (first member)
    pub start: usize,
    /// Probe index (first point outside the radius, excluded)
    pub end: usize,
}

impl CandidateRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

fn duration_seconds(duration: Duration) -> f64 {
    duration.num_seconds() as f64 + f64::from(duration.subsec_nanos()) / 1e9
}
