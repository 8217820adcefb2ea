//! Stay point encoding
//!
//! Converts detected stay points into renderable records (a circle of
//! `radius_meters` around the centroid, annotated with arrival, departure and
//! dwell time) and wraps them in a versioned report. Output is a pure function
//! of its inputs: the same stay points and parameters always encode to the
//! same bytes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StayPointParams;
use crate::error::ComputeError;
use crate::types::StayPoint;
use crate::{PRODUCER_NAME, STAYPOINTS_VERSION};

/// Output schema identifier
pub const OUTPUT_SCHEMA: &str = "staypoints.v1";

/// One stay point ready for rendering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StayPointRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
    /// departure - arrival
    pub dwell_seconds: f64,
    /// Radius of the circle to draw around the centroid
    pub radius_meters: f64,
}

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
}

/// Full detection report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StayPointReport {
    pub schema: String,
    pub producer: Producer,
    pub parameters: StayPointParams,
    /// Number of trajectory points that were scanned
    pub input_points: usize,
    pub stay_points: Vec<StayPointRecord>,
}

/// Encoder for stay point output
#[derive(Debug, Clone, Default)]
pub struct StayPointEncoder;

impl StayPointEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Build a renderable record for a single stay point
    pub fn record(&self, stay: &StayPoint, params: &StayPointParams) -> StayPointRecord {
        StayPointRecord {
            latitude: stay.latitude,
            longitude: stay.longitude,
            arrival: stay.arrival,
            departure: stay.departure,
            dwell_seconds: stay.dwell_seconds(),
            radius_meters: params.radius_meters,
        }
    }

    /// Build the full report
    pub fn encode(
        &self,
        stays: &[StayPoint],
        params: &StayPointParams,
        input_points: usize,
    ) -> StayPointReport {
        StayPointReport {
            schema: OUTPUT_SCHEMA.to_string(),
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: STAYPOINTS_VERSION.to_string(),
            },
            parameters: *params,
            input_points,
            stay_points: stays.iter().map(|s| self.record(s, params)).collect(),
        }
    }

    /// Encode the full report as compact JSON
    pub fn encode_to_json(
        &self,
        stays: &[StayPoint],
        params: &StayPointParams,
        input_points: usize,
    ) -> Result<String, ComputeError> {
        let report = self.encode(stays, params, input_points);
        serde_json::to_string(&report).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}
