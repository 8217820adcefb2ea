//! Detection parameters
//!
//! [`StayPointParams`] holds the two thresholds that drive a detection run,
//! plus the policy for a window left open when the trajectory ends.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Default spatial radius (meters)
pub const DEFAULT_RADIUS_METERS: f64 = 100.0;

/// Default minimum dwell duration (seconds)
pub const DEFAULT_MIN_DURATION_SECONDS: f64 = 60.0;

/// What to do with a window still inside the radius when the trajectory ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailingWindow {
    /// Never emit an unterminated stay; the scan retries one anchor at a time
    #[default]
    Discard,
    /// Close the open window at the last point if its duration qualifies
    Emit,
}

/// Thresholds for one detection run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StayPointParams {
    /// A point farther than this from the anchor ends the window (meters)
    pub radius_meters: f64,
    /// A window must last strictly longer than this to qualify (seconds)
    pub min_duration_seconds: f64,
    /// Handling of the open window at the end of the trajectory
    #[serde(default)]
    pub trailing_window: TrailingWindow,
}

impl Default for StayPointParams {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_RADIUS_METERS,
            min_duration_seconds: DEFAULT_MIN_DURATION_SECONDS,
            trailing_window: TrailingWindow::Discard,
        }
    }
}

impl StayPointParams {
    /// Build validated parameters
    pub fn new(radius_meters: f64, min_duration_seconds: f64) -> Result<Self, ComputeError> {
        let params = Self {
            radius_meters,
            min_duration_seconds,
            trailing_window: TrailingWindow::default(),
        };
        params.validate()?;
        Ok(params)
    }

    /// Same thresholds with a different trailing-window policy
    pub fn with_trailing_window(mut self, policy: TrailingWindow) -> Self {
        self.trailing_window = policy;
        self
    }

    /// Both thresholds must be finite and strictly positive
    pub fn validate(&self) -> Result<(), ComputeError> {
        check_positive("radius_meters", self.radius_meters)?;
        check_positive("min_duration_seconds", self.min_duration_seconds)
    }

    /// Load parameters from a JSON object; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let partial: PartialParams = serde_json::from_str(json)?;
        let defaults = Self::default();
        let params = Self {
            radius_meters: partial.radius_meters.unwrap_or(defaults.radius_meters),
            min_duration_seconds: partial
                .min_duration_seconds
                .unwrap_or(defaults.min_duration_seconds),
            trailing_window: partial.trailing_window.unwrap_or_default(),
        };
        params.validate()?;
        Ok(params)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}

#[derive(Deserialize)]
struct PartialParams {
    #[serde(default, alias = "radius", alias = "meters")]
    radius_meters: Option<f64>,
    #[serde(default, alias = "min_duration", alias = "seconds")]
    min_duration_seconds: Option<f64>,
    #[serde(default)]
    trailing_window: Option<TrailingWindow>,
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ComputeError> {
    // NaN fails the comparison as well
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ComputeError::InvalidParameter { name, value })
    }
}
