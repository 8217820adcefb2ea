//! Raw position records as produced by trajectory parsers
//!
//! Field names vary between producers (`lat`/`latitude`,
//! `lon`/`lng`/`longitude`, `time`/`timestamp`); all of them deserialize into
//! the same [`RawPosition`]. Every field is optional at this stage so that a
//! malformed record can be reported with its index instead of failing the
//! whole parse.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Input schema identifier
pub const INPUT_SCHEMA: &str = "staypoints.position.v1";

/// Timestamp as found in the wild
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Milliseconds since the Unix epoch
    EpochMillis(i64),
    /// Milliseconds since the Unix epoch written as a float (`1614592800000.0`)
    FractionalMillis(f64),
    /// RFC 3339 / ISO 8601 text
    Text(String),
}

impl RawTimestamp {
    /// Resolve to an absolute UTC instant.
    ///
    /// Text without an offset is taken as UTC.
    pub fn to_utc(&self) -> Result<DateTime<Utc>, ComputeError> {
        match self {
            RawTimestamp::EpochMillis(ms) => Utc
                .timestamp_millis_opt(*ms)
                .single()
                .ok_or_else(|| ComputeError::InvalidTimestamp(format!("{} ms out of range", ms))),
            RawTimestamp::FractionalMillis(ms) => fractional_millis_to_utc(*ms),
            RawTimestamp::Text(text) => parse_text_timestamp(text),
        }
    }
}

fn fractional_millis_to_utc(ms: f64) -> Result<DateTime<Utc>, ComputeError> {
    let out_of_range = || ComputeError::InvalidTimestamp(format!("{} ms out of range", ms));
    if !ms.is_finite() {
        return Err(out_of_range());
    }
    let secs = (ms / 1000.0).floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return Err(out_of_range());
    }
    // Sub-millisecond digits are kept down to the nanosecond
    let nanos = ((ms - secs * 1000.0) * 1_000_000.0).round().clamp(0.0, 999_999_999.0);
    Utc.timestamp_opt(secs as i64, nanos as u32)
        .single()
        .ok_or_else(out_of_range)
}

impl From<DateTime<Utc>> for RawTimestamp {
    fn from(ts: DateTime<Utc>) -> Self {
        RawTimestamp::Text(ts.to_rfc3339())
    }
}

fn parse_text_timestamp(text: &str) -> Result<DateTime<Utc>, ComputeError> {
    let trimmed = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(ComputeError::InvalidTimestamp(text.to_string()))
}

/// One position record before normalization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPosition {
    /// Latitude in degrees
    #[serde(default, alias = "lat", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude in degrees
    #[serde(
        default,
        alias = "lon",
        alias = "lng",
        skip_serializing_if = "Option::is_none"
    )]
    pub longitude: Option<f64>,
    /// Point in time
    #[serde(default, alias = "time", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<RawTimestamp>,
}

impl RawPosition {
    pub fn new(latitude: f64, longitude: f64, timestamp: impl Into<RawTimestamp>) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
            timestamp: Some(timestamp.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_field_names() {
        let raw: RawPosition =
            serde_json::from_str(r#"{"lat": 45.1, "lon": 9.2, "time": "2021-03-01T10:00:00Z"}"#)
                .unwrap();

        assert_eq!(raw.latitude, Some(45.1));
        assert_eq!(raw.longitude, Some(9.2));
        assert_eq!(
            raw.timestamp,
            Some(RawTimestamp::Text("2021-03-01T10:00:00Z".to_string()))
        );
    }

    #[test]
    fn test_long_field_names() {
        let raw: RawPosition = serde_json::from_str(
            r#"{"latitude": 45.1, "longitude": 9.2, "timestamp": 1614592800000}"#,
        )
        .unwrap();

        assert_eq!(raw.latitude, Some(45.1));
        assert_eq!(raw.longitude, Some(9.2));
        assert_eq!(raw.timestamp, Some(RawTimestamp::EpochMillis(1_614_592_800_000)));
    }

    #[test]
    fn test_float_epoch_millis() {
        let raw: RawPosition = serde_json::from_str(
            r#"{"lat": 45.1, "lon": 9.2, "time": 1614592800000.0}"#,
        )
        .unwrap();
        assert_eq!(raw.timestamp, Some(RawTimestamp::FractionalMillis(1_614_592_800_000.0)));
        assert_eq!(
            raw.timestamp.unwrap().to_utc().unwrap(),
            Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap()
        );

        let half = RawTimestamp::FractionalMillis(1_614_592_800_000.5).to_utc().unwrap();
        assert_eq!(half.timestamp_subsec_micros(), 500);
    }

    #[test]
    fn test_non_finite_float_millis_rejected() {
        assert!(matches!(
            RawTimestamp::FractionalMillis(f64::NAN).to_utc(),
            Err(ComputeError::InvalidTimestamp(_))
        ));
        assert!(RawTimestamp::FractionalMillis(1e300).to_utc().is_err());
    }

    #[test]
    fn test_lng_alias() {
        let raw: RawPosition = serde_json::from_str(r#"{"lat": 1.0, "lng": 2.0}"#).unwrap();
        assert_eq!(raw.longitude, Some(2.0));
        assert_eq!(raw.timestamp, None);
    }

    #[test]
    fn test_timestamp_forms_agree() {
        let expected = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();

        for raw in [
            RawTimestamp::EpochMillis(1_614_592_800_000),
            RawTimestamp::Text("2021-03-01T10:00:00Z".to_string()),
            RawTimestamp::Text("2021-03-01T11:00:00+01:00".to_string()),
            RawTimestamp::Text("2021-03-01T10:00:00.000".to_string()),
            RawTimestamp::Text("2021-03-01 10:00:00".to_string()),
        ] {
            assert_eq!(raw.to_utc().unwrap(), expected, "{:?}", raw);
        }
    }

    #[test]
    fn test_invalid_timestamp() {
        let raw = RawTimestamp::Text("yesterday".to_string());
        assert!(matches!(raw.to_utc(), Err(ComputeError::InvalidTimestamp(_))));
    }

    #[test]
    fn test_serialize_uses_canonical_names() {
        let ts = Utc.with_ymd_and_hms(2021, 3, 1, 10, 0, 0).unwrap();
        let json = serde_json::to_string(&RawPosition::new(1.0, 2.0, ts)).unwrap();

        assert!(json.contains("\"latitude\""));
        assert!(json.contains("\"longitude\""));
        assert!(json.contains("\"timestamp\""));
    }
}
