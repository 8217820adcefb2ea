//! Error types for stay-point detection

use thiserror::Error;

/// Errors that can occur during ingestion, computation or encoding
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid parameter {name}: {value} (must be finite and > 0)")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("Malformed point at index {index}: {reason}")]
    MalformedPoint { index: usize, reason: String },

    #[error("Cannot aggregate an empty window")]
    EmptyWindow,

    #[error("Computation cancelled before completion")]
    Cancelled,

    #[error("Failed to parse trajectory: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("GPX error: {0}")]
    GpxError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}

impl ComputeError {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        ComputeError::MalformedPoint {
            index,
            reason: reason.into(),
        }
    }
}
