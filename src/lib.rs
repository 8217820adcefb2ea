//! StayPoints - stay-point detection over GPS trajectories
//!
//! Given a time-ordered trajectory, finds the places where the subject stayed
//! within a bounded radius for longer than a minimum duration, and
//! summarizes each one as a stay point (centroid, arrival, departure).
//!
//! Pipeline: raw positions → schema adapter → sequence validation →
//! segmentation scan → aggregation → report encoding.
//!
//! ## Modules
//!
//! - **Core**: `distance`, `segmentation`, `aggregator`, driven by `pipeline`
//! - **Boundaries**: `schema` (ingestion), `encoder` (output), `ffi` (C ABI)

pub mod aggregator;
pub mod config;
pub mod distance;
pub mod encoder;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod segmentation;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{StayPointParams, TrailingWindow};
pub use error::ComputeError;
pub use pipeline::{
    compute_stay_points, compute_stay_points_cancellable, compute_stay_points_with,
    trajectory_json_to_stay_points, StayPointDetector,
};
pub use segmentation::CancellationToken;
pub use types::{CandidateRange, StayPoint, TrajectoryPoint};

// Schema exports
pub use schema::{PositionAdapter, RawPosition, RawTimestamp, INPUT_SCHEMA};

/// Crate version embedded in every report
pub const STAYPOINTS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "staypoints";
