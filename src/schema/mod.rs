//! Trajectory ingestion schema
//!
//! External point representations are accepted here and normalized into the
//! canonical [`TrajectoryPoint`](crate::types::TrajectoryPoint) before the
//! detector ever sees them. The core itself only deals with the canonical
//! shape.

mod adapter;
mod raw_position;

pub use adapter::*;
pub use raw_position::*;
