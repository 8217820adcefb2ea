//! Segmentation scanner
//!
//! Single forward pass with two cursors over the trajectory:
//!
//! - `anchor` is the first point of the current candidate window.
//! - `probe` walks forward while points stay within `radius_meters` of the
//!   anchor (distance equal to the radius still counts as inside).
//!
//! When `probe` leaves the radius, the window `[anchor, probe)` qualifies if
//! the time from anchor to probe is strictly greater than
//! `min_duration_seconds`. Qualifying or not, the probe becomes the next
//! anchor. If the probe runs off the end without ever leaving the radius,
//! the anchor advances by one and the tail is rescanned; the open window is
//! only emitted under [`TrailingWindow::Emit`].
//!
//! Worst case is O(n²): a trajectory that hovers inside the radius without
//! ever qualifying rescans its tail once per anchor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{StayPointParams, TrailingWindow};
use crate::distance::distance;
use crate::error::ComputeError;
use crate::types::{CandidateRange, TrajectoryPoint};

/// Cooperative cancellation flag shared between a caller and a running scan.
///
/// The scan only looks at it before starting each anchor iteration, so a
/// cancelled computation never produces a half-evaluated window.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Produces the ordered candidate ranges of a trajectory
pub struct SegmentationScanner;

impl SegmentationScanner {
    /// Scan `points` and return every qualifying `[anchor, probe)` range.
    ///
    /// Expects validated parameters and a sequence ordered by timestamp.
    pub fn scan(points: &[TrajectoryPoint], params: &StayPointParams) -> Vec<CandidateRange> {
        let mut ranges = Vec::new();
        let mut anchor = 0;
        while anchor < points.len() {
            anchor = Self::step(points, params, anchor, &mut ranges);
        }
        ranges
    }

    /// Like [`SegmentationScanner::scan`], but aborts with
    /// [`ComputeError::Cancelled`] once `token` is observed as cancelled.
    pub fn scan_cancellable(
        points: &[TrajectoryPoint],
        params: &StayPointParams,
        token: &CancellationToken,
    ) -> Result<Vec<CandidateRange>, ComputeError> {
        let mut ranges = Vec::new();
        let mut anchor = 0;
        while anchor < points.len() {
            if token.is_cancelled() {
                tracing::debug!(anchor, "scan cancelled");
                return Err(ComputeError::Cancelled);
            }
            anchor = Self::step(points, params, anchor, &mut ranges);
        }
        Ok(ranges)
    }

    /// One anchor iteration. Returns the next anchor.
    fn step(
        points: &[TrajectoryPoint],
        params: &StayPointParams,
        anchor: usize,
        ranges: &mut Vec<CandidateRange>,
    ) -> usize {
        let origin = &points[anchor];

        for probe in anchor + 1..points.len() {
            if distance(origin, &points[probe]) > params.radius_meters {
                let elapsed = origin.seconds_until(&points[probe]);
                if elapsed > params.min_duration_seconds {
                    tracing::trace!(anchor, probe, elapsed, "candidate window qualified");
                    ranges.push(CandidateRange::new(anchor, probe));
                }
                return probe;
            }
        }

        // Probe ran off the end: every remaining point is inside the radius
        if params.trailing_window == TrailingWindow::Emit {
            if let Some(last) = points.last() {
                let elapsed = origin.seconds_until(last);
                if elapsed > params.min_duration_seconds {
                    tracing::trace!(anchor, elapsed, "trailing window closed");
                    ranges.push(CandidateRange::new(anchor, points.len()));
                    return points.len();
                }
            }
        }

        anchor + 1
    }
}
