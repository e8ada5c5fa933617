//! Live trajectory accumulation.
//!
//! [`TrajectoryRecorder`] owns the in-progress trajectory for one
//! tracking session: Idle → Live → Finalized. Distance is integrated
//! with the haversine metric as points are appended, so the stored
//! total always equals the pairwise sum over the stored points.

use log::debug;

use crate::error::{Result, TrackError};
use crate::filter::AcceptedFix;
use crate::geo_utils::haversine_distance;
use crate::GeoPoint;

/// One stored point of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub point: GeoPoint,
    pub timestamp_ms: i64,
    pub accuracy_m: f64,
}

/// An ordered, time-stamped sequence of accepted fixes for one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    /// Opaque unique token.
    pub id: String,
    pub points: Vec<TrackPoint>,
    pub start_time_ms: i64,
    /// Absent while the trajectory is live.
    pub end_time_ms: Option<i64>,
    /// Running haversine integral over consecutive points, meters.
    pub distance_m: f64,
}

/// Recorder state for one tracking session.
#[derive(Debug)]
enum RecorderState {
    Idle,
    Live(Trajectory),
    Finalized,
}

/// Accumulates accepted fixes into the live trajectory.
#[derive(Debug)]
pub struct TrajectoryRecorder {
    state: RecorderState,
    /// Monotonic counter folded into trajectory ids.
    sequence: u64,
}

impl TrajectoryRecorder {
    pub fn new() -> Self {
        Self {
            state: RecorderState::Idle,
            sequence: 0,
        }
    }

    /// Whether a trajectory is currently being recorded.
    pub fn is_live(&self) -> bool {
        matches!(self.state, RecorderState::Live(_))
    }

    /// The live trajectory, if any.
    pub fn live(&self) -> Option<&Trajectory> {
        match &self.state {
            RecorderState::Live(t) => Some(t),
            _ => None,
        }
    }

    /// Begin a new trajectory. Fails with [`TrackError::SessionActive`]
    /// if one is already live.
    pub fn start(&mut self, now_ms: i64) -> Result<&Trajectory> {
        if self.is_live() {
            return Err(TrackError::SessionActive);
        }
        self.sequence += 1;
        let id = format!("trk-{}-{}", now_ms, self.sequence);
        debug!("starting trajectory {}", id);
        self.state = RecorderState::Live(Trajectory {
            id,
            points: Vec::new(),
            start_time_ms: now_ms,
            end_time_ms: None,
            distance_m: 0.0,
        });
        match &self.state {
            RecorderState::Live(t) => Ok(t),
            _ => unreachable!(),
        }
    }

    /// Append an accepted fix to the live trajectory, integrating the
    /// haversine distance from the previous point.
    pub fn append(&mut self, fix: &AcceptedFix) -> Result<()> {
        let trajectory = match &mut self.state {
            RecorderState::Live(t) => t,
            _ => return Err(TrackError::SessionInactive),
        };

        if let Some(prev) = trajectory.points.last() {
            trajectory.distance_m += haversine_distance(&prev.point, &fix.point);
        }
        trajectory.points.push(TrackPoint {
            point: fix.point,
            timestamp_ms: fix.timestamp_ms,
            accuracy_m: fix.accuracy_m,
        });
        Ok(())
    }

    /// Finalize the live trajectory, setting its end time.
    ///
    /// Returns `Ok(None)` when fewer than 2 points were recorded: a
    /// single-point trajectory carries no route information and is
    /// discarded rather than persisted.
    pub fn finalize(&mut self, now_ms: i64) -> Result<Option<Trajectory>> {
        let state = std::mem::replace(&mut self.state, RecorderState::Finalized);
        let mut trajectory = match state {
            RecorderState::Live(t) => t,
            other => {
                self.state = other;
                return Err(TrackError::SessionInactive);
            }
        };

        if trajectory.points.len() < 2 {
            debug!(
                "discarding trajectory {} with {} point(s)",
                trajectory.id,
                trajectory.points.len()
            );
            return Ok(None);
        }

        trajectory.end_time_ms = Some(now_ms);
        debug!(
            "finalized trajectory {}: {} points, {:.0} m",
            trajectory.id,
            trajectory.points.len(),
            trajectory.distance_m
        );
        Ok(Some(trajectory))
    }

    /// Return to Idle so a new trajectory can be started.
    pub fn reset(&mut self) {
        self.state = RecorderState::Idle;
    }
}

impl Default for TrajectoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}
