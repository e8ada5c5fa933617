//! Session orchestration.
//!
//! [`TrackingSession`] wires the pipeline together: incoming fixes run
//! through the filter, accepted fixes feed the trajectory recorder and
//! the stay detector, and finalized state is handed to the snapshot
//! store. All collaborators are constructed explicitly and injected;
//! there is no ambient global state. Time comes from an injected
//! [`Clock`], session events go out through a [`SessionObserver`].
//!
//! Everything here assumes single-threaded cooperative dispatch: fix
//! arrival and timer ticks are never delivered in parallel, so the
//! store blob needs no locking. A multi-threaded embedding must wrap
//! the session in a mutex or a single-writer actor.

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{Result, SensorErrorCode};
use crate::filter::{evaluate, AcceptedFix, FilterVerdict, RejectReason};
use crate::stays::{StayDetector, StayOutcome};
use crate::store::{BlobStore, SnapshotInput, StoreStatus, TrajectoryStore};
use crate::trajectory::{Trajectory, TrajectoryRecorder};
use crate::{Fix, TrackerConfig};

/// Observer interface for session events, one method per event.
///
/// All methods default to no-ops so observers implement only what they
/// display.
pub trait SessionObserver {
    fn on_accepted(&mut self, _fix: &AcceptedFix) {}
    fn on_rejected(&mut self, _reason: &RejectReason) {}
    fn on_session_start(&mut self) {}
    fn on_session_stop(&mut self, _finalized: Option<&Trajectory>) {}
    fn on_session_pause(&mut self, _paused: bool) {}
    fn on_cluster_promoted(&mut self, _cluster: &crate::stays::StayCluster) {}
    fn on_current_position(&mut self, _fix: &Fix) {}
    fn on_sensor_error(&mut self, _code: SensorErrorCode, _message: &str) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// One logical tracking context: filter state, live recorder, stay
/// detector, finalized history and the durable store.
pub struct TrackingSession<B: BlobStore, C: Clock, O: SessionObserver> {
    config: TrackerConfig,
    clock: C,
    observer: O,
    store: TrajectoryStore<B>,

    recorder: TrajectoryRecorder,
    detector: StayDetector,
    prior_accepted: Option<AcceptedFix>,
    accepted_count: u32,

    tracking: bool,
    paused: bool,

    /// Finalized trajectories (loaded plus recorded this run).
    history: Vec<Trajectory>,
    total_distance_m: f64,

    last_autosave_ms: i64,
    /// Deadline of an outstanding one-shot position request.
    position_deadline_ms: Option<i64>,
}

impl<B: BlobStore, C: Clock, O: SessionObserver> TrackingSession<B, C, O> {
    pub fn new(store: TrajectoryStore<B>, config: TrackerConfig, clock: C, observer: O) -> Self {
        Self {
            config,
            clock,
            observer,
            store,
            recorder: TrajectoryRecorder::new(),
            detector: StayDetector::new(),
            prior_accepted: None,
            accepted_count: 0,
            tracking: false,
            paused: false,
            history: Vec::new(),
            total_distance_m: 0.0,
            last_autosave_ms: 0,
            position_deadline_ms: None,
        }
    }

    // ------------------------------------------------------------------
    // Startup / state
    // ------------------------------------------------------------------

    /// Restore history and clusters from the durable snapshot. Corrupt
    /// or absent data leaves the session empty; never an error.
    pub fn restore(&mut self) -> Result<()> {
        if let Some(snapshot) = self.store.load()? {
            self.history = snapshot.trajectories.iter().map(Trajectory::from).collect();
            self.detector = StayDetector::from_clusters(snapshot.stay_clusters);
            self.total_distance_m = snapshot.total_distance_m;
            info!(
                "restored {} trajectories, {} clusters, {:.0} m total",
                self.history.len(),
                self.detector.clusters().len(),
                self.total_distance_m
            );
        }
        Ok(())
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn history(&self) -> &[Trajectory] {
        &self.history
    }

    pub fn clusters(&self) -> &[crate::stays::StayCluster] {
        self.detector.clusters()
    }

    pub fn total_distance_m(&self) -> f64 {
        self.total_distance_m
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Begin a tracking session. Fails if one is already live.
    pub fn start_tracking(&mut self) -> Result<()> {
        let now = self.clock.now_ms();
        self.recorder.start(now)?;
        self.tracking = true;
        self.paused = false;
        self.prior_accepted = None;
        self.accepted_count = 0;
        self.last_autosave_ms = now;
        self.observer.on_session_start();
        Ok(())
    }

    /// Stop the session and finalize the live trajectory.
    ///
    /// The stop is synchronous: the session leaves the tracking state
    /// before returning, so any fix delivered afterwards is rejected as
    /// late (`RejectReason::SessionInactive`): deterministically
    /// dropped in full, never half-applied.
    ///
    /// A finalized trajectory with fewer than 2 points is discarded.
    /// The updated snapshot is handed to the store as a debounced
    /// commit.
    pub fn stop_tracking(&mut self) -> Result<Option<Trajectory>> {
        let now = self.clock.now_ms();
        self.tracking = false;
        let finalized = self.recorder.finalize(now)?;
        self.recorder.reset();

        if let Some(trajectory) = &finalized {
            self.total_distance_m += trajectory.distance_m;
            self.history.push(trajectory.clone());
        }
        self.observer.on_session_stop(finalized.as_ref());

        self.store.request_commit(self.snapshot_input(), now);
        Ok(finalized)
    }

    /// Pause or resume fix intake. Paused fixes are dropped before the
    /// filter and reported as `RejectReason::Paused`.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            self.observer.on_session_pause(paused);
        }
    }

    /// Flush pending writes and stop. Call on forced shutdown so the
    /// debounced commit is not lost.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.tracking {
            self.stop_tracking()?;
        }
        self.store.flush(self.clock.now_ms())?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Fix intake
    // ------------------------------------------------------------------

    /// Feed one raw fix from the sensor into the pipeline.
    pub fn handle_fix(&mut self, fix: &Fix) -> Result<()> {
        // An outstanding one-shot request is answered by any fix.
        if self.position_deadline_ms.take().is_some() {
            self.observer.on_current_position(fix);
        }

        if !self.tracking {
            // Late fix after stop: dropped in full, deterministically.
            self.observer.on_rejected(&RejectReason::SessionInactive);
            return Ok(());
        }
        if self.paused {
            self.observer.on_rejected(&RejectReason::Paused);
            return Ok(());
        }

        match evaluate(fix, self.prior_accepted.as_ref(), self.accepted_count, &self.config) {
            FilterVerdict::Reject(reason) => {
                debug!("fix rejected: {:?}", reason);
                self.observer.on_rejected(&reason);
            }
            FilterVerdict::Accept(accepted) => {
                self.recorder.append(&accepted)?;
                if let StayOutcome::Updated {
                    index,
                    promoted_now: true,
                } = self.detector.observe(&accepted, &self.config)
                {
                    let cluster = self.detector.clusters()[index].clone();
                    self.observer.on_cluster_promoted(&cluster);
                }
                self.prior_accepted = Some(accepted);
                self.accepted_count += 1;
                self.observer.on_accepted(&accepted);
            }
        }
        Ok(())
    }

    /// Report a sensor error. `PermissionDenied` is session-fatal and
    /// stops tracking; the rest are surfaced while tracking continues.
    pub fn handle_sensor_error(&mut self, code: SensorErrorCode, message: &str) -> Result<()> {
        warn!("sensor error ({}): {}", code, message);
        self.observer.on_sensor_error(code, message);
        if code == SensorErrorCode::PermissionDenied && self.tracking {
            self.stop_tracking()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Drive time-based behavior: one-shot position timeout, periodic
    /// autosave of live state, and the store's debounce window. Called
    /// from the host's timer at any cadence.
    pub fn tick(&mut self) -> Result<()> {
        let now = self.clock.now_ms();

        if let Some(deadline) = self.position_deadline_ms {
            if now >= deadline {
                self.position_deadline_ms = None;
                self.observer.on_sensor_error(
                    SensorErrorCode::Timeout,
                    "no fix within position timeout",
                );
            }
        }

        if self.tracking && now - self.last_autosave_ms >= self.config.autosave_ms {
            self.last_autosave_ms = now;
            self.store.request_commit(self.snapshot_input(), now);
        }

        self.store.tick(now)?;
        Ok(())
    }

    /// Ask for one current-position callback. Fails over to a
    /// `Timeout` sensor error if no fix arrives within the configured
    /// deadline.
    pub fn request_current_position(&mut self) {
        self.position_deadline_ms = Some(self.clock.now_ms() + self.config.position_timeout_ms);
    }

    // ------------------------------------------------------------------
    // Store passthroughs
    // ------------------------------------------------------------------

    /// Current state (history, clusters, provisional live trajectory)
    /// as a snapshot input for the store.
    fn snapshot_input(&self) -> SnapshotInput {
        let mut trajectories = self.history.clone();

        // Include the live trajectory provisionally so a crash between
        // autosaves loses at most one debounce window, not the session.
        if let Some(live) = self.recorder.live() {
            if live.points.len() >= 2 {
                let mut provisional = live.clone();
                provisional.end_time_ms =
                    provisional.points.last().map(|p| p.timestamp_ms);
                trajectories.push(provisional);
            }
        }

        let live_distance = self.recorder.live().map_or(0.0, |t| t.distance_m);
        SnapshotInput {
            trajectories,
            stay_clusters: self.detector.clusters().to_vec(),
            total_distance_m: self.total_distance_m + live_distance,
        }
    }

    /// Export current state as a portable document. Read-only.
    pub fn export(&self) -> Result<String> {
        self.store.export(&self.snapshot_input(), self.clock.now_ms())
    }

    /// Import a previously exported document, replacing session state.
    /// Validation failures leave both the store and the session
    /// untouched.
    pub fn import(&mut self, document: &str) -> Result<()> {
        let snapshot = self.store.import(document)?;
        self.history = snapshot.trajectories.iter().map(Trajectory::from).collect();
        self.detector = StayDetector::from_clusters(snapshot.stay_clusters);
        self.total_distance_m = snapshot.total_distance_m;
        Ok(())
    }

    /// Clear all persisted and in-memory history. The previous blob is
    /// kept under the backup key.
    pub fn clear(&mut self) -> Result<()> {
        self.store.clear()?;
        self.history.clear();
        self.detector = StayDetector::new();
        self.total_distance_m = 0.0;
        Ok(())
    }

    /// Storage usage against the quota.
    pub fn storage_status(&self) -> Result<StoreStatus> {
        self.store.status()
    }

    /// Tear the session down into its store (for handing the blob
    /// backend to a new session).
    pub fn into_store(self) -> TrajectoryStore<B> {
        self.store
    }
}
