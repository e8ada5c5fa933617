//! # Track Recorder
//!
//! GPS trajectory recording engine: fix filtering, stay clustering,
//! track simplification and durable storage.
//!
//! This library provides:
//! - Accuracy and implied-speed gating of raw geolocation fixes
//! - A live trajectory accumulator with running haversine distance
//! - Incremental stay-cluster detection with one-way promotion
//! - Iterative Douglas-Peucker simplification before persistence
//! - A debounced, quota-bounded, corruption-tolerant JSON snapshot store
//!
//! ## Quick Start
//!
//! ```rust
//! use track_recorder::{Fix, GeoPoint, TrackerConfig};
//! use track_recorder::filter::{evaluate, FilterVerdict};
//!
//! let config = TrackerConfig::default();
//! let fix = Fix::new(GeoPoint::new(37.5665, 126.9780), 10.0, Some(1.2), 1_700_000_000_000);
//!
//! match evaluate(&fix, None, 0, &config) {
//!     FilterVerdict::Accept(accepted) => println!("speed {} m/s", accepted.speed_mps.unwrap()),
//!     FilterVerdict::Reject(reason) => println!("rejected: {:?}", reason),
//! }
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, SensorErrorCode, TrackError};

// Clock abstraction (injected, never ambient)
pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

// Geographic utilities (haversine, polyline length, segment distance)
pub mod geo_utils;

// Fix gating (accuracy + implied speed)
pub mod filter;
pub use filter::{AcceptedFix, FilterVerdict, RejectReason};

// Live trajectory accumulation
pub mod trajectory;
pub use trajectory::{TrackPoint, Trajectory, TrajectoryRecorder};

// Stay-cluster detection
pub mod stays;
pub use stays::{StayCluster, StayDetector, StayOutcome};

// Douglas-Peucker track simplification
pub mod simplify;
pub use simplify::simplify_track;

// Durable snapshot store (debounce, quota, quarantine, import/export)
pub mod store;
pub use store::{
    BlobStore, FileBlobStore, MemoryBlobStore, PersistedSnapshot, SnapshotInput, StoreStatus,
    TrajectoryStore,
};

// Session orchestration (filter -> recorder -> stays -> store)
pub mod session;
pub use session::{NullObserver, SessionObserver, TrackingSession};

// Elapsed-time color/opacity mapping for trail display
pub mod fade;
pub use fade::{fade_style, TrailColor, TrailStyle};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use track_recorder::GeoPoint;
/// let point = GeoPoint::new(37.5665, 126.9780); // Seoul
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One raw geolocation sample. Immutable once created.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub point: GeoPoint,
    /// Reported horizontal accuracy radius in meters.
    pub accuracy_m: f64,
    /// Reported speed in m/s, if the sensor provides one.
    pub speed_mps: Option<f64>,
    /// Sample instant as epoch milliseconds.
    pub timestamp_ms: i64,
}

impl Fix {
    pub fn new(point: GeoPoint, accuracy_m: f64, speed_mps: Option<f64>, timestamp_ms: i64) -> Self {
        Self {
            point,
            accuracy_m,
            speed_mps,
            timestamp_ms,
        }
    }
}

/// Configuration for the recording pipeline.
///
/// All thresholds are injectable; `Default` carries the production values.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Accuracy gate while fewer than `warmup_fix_count` fixes have been
    /// accepted. Looser so a cold-start fix gets through under poor
    /// satellite lock. Default: 200.0 meters
    pub warmup_accuracy_m: f64,

    /// Accuracy gate once the session is warmed up.
    /// Default: 100.0 meters
    pub accuracy_m: f64,

    /// Number of accepted fixes before the accuracy gate tightens.
    /// Default: 5
    pub warmup_fix_count: u32,

    /// Maximum plausible speed between consecutive accepted fixes.
    /// Default: 55.6 m/s (~200 km/h)
    pub max_speed_mps: f64,

    /// Radius within which a fix joins an existing stay cluster.
    /// Default: 50.0 meters
    pub stay_radius_m: f64,

    /// Dwell time at which a stay cluster is promoted.
    /// Default: 3,600,000 ms (1 hour)
    pub stay_threshold_ms: i64,

    /// Tolerance for Douglas-Peucker simplification, in coordinate
    /// degrees. Default: 0.00001
    pub simplify_tolerance_deg: f64,

    /// Minimum point count before simplification is applied; shorter
    /// trajectories pass through unmodified. Default: 10
    pub simplify_min_points: usize,

    /// Hard byte ceiling for the durable snapshot.
    /// Default: 5 MiB
    pub quota_bytes: u64,

    /// Window over which commit requests coalesce into one write.
    /// Default: 1,000 ms
    pub debounce_ms: i64,

    /// Interval between automatic commits of live state.
    /// Default: 5,000 ms
    pub autosave_ms: i64,

    /// Trajectories older than this are evicted when over quota.
    /// Default: 30 days
    pub eviction_age_ms: i64,

    /// Deadline for a one-shot current-position request.
    /// Default: 15,000 ms
    pub position_timeout_ms: i64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            warmup_accuracy_m: 200.0,
            accuracy_m: 100.0,
            warmup_fix_count: 5,
            max_speed_mps: 55.6,
            stay_radius_m: 50.0,
            stay_threshold_ms: 3_600_000,
            simplify_tolerance_deg: 0.00001,
            simplify_min_points: 10,
            quota_bytes: 5 * 1024 * 1024,
            debounce_ms: 1_000,
            autosave_ms: 5_000,
            eviction_age_ms: 30 * 24 * 3_600 * 1_000,
            position_timeout_ms: 15_000,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(37.5665, 126.9780).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_default_config_production_constants() {
        let config = TrackerConfig::default();
        assert_eq!(config.quota_bytes, 5 * 1024 * 1024);
        assert_eq!(config.stay_threshold_ms, 3_600_000);
        assert_eq!(config.max_speed_mps, 55.6);
        assert_eq!(config.eviction_age_ms, 2_592_000_000);
    }
}
