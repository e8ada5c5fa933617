//! Durable snapshot store.
//!
//! Serializes finalized trajectories and stay clusters into one
//! versioned JSON blob behind a [`BlobStore`] backend, with:
//!
//! - **Debounced commits**: requests within the debounce window
//!   coalesce into a single write of the latest input. The store owns
//!   its pending-commit state; `tick` flushes an elapsed window and
//!   `flush` forces the write on shutdown.
//! - **Quota enforcement**: a serialized snapshot over the byte quota
//!   triggers one eviction of trajectories older than the eviction age
//!   and one retry; a second failure surfaces as `QuotaExceeded`.
//! - **Corruption recovery**: an unreadable blob is renamed to a
//!   quarantine key (never deleted) and load falls back to empty state.
//! - **Versioned import/export**: export adds a timestamp and
//!   environment tag without touching stored state; import validates
//!   the document before any mutation and backs up the current blob.
//!
//! Size is bounded by simplifying each trajectory before encoding and
//! rounding coordinates to 1e-6 degrees and distances to whole meters.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::simplify::simplify_track;
use crate::stays::StayCluster;
use crate::trajectory::{TrackPoint, Trajectory};
use crate::{GeoPoint, TrackerConfig};

/// Current durable-format version. Checked (warn-only) on load.
pub const SCHEMA_VERSION: u32 = 1;

/// Key of the primary snapshot blob.
pub const PRIMARY_KEY: &str = "trajectory_store.json";
/// Corrupt blobs are renamed here, never deleted outright.
pub const QUARANTINE_KEY: &str = "trajectory_store.corrupt.json";
/// `clear` and `import` park the previous blob here first.
pub const BACKUP_KEY: &str = "trajectory_store.backup.json";

// ============================================================================
// Snapshot types
// ============================================================================

/// One stored trajectory point, coordinates rounded to 1e-6 degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp_ms: i64,
    pub accuracy_m: f64,
}

/// One finalized trajectory as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTrajectory {
    pub id: String,
    pub points: Vec<StoredPoint>,
    pub start_time_ms: i64,
    pub end_time_ms: i64,
    /// Rounded to whole meters.
    pub distance_m: f64,
}

impl From<&StoredTrajectory> for Trajectory {
    fn from(stored: &StoredTrajectory) -> Self {
        Trajectory {
            id: stored.id.clone(),
            points: stored
                .points
                .iter()
                .map(|p| TrackPoint {
                    point: GeoPoint::new(p.latitude, p.longitude),
                    timestamp_ms: p.timestamp_ms,
                    accuracy_m: p.accuracy_m,
                })
                .collect(),
            start_time_ms: stored.start_time_ms,
            end_time_ms: Some(stored.end_time_ms),
            distance_m: stored.distance_m,
        }
    }
}

/// The durable blob: the only entity whose lifecycle is tied to
/// external storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSnapshot {
    pub schema_version: u32,
    pub trajectories: Vec<StoredTrajectory>,
    pub stay_clusters: Vec<StayCluster>,
    pub total_distance_m: f64,
    pub saved_at_epoch_ms: i64,
}

/// Exportable document: a snapshot plus provenance fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    #[serde(flatten)]
    pub snapshot: PersistedSnapshot,
    pub exported_at_epoch_ms: i64,
    pub environment: String,
}

/// Unrounded state handed to the store for a commit or export.
#[derive(Debug, Clone, Default)]
pub struct SnapshotInput {
    pub trajectories: Vec<Trajectory>,
    pub stay_clusters: Vec<StayCluster>,
    pub total_distance_m: f64,
}

/// Result of `status`: pure read, no mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreStatus {
    pub used_bytes: u64,
    pub quota_bytes: u64,
    pub percentage_used: f64,
}

fn round_coord(deg: f64) -> f64 {
    (deg * 1e6).round() / 1e6
}

// ============================================================================
// Blob backends
// ============================================================================

/// Key-value blob storage underneath the snapshot store.
///
/// `write` must be atomic from the caller's perspective: a reader sees
/// either the previous blob or the new one, never a partial write.
pub trait BlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn rename(&mut self, from: &str, to: &str) -> Result<()>;
    fn size(&self, key: &str) -> Result<Option<u64>>;
}

/// Directory-backed blob store. Writes go through a temp file and an
/// atomic rename.
#[derive(Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        let tmp = self.path(&format!("{key}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.path(key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        fs::rename(self.path(from), self.path(to))?;
        Ok(())
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        match fs::metadata(self.path(key)) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory blob store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<()> {
        self.blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        match self.blobs.remove(from) {
            Some(bytes) => {
                self.blobs.insert(to.to_string(), bytes);
                Ok(())
            }
            None => Err(TrackError::storage(format!("no blob under key '{from}'"))),
        }
    }

    fn size(&self, key: &str) -> Result<Option<u64>> {
        Ok(self.blobs.get(key).map(|b| b.len() as u64))
    }
}

// ============================================================================
// Trajectory store
// ============================================================================

#[derive(Debug)]
struct PendingCommit {
    input: SnapshotInput,
    deadline_ms: i64,
}

/// Debounced, quota-bounded snapshot store over a [`BlobStore`].
pub struct TrajectoryStore<B: BlobStore> {
    blobs: B,
    config: TrackerConfig,
    pending: Option<PendingCommit>,
}

impl<B: BlobStore> TrajectoryStore<B> {
    pub fn new(blobs: B, config: TrackerConfig) -> Self {
        Self {
            blobs,
            config,
            pending: None,
        }
    }

    // ------------------------------------------------------------------
    // Commit (debounced)
    // ------------------------------------------------------------------

    /// Request a commit. Requests within the debounce window coalesce;
    /// only the latest input is written, once the window elapses.
    pub fn request_commit(&mut self, input: SnapshotInput, now_ms: i64) {
        self.pending = Some(PendingCommit {
            input,
            deadline_ms: now_ms + self.config.debounce_ms,
        });
    }

    /// Drive the debounce timer. Performs the pending write when its
    /// window has elapsed. Returns whether a write happened.
    pub fn tick(&mut self, now_ms: i64) -> Result<bool> {
        match &self.pending {
            Some(pending) if now_ms >= pending.deadline_ms => self.flush(now_ms),
            _ => Ok(false),
        }
    }

    /// Force the pending write immediately (shutdown path). Returns
    /// whether a write happened.
    pub fn flush(&mut self, now_ms: i64) -> Result<bool> {
        match self.pending.take() {
            Some(pending) => {
                self.commit_now(&pending.input, now_ms)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the pending commit without writing.
    pub fn cancel_pending(&mut self) {
        self.pending = None;
    }

    /// True while a debounced commit is waiting for its window.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Serialize and write a snapshot immediately, bypassing the
    /// debounce. Over quota, evicts trajectories older than the
    /// eviction age and retries once before failing.
    pub fn commit_now(&mut self, input: &SnapshotInput, now_ms: i64) -> Result<()> {
        let mut snapshot = self.encode_snapshot(input, now_ms);
        let mut bytes = serde_json::to_vec(&snapshot)?;

        if bytes.len() as u64 > self.config.quota_bytes {
            let cutoff_ms = now_ms - self.config.eviction_age_ms;
            let before = snapshot.trajectories.len();
            snapshot.trajectories.retain(|t| t.start_time_ms >= cutoff_ms);
            warn!(
                "snapshot over quota ({} > {} bytes); evicted {} trajectories older than 30 days",
                bytes.len(),
                self.config.quota_bytes,
                before - snapshot.trajectories.len()
            );
            bytes = serde_json::to_vec(&snapshot)?;
            if bytes.len() as u64 > self.config.quota_bytes {
                return Err(TrackError::QuotaExceeded {
                    used_bytes: bytes.len() as u64,
                    quota_bytes: self.config.quota_bytes,
                });
            }
        }

        self.blobs.write(PRIMARY_KEY, &bytes)?;
        debug!("committed snapshot: {} bytes", bytes.len());
        Ok(())
    }

    fn encode_snapshot(&self, input: &SnapshotInput, now_ms: i64) -> PersistedSnapshot {
        PersistedSnapshot {
            schema_version: SCHEMA_VERSION,
            trajectories: input
                .trajectories
                .iter()
                .map(|t| self.encode_trajectory(t))
                .collect(),
            stay_clusters: input
                .stay_clusters
                .iter()
                .map(|c| StayCluster {
                    centroid: GeoPoint::new(
                        round_coord(c.centroid.latitude),
                        round_coord(c.centroid.longitude),
                    ),
                    ..c.clone()
                })
                .collect(),
            total_distance_m: input.total_distance_m.round(),
            saved_at_epoch_ms: now_ms,
        }
    }

    fn encode_trajectory(&self, trajectory: &Trajectory) -> StoredTrajectory {
        let compacted = simplify_track(&trajectory.points, &self.config);
        StoredTrajectory {
            id: trajectory.id.clone(),
            points: compacted
                .iter()
                .map(|p: &TrackPoint| StoredPoint {
                    latitude: round_coord(p.point.latitude),
                    longitude: round_coord(p.point.longitude),
                    timestamp_ms: p.timestamp_ms,
                    accuracy_m: p.accuracy_m,
                })
                .collect(),
            start_time_ms: trajectory.start_time_ms,
            end_time_ms: trajectory.end_time_ms.unwrap_or(trajectory.start_time_ms),
            distance_m: trajectory.distance_m.round(),
        }
    }

    // ------------------------------------------------------------------
    // Load / clear
    // ------------------------------------------------------------------

    /// Read the durable blob. Corruption never propagates: an
    /// undeserializable blob is renamed to the quarantine key and
    /// `None` is returned so the caller starts from empty state.
    pub fn load(&mut self) -> Result<Option<PersistedSnapshot>> {
        let bytes = match self.blobs.read(PRIMARY_KEY)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        match serde_json::from_slice::<PersistedSnapshot>(&bytes) {
            Ok(snapshot) => {
                if snapshot.schema_version != SCHEMA_VERSION {
                    // No migration path; loaded best-effort since the
                    // fields parsed.
                    warn!(
                        "snapshot schema version {} differs from current {}",
                        snapshot.schema_version, SCHEMA_VERSION
                    );
                }
                Ok(Some(snapshot))
            }
            Err(e) => {
                warn!("corrupt snapshot, quarantining: {}", e);
                self.blobs.rename(PRIMARY_KEY, QUARANTINE_KEY)?;
                Ok(None)
            }
        }
    }

    /// Back the current blob up under the backup key, then remove the
    /// primary key.
    pub fn clear(&mut self) -> Result<()> {
        if let Some(bytes) = self.blobs.read(PRIMARY_KEY)? {
            self.blobs.write(BACKUP_KEY, &bytes)?;
        }
        self.blobs.remove(PRIMARY_KEY)?;
        self.pending = None;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Import / export
    // ------------------------------------------------------------------

    /// Serialize the given state as an exportable JSON document with an
    /// export timestamp and environment tag. Stored state is untouched.
    pub fn export(&self, input: &SnapshotInput, now_ms: i64) -> Result<String> {
        let document = ExportDocument {
            snapshot: self.encode_snapshot(input, now_ms),
            exported_at_epoch_ms: now_ms,
            environment: format!("track-recorder/{}", env!("CARGO_PKG_VERSION")),
        };
        Ok(serde_json::to_string(&document)?)
    }

    /// Validate and install an exported document as the new snapshot.
    ///
    /// Validation happens before any mutation; a failing document
    /// leaves the existing store untouched. On success the previous
    /// blob (if any) is backed up first, then the primary key is
    /// overwritten atomically.
    pub fn import(&mut self, document: &str) -> Result<PersistedSnapshot> {
        let value: serde_json::Value = serde_json::from_str(document)
            .map_err(|e| TrackError::invalid_import(format!("not valid JSON: {e}")))?;

        let object = value
            .as_object()
            .ok_or_else(|| TrackError::invalid_import("top level is not an object"))?;

        if !object.get("schemaVersion").is_some_and(|v| v.is_u64()) {
            return Err(TrackError::invalid_import("missing numeric schemaVersion"));
        }
        if !object.get("trajectories").is_some_and(|v| v.is_array()) {
            return Err(TrackError::invalid_import("trajectories is not an array"));
        }
        if !object.get("stayClusters").is_some_and(|v| v.is_array()) {
            return Err(TrackError::invalid_import("stayClusters is not an array"));
        }
        if !object.get("totalDistanceM").is_some_and(|v| v.is_number()) {
            return Err(TrackError::invalid_import("totalDistanceM is not a number"));
        }

        let snapshot: PersistedSnapshot = serde_json::from_value(value)
            .map_err(|e| TrackError::invalid_import(format!("malformed snapshot: {e}")))?;

        if let Some(bytes) = self.blobs.read(PRIMARY_KEY)? {
            self.blobs.write(BACKUP_KEY, &bytes)?;
        }
        let bytes = serde_json::to_vec(&snapshot)?;
        self.blobs.write(PRIMARY_KEY, &bytes)?;
        debug!(
            "imported snapshot: {} trajectories, {} clusters",
            snapshot.trajectories.len(),
            snapshot.stay_clusters.len()
        );
        Ok(snapshot)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Storage usage against the quota. Pure read.
    pub fn status(&self) -> Result<StoreStatus> {
        let used_bytes = self.blobs.size(PRIMARY_KEY)?.unwrap_or(0);
        Ok(StoreStatus {
            used_bytes,
            quota_bytes: self.config.quota_bytes,
            percentage_used: used_bytes as f64 / self.config.quota_bytes as f64 * 100.0,
        })
    }

    /// Access the underlying blob backend (test hooks).
    pub fn blobs(&self) -> &B {
        &self.blobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_point(lat: f64, lng: f64, ts_ms: i64) -> TrackPoint {
        TrackPoint {
            point: GeoPoint::new(lat, lng),
            timestamp_ms: ts_ms,
            accuracy_m: 10.0,
        }
    }

    fn sample_trajectory(id: &str, start_ms: i64) -> Trajectory {
        let points = vec![
            track_point(37.5665001, 126.9780001, start_ms),
            track_point(37.5670002, 126.9785002, start_ms + 10_000),
            track_point(37.5675003, 126.9790003, start_ms + 20_000),
        ];
        let distance_m = crate::geo_utils::polyline_length(
            &points.iter().map(|p| p.point).collect::<Vec<_>>(),
        );
        Trajectory {
            id: id.to_string(),
            points,
            start_time_ms: start_ms,
            end_time_ms: Some(start_ms + 20_000),
            distance_m,
        }
    }

    fn sample_cluster(start_ms: i64) -> StayCluster {
        StayCluster {
            centroid: GeoPoint::new(37.5665001, 126.9780001),
            start_time_ms: start_ms,
            end_time_ms: start_ms + 4_000_000,
            duration_ms: 4_000_000,
            promoted: true,
        }
    }

    fn sample_input(now_ms: i64) -> SnapshotInput {
        let trajectory = sample_trajectory("trk-1", now_ms - 60_000);
        let total = trajectory.distance_m;
        SnapshotInput {
            trajectories: vec![trajectory],
            stay_clusters: vec![sample_cluster(now_ms - 60_000)],
            total_distance_m: total,
        }
    }

    fn memory_store() -> TrajectoryStore<MemoryBlobStore> {
        TrajectoryStore::new(MemoryBlobStore::new(), TrackerConfig::default())
    }

    #[test]
    fn test_commit_load_round_trip() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();

        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.schema_version, SCHEMA_VERSION);
        assert_eq!(snapshot.saved_at_epoch_ms, now);
        assert_eq!(snapshot.trajectories.len(), 1);
        assert_eq!(snapshot.stay_clusters.len(), 1);

        // Coordinates rounded to 1e-6 degrees, distances to whole meters
        let stored = &snapshot.trajectories[0];
        assert_eq!(stored.points.len(), 3);
        assert!((stored.points[0].latitude - 37.5665).abs() < 1e-6);
        assert_eq!(stored.distance_m, stored.distance_m.round());
        assert!(stored.distance_m > 0.0);
        assert!(snapshot.stay_clusters[0].promoted);
    }

    #[test]
    fn test_load_empty_store_returns_none() {
        let mut store = memory_store();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_debounce_coalesces_to_last_input() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;

        let mut first = sample_input(now);
        first.trajectories[0].id = "trk-first".to_string();
        let mut second = sample_input(now);
        second.trajectories[0].id = "trk-second".to_string();

        store.request_commit(first, now);
        store.request_commit(second, now + 300);

        // Window not elapsed: nothing written yet
        assert!(!store.tick(now + 500).unwrap());
        assert!(store.load().unwrap().is_none());

        // Window elapsed from the LAST request: one write, latest input
        assert!(store.tick(now + 1_300).unwrap());
        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.trajectories[0].id, "trk-second");
        assert!(!store.has_pending());
    }

    #[test]
    fn test_flush_forces_pending_write() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.request_commit(sample_input(now), now);

        assert!(store.flush(now).unwrap());
        assert!(store.load().unwrap().is_some());
        // Second flush is a no-op
        assert!(!store.flush(now).unwrap());
    }

    #[test]
    fn test_cancel_pending_drops_write() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.request_commit(sample_input(now), now);
        store.cancel_pending();
        assert!(!store.tick(now + 10_000).unwrap());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_quota_evicts_old_trajectories_and_retries() {
        let mut config = TrackerConfig::default();
        config.quota_bytes = 2_048;
        let mut store = TrajectoryStore::new(MemoryBlobStore::new(), config);

        let now: i64 = 1_700_000_000_000;
        let old_start = now - 40 * 24 * 3_600 * 1_000; // 40 days ago

        // Enough old bulk to blow a 2KiB quota; one fresh trajectory.
        let mut input = SnapshotInput::default();
        for i in 0..20 {
            input
                .trajectories
                .push(sample_trajectory(&format!("trk-old-{i}"), old_start));
        }
        input.trajectories.push(sample_trajectory("trk-fresh", now - 60_000));

        store.commit_now(&input, now).unwrap();
        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.trajectories.len(), 1);
        assert_eq!(snapshot.trajectories[0].id, "trk-fresh");
    }

    #[test]
    fn test_quota_failure_after_eviction_is_reported() {
        let mut config = TrackerConfig::default();
        config.quota_bytes = 256;
        let mut store = TrajectoryStore::new(MemoryBlobStore::new(), config);

        // All trajectories fresh: eviction removes nothing
        let now = 1_700_000_000_000;
        let err = store.commit_now(&sample_input(now), now);
        assert!(matches!(err, Err(TrackError::QuotaExceeded { .. })));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_blob_quarantined_not_crashed() {
        let mut store = memory_store();
        store
            .blobs
            .write(PRIMARY_KEY, b"{\"schemaVersion\": 1, \"trunca")
            .unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(store.blobs().read(PRIMARY_KEY).unwrap().is_none());
        assert!(store.blobs().read(QUARANTINE_KEY).unwrap().is_some());
    }

    #[test]
    fn test_schema_version_mismatch_is_nonfatal() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();

        // Rewrite the blob with a bumped version
        let mut snapshot = store.load().unwrap().unwrap();
        snapshot.schema_version = 99;
        let bytes = serde_json::to_vec(&snapshot).unwrap();
        store.blobs.write(PRIMARY_KEY, &bytes).unwrap();

        // Warn-only; data still loads
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.schema_version, 99);
        assert_eq!(loaded.trajectories.len(), 1);
    }

    #[test]
    fn test_clear_leaves_backup() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.blobs().read(BACKUP_KEY).unwrap().is_some());
    }

    #[test]
    fn test_export_does_not_mutate_state() {
        let store = memory_store();
        let now = 1_700_000_000_000;
        let document = store.export(&sample_input(now), now).unwrap();

        let value: serde_json::Value = serde_json::from_str(&document).unwrap();
        assert_eq!(value["exportedAtEpochMs"], now);
        assert!(value["environment"]
            .as_str()
            .unwrap()
            .starts_with("track-recorder/"));
        assert_eq!(value["schemaVersion"], SCHEMA_VERSION);
        assert!(store.blobs().read(PRIMARY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_import_round_trip() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        let document = store.export(&sample_input(now), now).unwrap();

        let imported = store.import(&document).unwrap();
        assert_eq!(imported.trajectories.len(), 1);

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, imported);
    }

    #[test]
    fn test_import_rejects_invalid_without_mutation() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();
        let before = store.blobs().read(PRIMARY_KEY).unwrap();

        for bad in [
            "not json at all",
            "[1, 2, 3]",
            r#"{"trajectories": [], "stayClusters": [], "totalDistanceM": 0}"#,
            r#"{"schemaVersion": 1, "trajectories": {}, "stayClusters": [], "totalDistanceM": 0}"#,
            r#"{"schemaVersion": 1, "trajectories": [], "stayClusters": [], "totalDistanceM": "x"}"#,
        ] {
            let err = store.import(bad);
            assert!(matches!(err, Err(TrackError::InvalidImport { .. })), "{bad}");
        }

        // Existing blob untouched, no backup written by failed imports
        assert_eq!(store.blobs().read(PRIMARY_KEY).unwrap(), before);
        assert!(store.blobs().read(BACKUP_KEY).unwrap().is_none());
    }

    #[test]
    fn test_import_backs_up_previous_blob() {
        let mut store = memory_store();
        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();
        let before = store.blobs().read(PRIMARY_KEY).unwrap();

        let document = store.export(&sample_input(now + 60_000), now + 60_000).unwrap();
        store.import(&document).unwrap();
        assert_eq!(store.blobs().read(BACKUP_KEY).unwrap(), before);
    }

    #[test]
    fn test_status_reports_usage() {
        let mut store = memory_store();
        let status = store.status().unwrap();
        assert_eq!(status.used_bytes, 0);
        assert_eq!(status.percentage_used, 0.0);

        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();
        let status = store.status().unwrap();
        assert!(status.used_bytes > 0);
        assert_eq!(status.quota_bytes, 5 * 1024 * 1024);
        assert!(status.percentage_used > 0.0);
    }

    #[test]
    fn test_file_store_round_trip_and_quarantine() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = FileBlobStore::new(dir.path()).unwrap();
        let mut store = TrajectoryStore::new(blobs, TrackerConfig::default());

        let now = 1_700_000_000_000;
        store.commit_now(&sample_input(now), now).unwrap();
        assert!(store.load().unwrap().is_some());

        // Truncate the file on disk to corrupt it
        let path = dir.path().join(PRIMARY_KEY);
        fs::write(&path, b"{\"schemaVersion\":").unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(!path.exists());
        assert!(dir.path().join(QUARANTINE_KEY).exists());
    }

    #[test]
    fn test_long_trajectory_is_compacted_on_commit() {
        let mut store = memory_store();
        let now: i64 = 1_700_000_000_000;

        // 100 collinear points: simplification collapses the interior
        let points: Vec<TrackPoint> = (0..100)
            .map(|i| track_point(37.5665 + i as f64 * 0.0001, 126.9780, now + i * 1_000))
            .collect();
        let distance_m = crate::geo_utils::polyline_length(
            &points.iter().map(|p| p.point).collect::<Vec<_>>(),
        );
        let input = SnapshotInput {
            trajectories: vec![Trajectory {
                id: "trk-long".to_string(),
                points,
                start_time_ms: now,
                end_time_ms: Some(now + 100_000),
                distance_m,
            }],
            stay_clusters: vec![],
            total_distance_m: distance_m,
        };

        store.commit_now(&input, now).unwrap();
        let snapshot = store.load().unwrap().unwrap();
        assert!(snapshot.trajectories[0].points.len() < 100);
        assert_eq!(snapshot.trajectories[0].points.len(), 2);
    }
}
