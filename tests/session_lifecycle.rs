//! End-to-end lifecycle scenarios over the full pipeline with a
//! file-backed store and a manually driven clock.

use std::sync::Once;

use track_recorder::{
    fade_style, Clock, Fix, GeoPoint, ManualClock, SensorErrorCode, TrackerConfig, TrackingSession,
    FileBlobStore, NullObserver, TrailColor, TrajectoryStore,
};

static INIT: Once = Once::new();

fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn fix(lat: f64, lng: f64, ts_ms: i64) -> Fix {
    Fix::new(GeoPoint::new(lat, lng), 10.0, Some(1.0), ts_ms)
}

fn file_session(
    dir: &std::path::Path,
    clock: &ManualClock,
) -> TrackingSession<FileBlobStore, ManualClock, NullObserver> {
    let blobs = FileBlobStore::new(dir).expect("blob dir");
    let store = TrajectoryStore::new(blobs, TrackerConfig::default());
    TrackingSession::new(store, TrackerConfig::default(), clock.clone(), NullObserver)
}

#[test]
fn record_persist_restore_across_process_restart() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);

    // First "process": walk a short route and shut down cleanly.
    {
        let mut session = file_session(dir.path(), &clock);
        session.restore().unwrap();
        session.start_tracking().unwrap();

        for i in 0..12 {
            let ts = clock.now_ms();
            session
                .handle_fix(&fix(37.5665 + i as f64 * 0.0005, 126.9780, ts))
                .unwrap();
            clock.advance(10_000);
        }

        let finalized = session.stop_tracking().unwrap().unwrap();
        assert_eq!(finalized.points.len(), 12);
        session.shutdown().unwrap();
    }

    // Second "process": state survives the restart.
    {
        let mut session = file_session(dir.path(), &clock);
        session.restore().unwrap();
        assert_eq!(session.history().len(), 1);
        assert!(session.total_distance_m() > 0.0);

        // The 12-point collinear walk was Douglas-Peucker compacted
        // before hitting disk.
        assert!(session.history()[0].points.len() < 12);

        let status = session.storage_status().unwrap();
        assert!(status.used_bytes > 0);
        assert!(status.percentage_used < 1.0);
    }
}

#[test]
fn corrupt_blob_recovers_to_empty_state() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);

    {
        let mut session = file_session(dir.path(), &clock);
        session.start_tracking().unwrap();
        let t0 = clock.now_ms();
        session.handle_fix(&fix(37.5665, 126.9780, t0)).unwrap();
        session.handle_fix(&fix(37.5670, 126.9785, t0 + 10_000)).unwrap();
        session.stop_tracking().unwrap();
        session.shutdown().unwrap();
    }

    // Truncate the blob on disk.
    let primary = dir.path().join("trajectory_store.json");
    std::fs::write(&primary, b"{\"schemaVersion\": 1, \"trajec").unwrap();

    let mut session = file_session(dir.path(), &clock);
    session.restore().unwrap();
    assert!(session.history().is_empty());
    assert!(!primary.exists());
    assert!(dir.path().join("trajectory_store.corrupt.json").exists());
}

#[test]
fn noisy_stream_filters_and_clusters() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = file_session(dir.path(), &clock);
    session.start_tracking().unwrap();

    // Cold start: a coarse first fix squeaks through the warm-up gate.
    let t0 = clock.now_ms();
    session
        .handle_fix(&Fix::new(GeoPoint::new(37.5665, 126.9780), 150.0, None, t0))
        .unwrap();

    // Linger at one spot for 70 minutes of good fixes.
    for _minute in 1..=70 {
        clock.advance(60_000);
        session
            .handle_fix(&fix(37.56651, 126.97801, clock.now_ms()))
            .unwrap();
    }

    // A teleport and a stale-accuracy fix both bounce.
    clock.advance(10_000);
    session
        .handle_fix(&fix(38.5665, 126.9780, clock.now_ms()))
        .unwrap();
    session
        .handle_fix(&Fix::new(
            GeoPoint::new(37.5665, 126.9780),
            150.0,
            None,
            clock.now_ms() + 1_000,
        ))
        .unwrap();

    let finalized = session.stop_tracking().unwrap().unwrap();
    // 1 cold-start fix + 70 dwell fixes; the two bad ones dropped.
    assert_eq!(finalized.points.len(), 71);

    // The dwell promoted exactly one stay cluster.
    let promoted: Vec<_> = session.clusters().iter().filter(|c| c.promoted).collect();
    assert_eq!(promoted.len(), 1);
    assert!(promoted[0].duration_ms >= 3_600_000);
}

#[test]
fn export_import_between_stores() {
    init_logging();
    let src_dir = tempfile::tempdir().unwrap();
    let dst_dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);

    let mut source = file_session(src_dir.path(), &clock);
    source.start_tracking().unwrap();
    let t0 = clock.now_ms();
    source.handle_fix(&fix(37.5665, 126.9780, t0)).unwrap();
    source.handle_fix(&fix(37.5670, 126.9785, t0 + 10_000)).unwrap();
    source.stop_tracking().unwrap();

    let document = source.export().unwrap();

    let mut target = file_session(dst_dir.path(), &clock);
    target.import(&document).unwrap();
    assert_eq!(target.history().len(), 1);

    // Garbage documents leave the target untouched.
    assert!(target.import("{\"schemaVersion\": \"one\"}").is_err());
    assert_eq!(target.history().len(), 1);
}

#[test]
fn permission_denied_is_fatal_and_flushes() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);
    let mut session = file_session(dir.path(), &clock);
    session.start_tracking().unwrap();
    let t0 = clock.now_ms();
    session.handle_fix(&fix(37.5665, 126.9780, t0)).unwrap();
    session.handle_fix(&fix(37.5670, 126.9785, t0 + 10_000)).unwrap();

    session
        .handle_sensor_error(SensorErrorCode::PermissionDenied, "revoked mid-session")
        .unwrap();
    assert!(!session.is_tracking());
    assert_eq!(session.history().len(), 1);

    session.shutdown().unwrap();
    assert!(session.storage_status().unwrap().used_bytes > 0);
}

#[test]
fn fade_styles_track_simulated_time() {
    let start = 1_700_000_000_000;
    assert_eq!(fade_style(start, start).color, TrailColor::White);
    assert_eq!(
        fade_style(start, start + 40_000_000).color,
        TrailColor::Green
    );
    assert_eq!(
        fade_style(start, start + 3 * 24 * 3_600 * 1_000).color,
        TrailColor::Orange
    );
    assert_eq!(
        fade_style(start, start + 60 * 24 * 3_600 * 1_000).color,
        TrailColor::Brown
    );
}
