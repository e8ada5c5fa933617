//! Unified error handling for the track-recorder library.
//!
//! Filter rejections are deliberately NOT errors: they are expected
//! signals surfaced through [`crate::session::SessionObserver`]. This
//! module covers the failures that callers must handle.

use thiserror::Error;

/// Sensor error codes reported by the fix source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorErrorCode {
    /// The user denied location access. Session-fatal.
    PermissionDenied,
    /// Position is temporarily unavailable. Tracking continues.
    Unavailable,
    /// A one-shot position request timed out. Tracking continues.
    Timeout,
    /// Anything else the sensor reports.
    Unknown,
}

impl std::fmt::Display for SensorErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorErrorCode::PermissionDenied => write!(f, "permission denied"),
            SensorErrorCode::Unavailable => write!(f, "position unavailable"),
            SensorErrorCode::Timeout => write!(f, "timeout"),
            SensorErrorCode::Unknown => write!(f, "unknown"),
        }
    }
}

/// Unified error type for track-recorder operations.
#[derive(Debug, Error)]
pub enum TrackError {
    /// A tracking session is already live.
    #[error("a tracking session is already active")]
    SessionActive,

    /// No tracking session is live.
    #[error("no tracking session is active")]
    SessionInactive,

    /// Serialized snapshot still exceeds the quota after eviction.
    /// Requires user action (manual deletion); never retried silently.
    #[error("storage quota exceeded: {used_bytes} of {quota_bytes} bytes")]
    QuotaExceeded { used_bytes: u64, quota_bytes: u64 },

    /// Durable-store read/write failure. Always surfaced, never swallowed:
    /// data loss is the worst-case outcome for this system.
    #[error("storage error: {message}")]
    Storage { message: String },

    /// An imported document failed validation. The existing store is
    /// left untouched.
    #[error("invalid import document: {message}")]
    InvalidImport { message: String },

    /// Snapshot (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Error reported by the fix source.
    #[error("sensor error ({code}): {message}")]
    Sensor {
        code: SensorErrorCode,
        message: String,
    },
}

impl TrackError {
    pub(crate) fn storage(message: impl Into<String>) -> Self {
        TrackError::Storage {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_import(message: impl Into<String>) -> Self {
        TrackError::InvalidImport {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        TrackError::Storage {
            message: err.to_string(),
        }
    }
}

/// Result type alias for track-recorder operations.
pub type Result<T> = std::result::Result<T, TrackError>;
