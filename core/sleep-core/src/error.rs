//! Error types for sleep-core operations.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Store Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// Failures raised by a [`crate::SleepStore`] implementation.
///
/// Each variant names the gateway call that failed; the payload is the
/// underlying driver message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open night store: {0}")]
    Open(String),

    #[error("Failed to insert night: {0}")]
    InsertFailed(String),

    #[error("Failed to read nights: {0}")]
    ReadFailed(String),

    #[error("Failed to update night: {0}")]
    UpdateFailed(String),

    #[error("Failed to clear nights: {0}")]
    ClearFailed(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tracker Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// All errors a [`crate::SleepTracker`] operation can return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Night {night_id} is still being tracked")]
    AlreadyTracking { night_id: i64 },

    #[error("Night not found: {0}")]
    NightNotFound(i64),

    #[error("Night {0} is still being tracked and cannot be rated")]
    NightInProgress(i64),

    #[error("Sleep quality must be between 0 and 5, got {0}")]
    InvalidQuality(i32),

    #[error("Tracker was closed")]
    Cancelled,

    #[error("Store task failed: {0}")]
    Task(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Configuration Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Convenience type alias for Results using TrackerError.
pub type Result<T> = std::result::Result<T, TrackerError>;
