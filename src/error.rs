use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("Invalid date \"{input}\" (expected YYYYMMDD or YYYY-MM-DD)")]
    InvalidDate { input: String },

    #[error("Invalid timezone: {input}")]
    InvalidTimezone { input: String },

    #[error("Invalid usage JSON: {0}")]
    InvalidUsage(#[source] serde_json::Error),

    #[error("Failed to read snapshot {path}: {source}")]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No store configured (pass --redis-url or --snapshot)")]
    NoStore,

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures inside the pricing catalog. These never reach catalog callers;
/// each one moves the catalog to its next fallback tier.
#[derive(Debug, Error)]
pub(crate) enum PricingError {
    #[error("network error: {0}")]
    Http(#[from] ureq::Error),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("download timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("download task failed: {0}")]
    Task(String),

    #[error("invalid pricing data: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("pricing data has no usable model entries")]
    EmptyTable,

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("offline mode, remote feed disabled")]
    Offline,
}

impl PricingError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PricingError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("unsupported command in pipeline: {0}")]
    UnsupportedCommand(String),

    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}
