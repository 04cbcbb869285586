//! Unified error handling for the sync runtime.

/// Failure of the local storage engine.
///
/// Reported to the caller as-is; the store never retries.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Engine error: {0}")]
    Engine(#[from] harbor_engine::Error),

    #[error("Storage quota exceeded ({capacity} records)")]
    QuotaExceeded { capacity: usize },

    #[error("Storage backend has not been opened")]
    NotOpen,
}

/// Failure reported by the remote record service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Remote rejected operation: {0}")]
    Rejected(String),
}

/// Error surfaced by the sync coordinator.
///
/// Remote failures are not errors here; a drain reports them in its
/// `DrainReport`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine error: {0}")]
    Engine(#[from] harbor_engine::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sync coordinator has been disposed")]
    Disposed,
}

/// Result type alias for storage calls.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for coordinator calls.
pub type Result<T> = std::result::Result<T, SyncError>;
