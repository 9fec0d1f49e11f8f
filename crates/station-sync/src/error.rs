//! Error types for replication and alerting.

use thiserror::Error;

/// Errors raised while syncing CSV logs or sending alerts.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Time-series write rejected ({status}): {message}")]
    Write { status: u16, message: String },

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Invalid row: {0}")]
    InvalidRow(String),
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
