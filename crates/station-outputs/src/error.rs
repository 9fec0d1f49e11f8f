//! Error types for the record sinks.

use thiserror::Error;

/// Errors a sink can report for a single write, flush or close.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Message bus error: {0}")]
    Bus(#[from] redis::RedisError),

    #[error("Sink {0} is closed")]
    Closed(String),

    #[error("Timed out waiting for {pending} pending deliveries")]
    FlushTimeout { pending: usize },
}

/// Result type for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;
