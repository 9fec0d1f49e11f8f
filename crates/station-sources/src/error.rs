//! Error types for the source clients.

use station_common::ValidationError;
use thiserror::Error;

/// Errors that can occur while fetching or decoding upstream data.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    #[error("Decoded record failed validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SourceError {
    pub(crate) fn parse(what: &'static str, message: impl ToString) -> Self {
        SourceError::Parse {
            what,
            message: message.to_string(),
        }
    }

    /// The upstream answered but its record broke a schema invariant.
    pub fn is_validation(&self) -> bool {
        matches!(self, SourceError::Validation(_))
    }

    /// Map a transport error, keeping timeouts distinguishable.
    pub(crate) fn transport(url: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            SourceError::Timeout(url.to_string())
        } else {
            SourceError::Http(error)
        }
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
