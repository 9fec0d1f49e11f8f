//! Validation errors for canonical records.

use thiserror::Error;

/// Result type alias using ValidationError.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// A canonical record (or a value headed for one) broke a schema invariant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("source_station_id must not be empty")]
    EmptyStationId,

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },

    #[error("timestamp is not UTC: {0}")]
    NonUtcTimestamp(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("country code must be exactly 2 characters: {0:?}")]
    InvalidCountryCode(String),

    #[error("unknown data source: {0}")]
    UnknownSource(String),

    #[error("unknown pressure tendency: {0}")]
    UnknownTendency(String),
}
