//! Canonical record types shared across the weather station pipeline.
//!
//! Every source client decodes into [`Observation`] and [`StationMetadata`],
//! and every sink and the sync engine consume them. Records are validated
//! on construction, so holding one means its ranges and timestamps are sane.

pub mod error;
pub mod observation;
pub mod source;
pub mod station;
pub mod time;

pub use error::{ValidationError, ValidationResult};
pub use observation::{Observation, Readings, OBSERVATION_COLUMNS};
pub use source::{DataSource, PressureTendency};
pub use station::{StationDetails, StationMetadata, METADATA_COLUMNS};
pub use time::{format_utc, parse_utc, Clock, ManualClock, SystemClock};
