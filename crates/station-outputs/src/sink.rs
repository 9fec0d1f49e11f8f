//! The capability set every output implements.

use async_trait::async_trait;
use station_common::{Observation, StationMetadata};

use crate::error::Result;

/// A destination for canonical records.
///
/// Sinks are written independently of each other; a failure is reported
/// to the caller and never affects other sinks.
#[async_trait]
pub trait Sink: Send {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &str;

    async fn write_observation(&mut self, observation: &Observation) -> Result<()>;

    async fn write_metadata(&mut self, metadata: &StationMetadata) -> Result<()>;

    /// Push buffered records to their destination.
    async fn flush(&mut self) -> Result<()>;

    /// Final flush and release of resources. Writes after close fail.
    async fn close(&mut self) -> Result<()>;
}
