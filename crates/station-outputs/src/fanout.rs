//! Broadcasts every record to every enabled sink.

use metrics::counter;
use station_common::{Observation, StationMetadata};
use tracing::{error, info};

use crate::config::OutputConfig;
use crate::csv_sink::CsvSink;
use crate::error::Result;
use crate::sink::Sink;
use crate::stream_sink::StreamSink;

/// Ordered set of sinks. A failing sink is logged and skipped; the rest
/// still receive the record.
#[derive(Default)]
pub struct OutputFanout {
    sinks: Vec<Box<dyn Sink>>,
}

impl OutputFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the sinks enabled in `config`.
    pub async fn from_config(config: &OutputConfig) -> Result<Self> {
        let mut fanout = Self::new();
        if config.csv.enabled {
            fanout.push(Box::new(CsvSink::new(&config.csv)?));
            info!(dir = %config.csv.output_dir.display(), "CSV output enabled");
        }
        if config.bus.enabled {
            fanout.push(Box::new(StreamSink::connect(&config.bus).await?));
            info!(url = %config.bus.url, "Stream output enabled");
        }
        Ok(fanout)
    }

    pub fn push(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns how many sinks accepted the record.
    pub async fn write_observation(&mut self, observation: &Observation) -> usize {
        let mut accepted = 0;
        for sink in &mut self.sinks {
            match sink.write_observation(observation).await {
                Ok(()) => accepted += 1,
                Err(e) => sink_failed(sink.name(), "write_observation", &e),
            }
        }
        accepted
    }

    /// Returns how many sinks accepted the record.
    pub async fn write_metadata(&mut self, metadata: &StationMetadata) -> usize {
        let mut accepted = 0;
        for sink in &mut self.sinks {
            match sink.write_metadata(metadata).await {
                Ok(()) => accepted += 1,
                Err(e) => sink_failed(sink.name(), "write_metadata", &e),
            }
        }
        accepted
    }

    pub async fn flush(&mut self) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush().await {
                sink_failed(sink.name(), "flush", &e);
            }
        }
    }

    pub async fn close(&mut self) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.close().await {
                sink_failed(sink.name(), "close", &e);
            }
        }
    }
}

fn sink_failed(sink: &str, operation: &'static str, e: &crate::error::SinkError) {
    error!(sink = %sink, operation, error = %e, "Sink operation failed");
    counter!("station_sink_failures_total", "sink" => sink.to_string()).increment(1);
}
