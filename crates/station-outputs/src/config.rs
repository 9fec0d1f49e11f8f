//! Sink configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rotating CSV files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
    pub observations_prefix: String,
    pub metadata_prefix: String,
    /// Records buffered before an explicit flush.
    pub buffer_size: usize,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: PathBuf::from("./data"),
            observations_prefix: "observations".to_string(),
            metadata_prefix: "metadata".to_string(),
            buffer_size: 100,
        }
    }
}

/// Redis Streams message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub enabled: bool,
    pub url: String,
    pub observations_stream: String,
    pub metadata_stream: String,
    pub flush_timeout_secs: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "redis://localhost:6379".to_string(),
            observations_stream: "weather.observation.raw".to_string(),
            metadata_stream: "weather.station.metadata".to_string(),
            flush_timeout_secs: 10,
        }
    }
}

impl BusConfig {
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_secs(self.flush_timeout_secs)
    }
}

/// Every configured output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub csv: CsvConfig,
    pub bus: BusConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OutputConfig::default();
        assert!(config.csv.enabled);
        assert!(!config.bus.enabled);
        assert_eq!(config.csv.buffer_size, 100);
        assert_eq!(config.bus.observations_stream, "weather.observation.raw");
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "csv:\n  output_dir: /var/lib/stations\nbus:\n  enabled: true\n";
        let config: OutputConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.csv.output_dir, PathBuf::from("/var/lib/stations"));
        assert_eq!(config.csv.metadata_prefix, "metadata");
        assert!(config.bus.enabled);
        assert_eq!(config.bus.flush_timeout(), Duration::from_secs(10));
    }
}
