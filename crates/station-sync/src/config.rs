//! Sync, time-series store and alert configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// InfluxDB v2 connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    pub measurement: String,
    /// Points per write request.
    pub batch_size: usize,
    pub request_timeout_secs: u64,
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8086".to_string(),
            token: String::new(),
            org: "weather".to_string(),
            bucket: "weather-station".to_string(),
            measurement: "observation".to_string(),
            batch_size: 5000,
            request_timeout_secs: 30,
        }
    }
}

/// Which CSV logs to replicate and how often.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub data_dir: PathBuf,
    pub observations_prefix: String,
    /// Defaults to `{data_dir}/.sync_state.json`.
    pub progress_file: Option<PathBuf>,
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            observations_prefix: "observations".to_string(),
            progress_file: None,
            interval_secs: 300,
        }
    }
}

impl SyncConfig {
    pub fn progress_path(&self) -> PathBuf {
        self.progress_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(".sync_state.json"))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Staleness alerting through ntfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub ntfy_server: String,
    pub ntfy_topic: String,
    pub stale_threshold_minutes: f64,
    pub min_alert_interval_minutes: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ntfy_server: "https://ntfy.sh".to_string(),
            ntfy_topic: String::new(),
            stale_threshold_minutes: 60.0,
            min_alert_interval_minutes: 60,
        }
    }
}

impl AlertConfig {
    /// Alerts go out only when enabled and a topic is set.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.ntfy_topic.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_path_default() {
        let config = SyncConfig {
            data_dir: PathBuf::from("/srv/weather"),
            ..Default::default()
        };
        assert_eq!(config.progress_path(), PathBuf::from("/srv/weather/.sync_state.json"));
    }

    #[test]
    fn test_alerts_need_topic() {
        let mut config = AlertConfig::default();
        assert!(!config.is_active());
        config.ntfy_topic = "weather-alerts".to_string();
        assert!(config.is_active());
        config.enabled = false;
        assert!(!config.is_active());
    }

    #[test]
    fn test_influx_yaml_defaults() {
        let config: InfluxConfig = serde_yaml::from_str("bucket: buoys\n").unwrap();
        assert_eq!(config.bucket, "buoys");
        assert_eq!(config.batch_size, 5000);
        assert_eq!(config.org, "weather");
    }
}
