//! Sync service configuration.
//!
//! From a YAML file when `--config` is given, otherwise from environment
//! variables. The data directory and file prefix are shared with the
//! producer's CSV settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use station_sync::{AlertConfig, InfluxConfig, SyncConfig};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub sync: SyncConfig,
    pub influxdb: InfluxConfig,
    pub alerts: AlertConfig,
}

impl ServiceConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Self::from_lookup(|key| std::env::var(key).ok());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!(path = %path.display(), "Loaded sync config");
        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("CSV_OUTPUT_DIR") {
            config.sync.data_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = get("CSV_OBSERVATIONS_PREFIX") {
            config.sync.observations_prefix = prefix;
        }
        if let Some(path) = get("SYNC_STATE_FILE") {
            config.sync.progress_file = Some(PathBuf::from(path));
        }
        if let Some(secs) = get("INFLUXDB_SYNC_INTERVAL") {
            config.sync.interval_secs = parse("INFLUXDB_SYNC_INTERVAL", &secs)?;
        }

        let influx = &mut config.influxdb;
        if let Some(url) = get("INFLUXDB_URL") {
            influx.url = url;
        }
        if let Some(token) = get("INFLUXDB_TOKEN") {
            influx.token = token;
        }
        if let Some(org) = get("INFLUXDB_ORG") {
            influx.org = org;
        }
        if let Some(bucket) = get("INFLUXDB_BUCKET") {
            influx.bucket = bucket;
        }
        if let Some(measurement) = get("INFLUXDB_MEASUREMENT") {
            influx.measurement = measurement;
        }
        if let Some(size) = get("INFLUXDB_BATCH_SIZE") {
            influx.batch_size = parse("INFLUXDB_BATCH_SIZE", &size)?;
        }

        let alerts = &mut config.alerts;
        if let Some(enabled) = get("ALERT_ENABLED") {
            alerts.enabled = matches!(enabled.trim().to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(server) = get("ALERT_NTFY_SERVER") {
            alerts.ntfy_server = server;
        }
        if let Some(topic) = get("ALERT_NTFY_TOPIC") {
            alerts.ntfy_topic = topic;
        }
        if let Some(minutes) = get("ALERT_STALE_THRESHOLD_MINUTES") {
            alerts.stale_threshold_minutes = parse("ALERT_STALE_THRESHOLD_MINUTES", &minutes)?;
        }
        if let Some(minutes) = get("ALERT_MIN_INTERVAL_MINUTES") {
            alerts.min_alert_interval_minutes = parse("ALERT_MIN_INTERVAL_MINUTES", &minutes)?;
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("Invalid value for {key}: {raw:?}"))
}
