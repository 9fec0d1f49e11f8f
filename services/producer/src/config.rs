//! Producer configuration.
//!
//! Loaded from a YAML file when `--config` is given, otherwise from
//! environment variables grouped by prefix (`CSV_`, `BUS_`, `NDBC_`,
//! `ISD_`, `OSCAR_`, `NWS_`, `OPENMETEO_`). Anything unset keeps its default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use station_outputs::OutputConfig;
use station_sources::config::split_list;
use station_sources::{
    ConfiguredLocation, IsdConfig, LocationSource, NdbcConfig, NwsConfig, OpenMeteoConfig,
    OscarConfig,
};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub output: OutputConfig,
    pub ndbc: NdbcConfig,
    pub isd: IsdConfig,
    pub oscar: OscarConfig,
    pub nws: NwsConfig,
    pub openmeteo: OpenMeteoConfig,
}

impl ProducerConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                let config = serde_yaml::from_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?;
                info!(path = %path.display(), "Loaded producer config");
                Ok(config)
            }
            None => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);
        let mut config = Self::default();

        let csv = &mut config.output.csv;
        env.set_bool("CSV_ENABLED", &mut csv.enabled);
        if let Some(dir) = env.get("CSV_OUTPUT_DIR") {
            csv.output_dir = PathBuf::from(dir);
        }
        env.set_string("CSV_OBSERVATIONS_PREFIX", &mut csv.observations_prefix);
        env.set_string("CSV_METADATA_PREFIX", &mut csv.metadata_prefix);
        env.set_parsed("CSV_BUFFER_SIZE", &mut csv.buffer_size)?;

        let bus = &mut config.output.bus;
        env.set_bool("BUS_ENABLED", &mut bus.enabled);
        env.set_string("BUS_URL", &mut bus.url);
        env.set_string("BUS_OBSERVATIONS_STREAM", &mut bus.observations_stream);
        env.set_string("BUS_METADATA_STREAM", &mut bus.metadata_stream);
        env.set_parsed("BUS_FLUSH_TIMEOUT_SECS", &mut bus.flush_timeout_secs)?;

        let ndbc = &mut config.ndbc;
        env.set_bool("NDBC_ENABLED", &mut ndbc.enabled);
        env.set_list("NDBC_STATION_IDS", &mut ndbc.station_ids);
        env.set_parsed("NDBC_FETCH_INTERVAL", &mut ndbc.fetch_interval_secs)?;
        env.set_parsed("NDBC_REQUEST_DELAY_MS", &mut ndbc.request_delay_ms)?;
        env.set_parsed("NDBC_MAX_CONCURRENT", &mut ndbc.max_concurrent)?;
        env.set_string("NDBC_BASE_URL", &mut ndbc.base_url);

        let isd = &mut config.isd;
        env.set_bool("ISD_ENABLED", &mut isd.enabled);
        env.set_list("ISD_COUNTRY_CODES", &mut isd.country_codes);
        env.set_list("ISD_STATION_IDS", &mut isd.station_ids);
        env.set_parsed("ISD_FETCH_INTERVAL", &mut isd.fetch_interval_secs)?;
        env.set_parsed("ISD_REQUEST_DELAY_MS", &mut isd.request_delay_ms)?;
        env.set_parsed("ISD_MAX_CONCURRENT", &mut isd.max_concurrent)?;
        env.set_parsed("ISD_LOOKBACK_HOURS", &mut isd.lookback_hours)?;
        env.set_parsed("ISD_ACTIVE_GRACE_YEARS", &mut isd.active_grace_years)?;
        env.set_list("ISD_QUALITY_FLAGS", &mut isd.accepted_quality_flags);
        env.set_string("ISD_BASE_URL", &mut isd.base_url);

        let oscar = &mut config.oscar;
        env.set_bool("OSCAR_ENABLED", &mut oscar.enabled);
        env.set_list("OSCAR_TERRITORIES", &mut oscar.territories);
        env.set_list("OSCAR_STATION_CLASSES", &mut oscar.station_classes);
        env.set_list("OSCAR_FACILITY_TYPES", &mut oscar.facility_types);
        env.set_parsed("OSCAR_FETCH_INTERVAL", &mut oscar.fetch_interval_secs)?;
        env.set_parsed("OSCAR_API_TIMEOUT", &mut oscar.api_timeout_secs)?;
        env.set_string("OSCAR_BASE_URL", &mut oscar.base_url);

        let nws = &mut config.nws;
        env.set_bool("NWS_ENABLED", &mut nws.enabled);
        env.set_list("NWS_STATION_IDS", &mut nws.station_ids);
        env.set_list("NWS_STATES", &mut nws.states);
        env.set_parsed("NWS_FETCH_INTERVAL", &mut nws.fetch_interval_secs)?;
        env.set_parsed("NWS_REQUEST_DELAY_MS", &mut nws.request_delay_ms)?;
        env.set_parsed("NWS_MAX_CONCURRENT", &mut nws.max_concurrent)?;
        env.set_string("NWS_USER_AGENT", &mut nws.user_agent);
        env.set_string("NWS_BASE_URL", &mut nws.base_url);

        let openmeteo = &mut config.openmeteo;
        env.set_bool("OPENMETEO_ENABLED", &mut openmeteo.enabled);
        if let Some(raw) = env.get("OPENMETEO_STATION_SOURCE") {
            openmeteo.station_source = raw
                .parse::<LocationSource>()
                .context("OPENMETEO_STATION_SOURCE")?;
        }
        if let Some(raw) = env.get("OPENMETEO_LOCATIONS") {
            openmeteo.locations =
                ConfiguredLocation::parse_list(&raw).context("OPENMETEO_LOCATIONS")?;
        }
        env.set_parsed("OPENMETEO_FETCH_INTERVAL", &mut openmeteo.fetch_interval_secs)?;
        env.set_parsed("OPENMETEO_REQUEST_DELAY_MS", &mut openmeteo.request_delay_ms)?;
        env.set_parsed("OPENMETEO_MAX_CONCURRENT", &mut openmeteo.max_concurrent)?;
        env.set_string("OPENMETEO_BASE_URL", &mut openmeteo.base_url);

        Ok(config)
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn set_string(&self, key: &str, target: &mut String) {
        if let Some(value) = self.get(key) {
            *target = value;
        }
    }

    fn set_bool(&self, key: &str, target: &mut bool) {
        if let Some(value) = self.get(key) {
            *target = matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes");
        }
    }

    fn set_list(&self, key: &str, target: &mut Vec<String>) {
        if let Some(value) = self.get(key) {
            *target = split_list(&value);
        }
    }

    fn set_parsed<T>(&self, key: &str, target: &mut T) -> Result<()>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        if let Some(value) = self.get(key) {
            *target = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid value for {key}: {value:?}"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_empty_env_gives_defaults() {
        let config = ProducerConfig::from_lookup(|_| None).unwrap();
        assert!(config.ndbc.enabled);
        assert!(config.isd.enabled);
        assert!(config.oscar.enabled);
        assert!(!config.nws.enabled);
        assert!(!config.openmeteo.enabled);
        assert!(config.output.csv.enabled);
        assert!(!config.output.bus.enabled);
    }

    #[test]
    fn test_env_overrides() {
        let config = ProducerConfig::from_lookup(lookup(&[
            ("CSV_OUTPUT_DIR", "/srv/weather"),
            ("BUS_ENABLED", "true"),
            ("NDBC_STATION_IDS", "41001, 46042"),
            ("ISD_COUNTRY_CODES", "US,CA"),
            ("ISD_ACTIVE_GRACE_YEARS", "3"),
            ("NWS_ENABLED", "1"),
            ("NWS_STATES", "NY,MA"),
            ("OPENMETEO_STATION_SOURCE", "oscar"),
            ("OPENMETEO_LOCATIONS", "Boston:42.36:-71.06"),
        ]))
        .unwrap();

        assert_eq!(config.output.csv.output_dir, PathBuf::from("/srv/weather"));
        assert!(config.output.bus.enabled);
        assert_eq!(config.ndbc.station_ids, vec!["41001", "46042"]);
        assert_eq!(config.isd.country_codes, vec!["US", "CA"]);
        assert_eq!(config.isd.active_grace_years, 3);
        assert!(config.nws.enabled);
        assert_eq!(config.nws.states, vec!["NY", "MA"]);
        assert_eq!(config.openmeteo.station_source, LocationSource::Oscar);
        assert_eq!(config.openmeteo.locations.len(), 1);
    }

    #[test]
    fn test_bad_number_is_an_error() {
        let result = ProducerConfig::from_lookup(lookup(&[("NDBC_MAX_CONCURRENT", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_yaml_sections() {
        let yaml = r#"
output:
  csv:
    output_dir: /tmp/obs
  bus:
    enabled: true
isd:
  country_codes: [GB]
nws:
  enabled: true
  station_ids: [KJFK]
"#;
        let config: ProducerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.output.csv.output_dir, PathBuf::from("/tmp/obs"));
        assert_eq!(config.output.csv.buffer_size, 100);
        assert!(config.output.bus.enabled);
        assert_eq!(config.isd.country_codes, vec!["GB"]);
        assert!(config.nws.enabled);
        assert_eq!(config.ndbc.fetch_interval_secs, 3600);
    }
}
