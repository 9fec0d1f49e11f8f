//! Per-source configuration.
//!
//! Every struct deserializes from YAML with all fields optional; the
//! service layer also fills them from environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceError};

/// NOAA NDBC buoys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NdbcConfig {
    pub enabled: bool,
    /// Empty means every station in the station table.
    pub station_ids: Vec<String>,
    pub fetch_interval_secs: u64,
    pub request_delay_ms: u64,
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    pub base_url: String,
}

impl Default for NdbcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            station_ids: Vec::new(),
            fetch_interval_secs: 3600,
            request_delay_ms: 100,
            max_concurrent: 10,
            request_timeout_secs: 30,
            base_url: "https://www.ndbc.noaa.gov".to_string(),
        }
    }
}

/// NOAA Integrated Surface Database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IsdConfig {
    pub enabled: bool,
    /// ISO 3166 alpha-2 codes as used by isd-history (CTRY column).
    pub country_codes: Vec<String>,
    /// `USAF-WBAN` identifiers.
    pub station_ids: Vec<String>,
    pub fetch_interval_secs: u64,
    pub request_delay_ms: u64,
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    pub lookback_hours: i64,
    /// Years an ended station is still treated as active.
    pub active_grace_years: i32,
    /// Quality codes whose values are trusted.
    pub accepted_quality_flags: Vec<String>,
    pub base_url: String,
}

impl Default for IsdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            country_codes: Vec::new(),
            station_ids: Vec::new(),
            fetch_interval_secs: 3600,
            request_delay_ms: 50,
            max_concurrent: 20,
            request_timeout_secs: 60,
            lookback_hours: 24,
            active_grace_years: 2,
            accepted_quality_flags: vec!["1".to_string(), "5".to_string()],
            base_url: "https://www.ncei.noaa.gov".to_string(),
        }
    }
}

/// WMO OSCAR/Surface registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OscarConfig {
    pub enabled: bool,
    pub territories: Vec<String>,
    pub station_classes: Vec<String>,
    pub facility_types: Vec<String>,
    pub fetch_interval_secs: u64,
    pub api_timeout_secs: u64,
    pub items_per_page: u32,
    pub base_url: String,
}

impl Default for OscarConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            territories: Vec::new(),
            station_classes: Vec::new(),
            facility_types: Vec::new(),
            fetch_interval_secs: 86400,
            api_timeout_secs: 120,
            items_per_page: 50_000,
            base_url: "https://oscar.wmo.int/surface/rest/api".to_string(),
        }
    }
}

impl OscarConfig {
    pub fn has_filters(&self) -> bool {
        !(self.territories.is_empty()
            && self.station_classes.is_empty()
            && self.facility_types.is_empty())
    }
}

/// NOAA National Weather Service API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NwsConfig {
    pub enabled: bool,
    pub station_ids: Vec<String>,
    /// Two-letter state codes whose stations are polled.
    pub states: Vec<String>,
    pub fetch_interval_secs: u64,
    pub request_delay_ms: u64,
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_backoff_secs: u64,
    pub user_agent: String,
    pub base_url: String,
}

impl Default for NwsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            station_ids: Vec::new(),
            states: Vec::new(),
            fetch_interval_secs: 3600,
            request_delay_ms: 100,
            max_concurrent: 5,
            request_timeout_secs: 30,
            retry_attempts: 3,
            retry_backoff_secs: 5,
            user_agent: "weather-station-pipeline/0.1 (ops@example.org)".to_string(),
            base_url: "https://api.weather.gov".to_string(),
        }
    }
}

/// Where Open-Meteo gets its coordinates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    #[default]
    Configured,
    Oscar,
    Isd,
}

impl std::str::FromStr for LocationSource {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "configured" => Ok(LocationSource::Configured),
            "oscar" => Ok(LocationSource::Oscar),
            "isd" => Ok(LocationSource::Isd),
            other => Err(SourceError::InvalidConfig(format!(
                "unknown Open-Meteo station source: {other}"
            ))),
        }
    }
}

/// A hand-configured forecast location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl ConfiguredLocation {
    /// Parse `name:lat:lon[,name:lat:lon...]`.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        split_list(raw)
            .into_iter()
            .map(|entry| {
                let parts: Vec<&str> = entry.rsplitn(3, ':').collect();
                let [lon, lat, name] = parts.as_slice() else {
                    return Err(SourceError::InvalidConfig(format!(
                        "location must be name:lat:lon, got {entry:?}"
                    )));
                };
                let latitude = lat.trim().parse::<f64>().map_err(|e| {
                    SourceError::InvalidConfig(format!("latitude in {entry:?}: {e}"))
                })?;
                let longitude = lon.trim().parse::<f64>().map_err(|e| {
                    SourceError::InvalidConfig(format!("longitude in {entry:?}: {e}"))
                })?;
                Ok(ConfiguredLocation {
                    name: name.trim().to_string(),
                    latitude,
                    longitude,
                })
            })
            .collect()
    }
}

/// Open-Meteo current conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoConfig {
    pub enabled: bool,
    pub station_source: LocationSource,
    pub locations: Vec<ConfiguredLocation>,
    pub fetch_interval_secs: u64,
    pub request_delay_ms: u64,
    pub max_concurrent: usize,
    pub request_timeout_secs: u64,
    pub base_url: String,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            station_source: LocationSource::Configured,
            locations: Vec::new(),
            fetch_interval_secs: 3600,
            request_delay_ms: 100,
            max_concurrent: 5,
            request_timeout_secs: 30,
            base_url: "https://api.open-meteo.com/v1".to_string(),
        }
    }
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

pub(crate) fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" 41001, ,46042,"), vec!["41001", "46042"]);
        assert!(split_list("   ").is_empty());
    }

    #[test]
    fn test_parse_locations() {
        let locations =
            ConfiguredLocation::parse_list("Boston:42.36:-71.06, Denver:39.74:-104.99").unwrap();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].name, "Boston");
        assert_eq!(locations[1].longitude, -104.99);
    }

    #[test]
    fn test_parse_locations_rejects_malformed() {
        assert!(ConfiguredLocation::parse_list("Boston:42.36").is_err());
        assert!(ConfiguredLocation::parse_list("Boston:north:-71.06").is_err());
    }

    #[test]
    fn test_isd_defaults() {
        let config = IsdConfig::default();
        assert_eq!(config.accepted_quality_flags, vec!["1", "5"]);
        assert_eq!(config.active_grace_years, 2);
        assert_eq!(config.request_delay_ms, 50);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
station_ids: ["41001", "46042"]
max_concurrent: 4
"#;
        let config: NdbcConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.station_ids.len(), 2);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.fetch_interval_secs, 3600);
        assert!(config.enabled);
    }

    #[test]
    fn test_location_source_parse() {
        assert_eq!("OSCAR".parse::<LocationSource>().unwrap(), LocationSource::Oscar);
        assert!("metar".parse::<LocationSource>().is_err());
    }
}
