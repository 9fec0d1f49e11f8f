//! Open-Meteo current conditions.
//!
//! Open-Meteo is coordinate based, so "stations" are locations: either
//! configured by hand or borrowed from the OSCAR or ISD registries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde::Deserialize;
use station_common::{DataSource, Observation, Readings, StationMetadata};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::client::{SourceClient, StationRef};
use crate::config::{millis, secs, LocationSource, OpenMeteoConfig};
use crate::error::{Result, SourceError};
use crate::gate::ConcurrencyGate;
use crate::http::{join_url, HttpFetcher, HttpOptions};
use crate::isd::IsdClient;
use crate::oscar::OscarClient;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,precipitation,weather_code,\
cloud_cover,pressure_msl,wind_speed_10m,wind_direction_10m,wind_gusts_10m";

/// A point to request current conditions for.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl StationRef for Location {
    fn station_id(&self) -> &str {
        &self.id
    }
}

impl Location {
    /// Identifier for a hand-configured point.
    pub fn configured(name: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            id: format!("cfg_{latitude:.4}_{longitude:.4}"),
            name: name.to_string(),
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<Current>,
}

#[derive(Debug, Deserialize)]
struct Current {
    time: Option<String>,
    temperature_2m: Option<f64>,
    relative_humidity_2m: Option<f64>,
    precipitation: Option<f64>,
    weather_code: Option<i64>,
    cloud_cover: Option<f64>,
    pressure_msl: Option<f64>,
    wind_speed_10m: Option<f64>,
    wind_direction_10m: Option<f64>,
    wind_gusts_10m: Option<f64>,
}

/// Decode a `/forecast` response. `current.time` is naive and read as UTC.
pub fn parse_current(location_id: &str, body: &str) -> Result<Option<Observation>> {
    let response: ForecastResponse =
        serde_json::from_str(body).map_err(|e| SourceError::parse("Open-Meteo response", e))?;
    let Some(current) = response.current else {
        return Ok(None);
    };
    let Some(time) = current.time.as_deref() else {
        return Ok(None);
    };
    let naive = NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(time, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|e| SourceError::parse("Open-Meteo time", e))?;
    let observed_at = DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc);

    let readings = Readings {
        air_temp_c: current.temperature_2m,
        relative_humidity_pct: current.relative_humidity_2m,
        pressure_hpa: current.pressure_msl,
        wind_speed_mps: current.wind_speed_10m,
        wind_direction_deg: current.wind_direction_10m.map(|d| d.round() as i32),
        wind_gust_mps: current.wind_gusts_10m,
        weather_code: current.weather_code.map(|code| code.to_string()),
        cloud_cover_pct: current.cloud_cover,
        precipitation_1h_mm: current.precipitation,
        ..Default::default()
    };

    Ok(Some(Observation::new(
        DataSource::OpenMeteo,
        location_id,
        observed_at,
        readings,
    )?))
}

/// Open-Meteo client.
pub struct OpenMeteoClient {
    config: OpenMeteoConfig,
    http: HttpFetcher,
    oscar: Option<Arc<OscarClient>>,
    isd: Option<Arc<IsdClient>>,
    locations: RwLock<Option<Vec<Location>>>,
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig) -> Result<Self> {
        let gate = ConcurrencyGate::new(config.max_concurrent, millis(config.request_delay_ms));
        let http = HttpFetcher::new(
            gate,
            HttpOptions {
                timeout: secs(config.request_timeout_secs),
                ..Default::default()
            },
        )?;
        Ok(Self {
            config,
            http,
            oscar: None,
            isd: None,
            locations: RwLock::new(None),
        })
    }

    /// Registry used when locations come from OSCAR.
    pub fn with_oscar(mut self, oscar: Arc<OscarClient>) -> Self {
        self.oscar = Some(oscar);
        self
    }

    /// Registry used when locations come from ISD.
    pub fn with_isd(mut self, isd: Arc<IsdClient>) -> Self {
        self.isd = Some(isd);
        self
    }

    async fn load_locations(&self) -> Result<Vec<Location>> {
        let locations: Vec<Location> = match self.config.station_source {
            LocationSource::Configured => self
                .config
                .locations
                .iter()
                .map(|l| Location::configured(&l.name, l.latitude, l.longitude))
                .collect(),
            LocationSource::Oscar => {
                let oscar = self.oscar.as_ref().ok_or_else(|| {
                    SourceError::InvalidConfig(
                        "Open-Meteo location source is oscar but no OSCAR client".into(),
                    )
                })?;
                let stations = oscar.filter(oscar.list_candidates().await?);
                stations
                    .into_iter()
                    .map(|s| Location {
                        id: format!("oscar_{}", s.wigos_id),
                        name: s.name.unwrap_or_else(|| s.wigos_id.clone()),
                        latitude: s.latitude,
                        longitude: s.longitude,
                    })
                    .collect()
            }
            LocationSource::Isd => {
                let isd = self.isd.as_ref().ok_or_else(|| {
                    SourceError::InvalidConfig(
                        "Open-Meteo location source is isd but no ISD client".into(),
                    )
                })?;
                let stations = isd.filter(isd.list_candidates().await?, Utc::now().year());
                stations
                    .into_iter()
                    .map(|s| {
                        let name = if s.name.is_empty() {
                            s.station_id().to_string()
                        } else {
                            s.name.clone()
                        };
                        Location {
                            id: format!("isd_{}", s.station_id()),
                            name,
                            latitude: s.latitude,
                            longitude: s.longitude,
                        }
                    })
                    .collect()
            }
        };
        info!(
            source = ?self.config.station_source,
            count = locations.len(),
            "Loaded Open-Meteo locations"
        );
        Ok(locations)
    }
}

#[async_trait]
impl SourceClient for OpenMeteoClient {
    type Station = Location;

    fn source(&self) -> DataSource {
        DataSource::OpenMeteo
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent
    }

    async fn list_candidates(&self) -> Result<Vec<Location>> {
        if let Some(cached) = self.locations.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let locations = self.load_locations().await?;
        *self.locations.write().await = Some(locations.clone());
        Ok(locations)
    }

    async fn resolve_stations(&self) -> Result<Vec<Location>> {
        self.list_candidates().await
    }

    #[instrument(skip(self, location), fields(location = %location.name))]
    async fn fetch_observation(&self, location: &Location) -> Result<Option<Observation>> {
        let url = join_url(&self.config.base_url, "forecast");
        let query = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("current", CURRENT_FIELDS.to_string()),
            ("wind_speed_unit", "ms".to_string()),
            ("timezone", "UTC".to_string()),
        ];
        match self.http.get_text(&url, &query).await? {
            Some(body) => parse_current(&location.id, &body),
            None => Ok(None),
        }
    }

    async fn fetch_metadata(&self, _location: &Location) -> Result<Option<StationMetadata>> {
        Ok(None)
    }

    async fn fetch_metadata_batch(&self, _locations: &[Location]) -> Vec<StationMetadata> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfiguredLocation;
    use test_utils::{assert_approx_eq, fixtures};

    #[test]
    fn test_configured_location_id() {
        let location = Location::configured("Boston", 42.36, -71.0589);
        assert_eq!(location.id, "cfg_42.3600_-71.0589");
    }

    #[test]
    fn test_parse_current_naive_time_is_utc() {
        let obs = parse_current("cfg_42.3600_-71.0589", fixtures::openmeteo::CURRENT)
            .unwrap()
            .unwrap();

        assert_eq!(obs.source(), DataSource::OpenMeteo);
        assert_eq!(obs.observed_at().to_rfc3339(), "2024-01-15T12:00:00+00:00");
        let r = obs.readings();
        assert_approx_eq!(r.air_temp_c.unwrap(), 3.4, 1e-9);
        assert_eq!(r.weather_code.as_deref(), Some("3"));
        assert_eq!(r.wind_direction_deg, Some(248));
        assert_approx_eq!(r.pressure_hpa.unwrap(), 1021.7, 1e-9);
        assert_eq!(r.dewpoint_c, None);
    }

    #[test]
    fn test_parse_without_current_block() {
        assert!(parse_current("x", r#"{"latitude": 1.0}"#).unwrap().is_none());
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(matches!(parse_current("x", "<html>"), Err(SourceError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_configured_locations_are_cached() {
        let config = OpenMeteoConfig {
            locations: vec![ConfiguredLocation {
                name: "Denver".into(),
                latitude: 39.74,
                longitude: -104.99,
            }],
            ..Default::default()
        };
        let client = OpenMeteoClient::new(config).unwrap();

        let first = client.resolve_stations().await.unwrap();
        let second = client.resolve_stations().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first[0].id, "cfg_39.7400_-104.9900");
    }

    #[tokio::test]
    async fn test_registry_source_requires_client() {
        let config = OpenMeteoConfig {
            station_source: LocationSource::Isd,
            ..Default::default()
        };
        let client = OpenMeteoClient::new(config).unwrap();
        assert!(matches!(client.resolve_stations().await, Err(SourceError::InvalidConfig(_))));
    }
}
