//! NOAA National Weather Service API (api.weather.gov).
//!
//! Responses are GeoJSON. Quantities arrive as `{value, unitCode}` pairs
//! and are normalized to the canonical units here.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use station_common::{DataSource, Observation, Readings, StationDetails, StationMetadata};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::client::{SourceClient, StationRef};
use crate::config::{millis, secs, NwsConfig};
use crate::error::{Result, SourceError};
use crate::gate::ConcurrencyGate;
use crate::http::{join_url, HttpFetcher, HttpOptions, RetryPolicy};

const GEO_JSON: &str = "application/geo+json";

/// An NWS station. Configured identifiers start out bare, without a location.
#[derive(Debug, Clone, PartialEq)]
pub struct NwsStation {
    pub station_id: String,
    pub name: Option<String>,
    pub location: Option<(f64, f64)>,
    pub elevation_m: Option<f64>,
    pub state: Option<String>,
    pub timezone: Option<String>,
}

impl NwsStation {
    pub fn bare(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            name: None,
            location: None,
            elevation_m: None,
            state: None,
            timezone: None,
        }
    }

    pub fn to_metadata(&self) -> Result<Option<StationMetadata>> {
        let Some((latitude, longitude)) = self.location else {
            return Ok(None);
        };
        let details = StationDetails {
            wmo_id: None,
            name: self.name.clone(),
            elevation_m: self.elevation_m,
            country_code: Some("US".to_string()),
            state_province: self.state.clone(),
            station_type: Some("asos".to_string()),
            owner: Some("NOAA/NWS".to_string()),
        };
        Ok(Some(StationMetadata::new(
            DataSource::Nws,
            self.station_id.clone(),
            latitude,
            longitude,
            details,
        )?))
    }
}

impl StationRef for NwsStation {
    fn station_id(&self) -> &str {
        &self.station_id
    }
}

/// Parse one GeoJSON station feature.
pub fn parse_station_feature(feature: &Value) -> Option<NwsStation> {
    let props = feature.get("properties")?;
    let station_id = props
        .get("stationIdentifier")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())?;
    let coords = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array)?;
    let (lon, lat) = (coords.first()?.as_f64()?, coords.get(1)?.as_f64()?);

    let text = |key: &str| props.get(key).and_then(Value::as_str).map(str::to_string);
    Some(NwsStation {
        station_id: station_id.to_string(),
        name: text("name"),
        location: Some((lat, lon)),
        elevation_m: props
            .get("elevation")
            .and_then(|e| e.get("value"))
            .and_then(Value::as_f64),
        state: text("state"),
        timezone: text("timeZone"),
    })
}

/// Parse a `/stations?state=XX` feature collection.
pub fn parse_station_list(collection: &Value) -> Vec<NwsStation> {
    collection
        .get("features")
        .and_then(Value::as_array)
        .map(|features| features.iter().filter_map(parse_station_feature).collect())
        .unwrap_or_default()
}

/// Read a `{value, unitCode}` quantity in canonical units.
fn quantity(props: &Value, field: &str) -> Option<f64> {
    let q = props.get(field)?.as_object()?;
    let value = q.get("value")?.as_f64().filter(|v| v.is_finite())?;
    let unit = q.get("unitCode").and_then(Value::as_str).unwrap_or_default();
    Some(match unit.rsplit(':').next().unwrap_or_default() {
        "Pa" => value / 100.0,
        "km_h-1" => value / 3.6,
        _ => value,
    })
}

/// Decode a `/stations/{id}/observations/latest` response.
pub fn parse_latest_observation(station_id: &str, body: &Value) -> Result<Option<Observation>> {
    let Some(props) = body.get("properties").filter(|p| p.is_object()) else {
        return Ok(None);
    };
    let Some(timestamp) = props.get("timestamp").and_then(Value::as_str) else {
        return Ok(None);
    };
    let observed_at = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| SourceError::parse("NWS timestamp", e))?
        .with_timezone(&Utc);

    let readings = Readings {
        air_temp_c: quantity(props, "temperature"),
        dewpoint_c: quantity(props, "dewpoint"),
        relative_humidity_pct: quantity(props, "relativeHumidity"),
        pressure_hpa: quantity(props, "seaLevelPressure")
            .or_else(|| quantity(props, "barometricPressure")),
        wind_speed_mps: quantity(props, "windSpeed"),
        wind_direction_deg: quantity(props, "windDirection").map(|d| d.round() as i32),
        wind_gust_mps: quantity(props, "windGust"),
        visibility_m: quantity(props, "visibility"),
        weather_code: props
            .get("textDescription")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        precipitation_1h_mm: quantity(props, "precipitationLastHour"),
        precipitation_6h_mm: quantity(props, "precipitationLast6Hours"),
        ..Default::default()
    };

    Ok(Some(Observation::new(
        DataSource::Nws,
        station_id,
        observed_at,
        readings,
    )?))
}

/// NWS client.
pub struct NwsClient {
    config: NwsConfig,
    http: HttpFetcher,
    by_state: RwLock<HashMap<String, Vec<NwsStation>>>,
}

impl NwsClient {
    pub fn new(config: NwsConfig) -> Result<Self> {
        let gate = ConcurrencyGate::new(config.max_concurrent, millis(config.request_delay_ms));
        let http = HttpFetcher::new(
            gate,
            HttpOptions {
                timeout: secs(config.request_timeout_secs),
                user_agent: Some(config.user_agent.clone()),
                accept: Some(GEO_JSON.to_string()),
                retry: Some(RetryPolicy::transient(
                    config.retry_attempts,
                    secs(config.retry_backoff_secs),
                )),
            },
        )?;
        Ok(Self {
            config,
            http,
            by_state: RwLock::new(HashMap::new()),
        })
    }

    /// Stations of one state, cached per state.
    #[instrument(skip(self))]
    pub async fn stations_for_state(&self, state: &str) -> Result<Vec<NwsStation>> {
        let state = state.trim().to_ascii_uppercase();
        if let Some(cached) = self.by_state.read().await.get(&state) {
            return Ok(cached.clone());
        }

        let url = join_url(&self.config.base_url, "stations");
        let collection: Value = self
            .http
            .get_json(&url, &[("state", state.clone())])
            .await?
            .unwrap_or(Value::Null);
        let stations = parse_station_list(&collection);
        info!(state = %state, count = stations.len(), "Loaded NWS stations");

        self.by_state.write().await.insert(state, stations.clone());
        Ok(stations)
    }
}

#[async_trait]
impl SourceClient for NwsClient {
    type Station = NwsStation;

    fn source(&self) -> DataSource {
        DataSource::Nws
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent
    }

    async fn list_candidates(&self) -> Result<Vec<NwsStation>> {
        let mut stations = Vec::new();
        for state in &self.config.states {
            match self.stations_for_state(state).await {
                Ok(found) => stations.extend(found),
                Err(e) => {
                    warn!(state = %state, error = %e, "Failed to list NWS stations for state")
                }
            }
        }
        Ok(stations)
    }

    async fn resolve_stations(&self) -> Result<Vec<NwsStation>> {
        if !self.config.station_ids.is_empty() {
            info!(count = self.config.station_ids.len(), "Using configured NWS stations");
            return Ok(self
                .config
                .station_ids
                .iter()
                .map(|id| NwsStation::bare(id.trim().to_ascii_uppercase()))
                .collect());
        }
        if self.config.states.is_empty() {
            warn!("NWS has neither station IDs nor states configured");
            return Ok(Vec::new());
        }
        self.list_candidates().await
    }

    #[instrument(skip(self, station), fields(station = %station.station_id))]
    async fn fetch_observation(&self, station: &NwsStation) -> Result<Option<Observation>> {
        let url = join_url(
            &self.config.base_url,
            &format!("stations/{}/observations/latest", station.station_id),
        );
        match self.http.get_json::<Value>(&url, &[]).await? {
            Some(body) => parse_latest_observation(&station.station_id, &body),
            None => Ok(None),
        }
    }

    async fn fetch_metadata(&self, station: &NwsStation) -> Result<Option<StationMetadata>> {
        if station.location.is_some() {
            return station.to_metadata();
        }
        let url = join_url(&self.config.base_url, &format!("stations/{}", station.station_id));
        let Some(feature) = self.http.get_json::<Value>(&url, &[]).await? else {
            return Ok(None);
        };
        match parse_station_feature(&feature) {
            Some(detailed) => detailed.to_metadata(),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_utils::{assert_approx_eq, fixtures};

    #[test]
    fn test_parse_station_list() {
        let collection: Value = serde_json::from_str(fixtures::nws::STATIONS_NY).unwrap();
        let stations = parse_station_list(&collection);

        // The feature without coordinates is skipped.
        assert_eq!(stations.len(), 2);
        let jfk = &stations[0];
        assert_eq!(jfk.station_id, "KJFK");
        assert_eq!(jfk.location, Some((40.6392, -73.7639)));
        assert_eq!(jfk.state.as_deref(), Some("NY"));
        assert_eq!(jfk.elevation_m, Some(3.9624));
    }

    #[test]
    fn test_parse_latest_observation_units() {
        let body: Value = serde_json::from_str(fixtures::nws::LATEST_OBSERVATION).unwrap();
        let obs = parse_latest_observation("KJFK", &body).unwrap().unwrap();

        assert_eq!(obs.observed_at().to_rfc3339(), "2024-01-15T12:51:00+00:00");
        let r = obs.readings();
        assert_approx_eq!(r.air_temp_c.unwrap(), 5.6, 1e-9);
        assert_approx_eq!(r.pressure_hpa.unwrap(), 1018.3, 1e-9);
        assert_approx_eq!(r.wind_speed_mps.unwrap(), 5.0, 1e-9);
        assert_eq!(r.wind_direction_deg, Some(270));
        assert_eq!(r.wind_gust_mps, None);
        assert_eq!(r.weather_code.as_deref(), Some("Mostly Cloudy"));
        assert_eq!(r.visibility_m, Some(16090.0));
    }

    #[test]
    fn test_barometric_pressure_fallback() {
        let body = json!({"properties": {
            "timestamp": "2024-01-15T12:00:00+00:00",
            "seaLevelPressure": {"value": null, "unitCode": "wmoUnit:Pa"},
            "barometricPressure": {"value": 101000, "unitCode": "wmoUnit:Pa"},
        }});
        let obs = parse_latest_observation("KBOS", &body).unwrap().unwrap();
        assert_approx_eq!(obs.readings().pressure_hpa.unwrap(), 1010.0, 1e-9);
    }

    #[test]
    fn test_offset_timestamp_normalized_to_utc() {
        let body = json!({"properties": {"timestamp": "2024-01-15T07:00:00-05:00"}});
        let obs = parse_latest_observation("KBOS", &body).unwrap().unwrap();
        assert_eq!(obs.observed_at().to_rfc3339(), "2024-01-15T12:00:00+00:00");
    }

    #[test]
    fn test_missing_properties_is_none() {
        assert!(parse_latest_observation("KBOS", &json!({})).unwrap().is_none());
        assert!(parse_latest_observation("KBOS", &json!({"properties": {}})).unwrap().is_none());
    }

    #[test]
    fn test_bare_station_has_no_metadata() {
        assert!(NwsStation::bare("KBOS").to_metadata().unwrap().is_none());
    }

    #[test]
    fn test_station_metadata_defaults() {
        let collection: Value = serde_json::from_str(fixtures::nws::STATIONS_NY).unwrap();
        let meta = parse_station_list(&collection)[0].to_metadata().unwrap().unwrap();
        assert_eq!(meta.country_code(), Some("US"));
        assert_eq!(meta.station_type(), Some("asos"));
        assert_eq!(meta.owner(), Some("NOAA/NWS"));
        assert_eq!(meta.state_province(), Some("NY"));
    }

    #[tokio::test]
    async fn test_configured_ids_win_over_states() {
        let config = NwsConfig {
            station_ids: vec!["kjfk".to_string()],
            states: vec!["NY".to_string()],
            ..Default::default()
        };
        let client = NwsClient::new(config).unwrap();

        let stations = client.resolve_stations().await.unwrap();

        assert_eq!(stations, vec![NwsStation::bare("KJFK")]);
    }
}
