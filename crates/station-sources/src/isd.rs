//! NOAA Integrated Surface Database (ISD).
//!
//! The station registry is `isd-history.csv`; observations come from the
//! NCEI access service as `global-hourly` CSV rows whose weather columns
//! are composite fields (see [`crate::composite`]).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Utc};
use station_common::{DataSource, Observation, Readings, StationDetails, StationMetadata};
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::client::{SourceClient, StationRef};
use crate::composite::{
    decode_precipitation, decode_pressure, decode_temperature, decode_visibility, decode_wind,
    QualityPolicy,
};
use crate::config::{millis, secs, IsdConfig};
use crate::error::{Result, SourceError};
use crate::gate::ConcurrencyGate;
use crate::http::{join_url, HttpFetcher, HttpOptions};
use crate::resolver::{matches_any, ActivePolicy, StationResolver};

/// One row of isd-history.csv.
#[derive(Debug, Clone, PartialEq)]
pub struct IsdStation {
    pub usaf: String,
    pub wban: String,
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
    pub begin_date: Option<String>,
    pub end_date: Option<String>,
    id: String,
}

impl IsdStation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        usaf: &str,
        wban: &str,
        name: &str,
        country: &str,
        state: Option<&str>,
        latitude: f64,
        longitude: f64,
        elevation_m: Option<f64>,
        begin_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Self {
        Self {
            usaf: usaf.to_string(),
            wban: wban.to_string(),
            name: name.to_string(),
            country: country.to_string(),
            state: state.map(str::to_string),
            latitude,
            longitude,
            elevation_m,
            begin_date: begin_date.map(str::to_string),
            end_date: end_date.map(str::to_string),
            id: format!("{usaf}-{wban}"),
        }
    }

    /// Identifier used by the access service: USAF and WBAN concatenated.
    pub fn access_id(&self) -> String {
        format!("{}{}", self.usaf, self.wban)
    }

    /// Station type guessed from the registry name.
    pub fn inferred_type(&self) -> &'static str {
        let name = self.name.to_ascii_uppercase();
        if name.contains("ASOS") {
            "asos"
        } else if name.contains("AWOS") {
            "awos"
        } else if name.contains("METAR") {
            "metar"
        } else {
            "synoptic"
        }
    }

    pub fn to_metadata(&self) -> Result<StationMetadata> {
        let details = StationDetails {
            wmo_id: None,
            name: non_empty(&self.name),
            elevation_m: self.elevation_m,
            country_code: (self.country.chars().count() == 2).then(|| self.country.clone()),
            state_province: self.state.clone(),
            station_type: Some(self.inferred_type().to_string()),
            owner: Some("NOAA".to_string()),
        };
        Ok(StationMetadata::new(
            DataSource::Isd,
            self.id.clone(),
            self.latitude,
            self.longitude,
            details,
        )?)
    }
}

impl StationRef for IsdStation {
    fn station_id(&self) -> &str {
        &self.id
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn parse_float(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse isd-history.csv, skipping rows without a USAF id or usable coordinates.
pub fn parse_station_history(content: &str) -> Result<Vec<IsdStation>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| SourceError::parse("isd-history header", e))?
        .clone();
    let column: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();
    let field = |record: &csv::StringRecord, name: &str| -> String {
        column
            .get(name)
            .and_then(|&i| record.get(i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut stations = Vec::new();
    for record in reader.records() {
        let Ok(record) = record else {
            continue;
        };
        let usaf = field(&record, "USAF");
        let (Some(latitude), Some(longitude)) =
            (parse_float(&field(&record, "LAT")), parse_float(&field(&record, "LON")))
        else {
            continue;
        };
        if usaf.is_empty()
            || !(-90.0..=90.0).contains(&latitude)
            || !(-180.0..=180.0).contains(&longitude)
        {
            continue;
        }

        let state = field(&record, "STATE");
        let begin = field(&record, "BEGIN");
        let end = field(&record, "END");
        stations.push(IsdStation::new(
            &usaf,
            &field(&record, "WBAN"),
            &field(&record, "STATION NAME"),
            &field(&record, "CTRY"),
            (!state.is_empty()).then_some(state.as_str()),
            latitude,
            longitude,
            parse_float(&field(&record, "ELEV(M)")),
            (!begin.is_empty()).then_some(begin.as_str()),
            (!end.is_empty()).then_some(end.as_str()),
        ));
    }
    Ok(stations)
}

/// Decode the most recent row of a global-hourly CSV response.
pub fn parse_global_hourly(
    station_id: &str,
    content: &str,
    quality: &QualityPolicy,
) -> Result<Option<Observation>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| SourceError::parse("global-hourly header", e))?
        .clone();
    let column: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_ascii_uppercase(), i))
        .collect();
    let Some(&date_col) = column.get("DATE") else {
        return Err(SourceError::parse("global-hourly", "missing DATE column"));
    };

    let mut latest: Option<(NaiveDateTime, csv::StringRecord)> = None;
    for record in reader.records().flatten() {
        let Some(when) = record
            .get(date_col)
            .and_then(|d| NaiveDateTime::parse_from_str(d.trim(), "%Y-%m-%dT%H:%M:%S").ok())
        else {
            continue;
        };
        if latest.as_ref().map_or(true, |(best, _)| when > *best) {
            latest = Some((when, record));
        }
    }
    let Some((when, record)) = latest else {
        return Ok(None);
    };

    let get = |name: &str| -> Option<&str> {
        column
            .get(name)
            .and_then(|&i| record.get(i))
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let wind = get("WND").map(|raw| decode_wind(raw, quality)).unwrap_or_default();
    let mut readings = Readings {
        air_temp_c: get("TMP").and_then(|raw| decode_temperature(raw, quality)),
        dewpoint_c: get("DEW").and_then(|raw| decode_temperature(raw, quality)),
        pressure_hpa: get("SLP").and_then(|raw| decode_pressure(raw, quality)),
        wind_direction_deg: wind.direction_deg,
        wind_speed_mps: wind.speed_mps,
        visibility_m: get("VIS").and_then(|raw| decode_visibility(raw, quality)),
        ..Default::default()
    };
    for group in ["AA1", "AA2", "AA3", "AA4"] {
        let Some(precip) = get(group).and_then(|raw| decode_precipitation(raw, quality)) else {
            continue;
        };
        let slot = match precip.period_hours {
            1 => &mut readings.precipitation_1h_mm,
            6 => &mut readings.precipitation_6h_mm,
            24 => &mut readings.precipitation_24h_mm,
            _ => continue,
        };
        slot.get_or_insert(precip.depth_mm);
    }

    let observed_at = DateTime::<Utc>::from_naive_utc_and_offset(when, Utc);
    Ok(Some(Observation::new(
        DataSource::Isd,
        station_id,
        observed_at,
        readings,
    )?))
}

/// ISD client.
pub struct IsdClient {
    config: IsdConfig,
    http: HttpFetcher,
    quality: QualityPolicy,
    active: ActivePolicy,
    stations: RwLock<Option<Vec<IsdStation>>>,
}

impl IsdClient {
    pub fn new(config: IsdConfig) -> Result<Self> {
        let gate = ConcurrencyGate::new(config.max_concurrent, millis(config.request_delay_ms));
        let http = HttpFetcher::new(
            gate,
            HttpOptions {
                timeout: secs(config.request_timeout_secs),
                ..Default::default()
            },
        )?;
        Ok(Self {
            quality: QualityPolicy::new(config.accepted_quality_flags.clone()),
            active: ActivePolicy::new(config.active_grace_years),
            config,
            http,
            stations: RwLock::new(None),
        })
    }

    pub fn active_policy(&self) -> ActivePolicy {
        self.active
    }

    /// Active stations after the configured country / ID filters.
    pub fn filter(&self, stations: Vec<IsdStation>, current_year: i32) -> Vec<IsdStation> {
        let active = self.active;
        let mut resolver = StationResolver::new(&self.config.station_ids).with_active(
            move |s: &IsdStation| active.is_active(s.end_date.as_deref(), current_year),
        );
        if !self.config.country_codes.is_empty() {
            let codes = &self.config.country_codes;
            resolver =
                resolver.with_group(move |s: &IsdStation| matches_any(Some(&s.country), codes));
        }
        resolver.resolve(stations).stations
    }
}

#[async_trait]
impl SourceClient for IsdClient {
    type Station = IsdStation;

    fn source(&self) -> DataSource {
        DataSource::Isd
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent
    }

    async fn list_candidates(&self) -> Result<Vec<IsdStation>> {
        if let Some(cached) = self.stations.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let url = join_url(&self.config.base_url, "pub/data/noaa/isd-history.csv");
        let body = self
            .http
            .get_text(&url, &[])
            .await?
            .ok_or_else(|| SourceError::parse("isd-history", "station history not found"))?;
        let stations = parse_station_history(&body)?;
        info!(count = stations.len(), "Loaded ISD station history");

        *self.stations.write().await = Some(stations.clone());
        Ok(stations)
    }

    async fn resolve_stations(&self) -> Result<Vec<IsdStation>> {
        let all = self.list_candidates().await?;
        Ok(self.filter(all, Utc::now().year()))
    }

    #[instrument(skip(self, station), fields(station = %station.station_id()))]
    async fn fetch_observation(&self, station: &IsdStation) -> Result<Option<Observation>> {
        let end = Utc::now();
        let start = end - Duration::hours(self.config.lookback_hours);
        let url = join_url(&self.config.base_url, "access/services/data/v1");
        let query = [
            ("dataset", "global-hourly".to_string()),
            ("stations", station.access_id()),
            ("startDate", start.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("endDate", end.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("format", "csv".to_string()),
        ];

        match self.http.get_text(&url, &query).await? {
            Some(body) => parse_global_hourly(station.station_id(), &body, &self.quality),
            None => Ok(None),
        }
    }

    async fn fetch_metadata(&self, station: &IsdStation) -> Result<Option<StationMetadata>> {
        station.to_metadata().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, fixtures};

    #[test]
    fn test_parse_station_history() {
        let stations = parse_station_history(fixtures::isd::HISTORY_CSV).unwrap();

        // The row with blank coordinates is dropped.
        assert_eq!(stations.len(), 3);
        let laguardia = &stations[0];
        assert_eq!(laguardia.station_id(), "725030-14732");
        assert_eq!(laguardia.access_id(), "72503014732");
        assert_eq!(laguardia.state.as_deref(), Some("NY"));
        assert_approx_eq!(laguardia.latitude, 40.779, 1e-9);
        assert_eq!(laguardia.end_date.as_deref(), Some("20250110"));
    }

    #[test]
    fn test_inferred_type() {
        let station = IsdStation::new(
            "999999", "00001", "SOMEWHERE ASOS", "US", None, 1.0, 1.0, None, None, None,
        );
        assert_eq!(station.inferred_type(), "asos");
        let station =
            IsdStation::new("999999", "00001", "HEATHROW", "UK", None, 1.0, 1.0, None, None, None);
        assert_eq!(station.inferred_type(), "synoptic");
    }

    #[test]
    fn test_metadata_drops_long_country() {
        let station = IsdStation::new(
            "123456", "99999", "TEST", "USA", None, 10.0, 20.0, Some(5.0), None, None,
        );
        let meta = station.to_metadata().unwrap();
        assert_eq!(meta.country_code(), None);
        assert_eq!(meta.owner(), Some("NOAA"));
        assert_eq!(meta.station_type(), Some("synoptic"));
    }

    #[test]
    fn test_parse_global_hourly_takes_latest_row() {
        let policy = QualityPolicy::default();
        let obs = parse_global_hourly("725030-14732", fixtures::isd::GLOBAL_HOURLY_CSV, &policy)
            .unwrap()
            .unwrap();

        assert_eq!(obs.observed_at().to_rfc3339(), "2024-01-15T12:00:00+00:00");
        let r = obs.readings();
        assert_approx_eq!(r.air_temp_c.unwrap(), 15.2, 1e-9);
        // Dew point carries quality 3 in the fixture.
        assert_eq!(r.dewpoint_c, None);
        assert_approx_eq!(r.pressure_hpa.unwrap(), 1013.2, 1e-9);
        assert_eq!(r.wind_direction_deg, None);
        assert_approx_eq!(r.wind_speed_mps.unwrap(), 5.1, 1e-9);
        assert_eq!(r.visibility_m, Some(16000.0));
        assert_approx_eq!(r.precipitation_1h_mm.unwrap(), 0.5, 1e-9);
        assert_approx_eq!(r.precipitation_6h_mm.unwrap(), 2.3, 1e-9);
        assert_eq!(r.precipitation_24h_mm, None);
    }

    #[test]
    fn test_parse_global_hourly_empty_body() {
        let policy = QualityPolicy::default();
        let result = parse_global_hourly("x", "STATION,DATE,TMP\n", &policy).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_filter_by_country_and_activity() {
        let config = IsdConfig {
            country_codes: vec!["us".to_string()],
            ..Default::default()
        };
        let client = IsdClient::new(config).unwrap();
        let stations = parse_station_history(fixtures::isd::HISTORY_CSV).unwrap();

        let filtered = client.filter(stations, 2026);

        let ids: Vec<&str> = filtered.iter().map(|s| s.station_id()).collect();
        assert_eq!(ids, vec!["725030-14732"]);
    }

    #[test]
    fn test_filter_by_station_id_ignores_activity() {
        let config = IsdConfig {
            station_ids: vec!["722950-23174".to_string()],
            ..Default::default()
        };
        let client = IsdClient::new(config).unwrap();
        let stations = parse_station_history(fixtures::isd::HISTORY_CSV).unwrap();

        let filtered = client.filter(stations, 2030);

        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].station_id(), "722950-23174");
    }
}
