//! NOAA National Data Buoy Center.
//!
//! Station list: `station_table.txt` (pipe-delimited). Latest reading:
//! `realtime2/{ID}.txt`, whitespace-delimited, newest row first.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use station_common::{
    DataSource, Observation, PressureTendency, Readings, StationDetails, StationMetadata,
};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::client::SourceClient;
use crate::config::{millis, secs, NdbcConfig};
use crate::error::{Result, SourceError};
use crate::gate::ConcurrencyGate;
use crate::http::{join_url, HttpFetcher, HttpOptions};
use crate::resolver::StationResolver;

/// Tokens the realtime files use for "no data".
pub const MISSING_TOKENS: [&str; 6] = ["MM", "999", "9999", "99.0", "999.0", "9999.0"];

pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;

static STATION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{4,6}$").unwrap());
static LATITUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+)\s*°?\s*([NS])\b").unwrap());
static LONGITUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d+)\s*°?\s*([EW])\b").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"<h1[^>]*>([^<]+)</h1>").unwrap());

/// Station IDs from station_table.txt, lowercased.
pub fn parse_station_table(content: &str) -> Vec<String> {
    content
        .lines()
        .filter(|line| !line.starts_with('#') && !line.starts_with("Station") && line.contains('|'))
        .filter_map(|line| line.split('|').next())
        .map(str::trim)
        .filter(|id| STATION_ID.is_match(id))
        .map(str::to_ascii_lowercase)
        .collect()
}

fn token(cells: &[&str], index: usize) -> Option<f64> {
    let raw = *cells.get(index)?;
    if MISSING_TOKENS.contains(&raw) {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decode the newest data row of a realtime2 file.
///
/// Columns after the timestamp: WDIR WSPD GST WVHT DPD APD MWD PRES ATMP
/// WTMP DEWP VIS PTDY TIDE.
pub fn parse_realtime(station_id: &str, content: &str) -> Result<Option<Observation>> {
    let Some(line) = content
        .lines()
        .find(|line| !line.starts_with('#') && !line.trim().is_empty())
    else {
        return Ok(None);
    };

    let cells: Vec<&str> = line.split_whitespace().collect();
    if cells.len() < 5 {
        return Err(SourceError::parse("realtime2 row", format!("too few columns: {line:?}")));
    }

    let stamp: Vec<u32> = cells[..5]
        .iter()
        .map(|c| c.parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| SourceError::parse("realtime2 timestamp", e))?;
    let year = if stamp[0] < 100 { stamp[0] + 2000 } else { stamp[0] };
    let observed_at = Utc
        .with_ymd_and_hms(year as i32, stamp[1], stamp[2], stamp[3], stamp[4], 0)
        .single()
        .ok_or_else(|| SourceError::parse("realtime2 timestamp", line))?;

    let values = &cells[5..];
    let readings = Readings {
        wind_direction_deg: token(values, 0).map(|v| v as i32),
        wind_speed_mps: token(values, 1),
        wind_gust_mps: token(values, 2),
        wave_height_m: token(values, 3),
        wave_period_s: token(values, 4),
        pressure_hpa: token(values, 7),
        air_temp_c: token(values, 8),
        water_temp_c: token(values, 9),
        dewpoint_c: token(values, 10),
        visibility_m: token(values, 11).map(|nmi| nmi * METERS_PER_NAUTICAL_MILE),
        pressure_tendency: token(values, 12).and_then(PressureTendency::from_change),
        ..Default::default()
    };

    Ok(Some(Observation::new(
        DataSource::Ndbc,
        station_id,
        observed_at,
        readings,
    )?))
}

fn hemisphere(value: &str, direction: &str, negative: &str) -> Option<f64> {
    let value: f64 = value.parse().ok()?;
    Some(if direction == negative { -value } else { value })
}

/// Station metadata scraped from station_page.php.
pub fn parse_station_page(station_id: &str, html: &str) -> Result<Option<StationMetadata>> {
    let latitude = LATITUDE
        .captures(html)
        .and_then(|c| hemisphere(&c[1], &c[2], "S"));
    let longitude = LONGITUDE
        .captures(html)
        .and_then(|c| hemisphere(&c[1], &c[2], "W"));
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        warn!(station = %station_id, "Could not find coordinates on station page");
        return Ok(None);
    };

    let name = HEADING
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty());

    let details = StationDetails {
        wmo_id: None,
        name,
        elevation_m: Some(0.0),
        country_code: Some("US".to_string()),
        state_province: None,
        station_type: Some("buoy".to_string()),
        owner: Some("NDBC".to_string()),
    };
    Ok(Some(StationMetadata::new(
        DataSource::Ndbc,
        station_id,
        latitude,
        longitude,
        details,
    )?))
}

/// NDBC client.
pub struct NdbcClient {
    config: NdbcConfig,
    http: HttpFetcher,
    stations: RwLock<Option<Vec<String>>>,
}

impl NdbcClient {
    pub fn new(config: NdbcConfig) -> Result<Self> {
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
            stations: RwLock::new(None),
        })
    }
}

#[async_trait]
impl SourceClient for NdbcClient {
    type Station = String;

    fn source(&self) -> DataSource {
        DataSource::Ndbc
    }

    fn concurrency(&self) -> usize {
        self.config.max_concurrent
    }

    async fn list_candidates(&self) -> Result<Vec<String>> {
        if let Some(cached) = self.stations.read().await.as_ref() {
            return Ok(cached.clone());
        }

        let url = join_url(&self.config.base_url, "data/stations/station_table.txt");
        let body = self
            .http
            .get_text(&url, &[])
            .await?
            .ok_or_else(|| SourceError::parse("station table", "not found"))?;
        let stations = parse_station_table(&body);
        info!(count = stations.len(), "Loaded NDBC station table");

        *self.stations.write().await = Some(stations.clone());
        Ok(stations)
    }

    async fn resolve_stations(&self) -> Result<Vec<String>> {
        if !self.config.station_ids.is_empty() {
            // Configured buoys are polled even when the table omits them.
            return Ok(self
                .config
                .station_ids
                .iter()
                .map(|id| id.trim().to_ascii_lowercase())
                .collect());
        }
        let all = self.list_candidates().await?;
        Ok(StationResolver::new(&[]).resolve(all).stations)
    }

    #[instrument(skip(self))]
    async fn fetch_observation(&self, station: &String) -> Result<Option<Observation>> {
        let url = join_url(
            &self.config.base_url,
            &format!("data/realtime2/{}.txt", station.to_ascii_uppercase()),
        );
        match self.http.get_text(&url, &[]).await? {
            Some(body) => parse_realtime(station, &body),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    async fn fetch_metadata(&self, station: &String) -> Result<Option<StationMetadata>> {
        let url = join_url(&self.config.base_url, "station_page.php");
        let query = [("station", station.clone())];
        match self.http.get_text(&url, &query).await? {
            Some(body) => parse_station_page(station, &body),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, fixtures};

    #[test]
    fn test_parse_station_table() {
        let ids = parse_station_table(fixtures::ndbc::STATION_TABLE);
        assert_eq!(ids, vec!["41001", "46042", "bzbm3"]);
    }

    #[test]
    fn test_parse_realtime_first_row() {
        let obs = parse_realtime("41001", fixtures::ndbc::REALTIME2).unwrap().unwrap();

        assert_eq!(obs.observed_at().to_rfc3339(), "2024-01-15T12:00:00+00:00");
        let r = obs.readings();
        assert_eq!(r.wind_direction_deg, Some(270));
        assert_approx_eq!(r.wind_speed_mps.unwrap(), 5.1, 1e-9);
        assert_approx_eq!(r.wave_height_m.unwrap(), 1.8, 1e-9);
        assert_approx_eq!(r.pressure_hpa.unwrap(), 1018.5, 1e-9);
        assert_approx_eq!(r.air_temp_c.unwrap(), 15.2, 1e-9);
        assert_eq!(r.dewpoint_c, None);
        assert_eq!(r.visibility_m, Some(9260.0));
        assert_eq!(r.pressure_tendency, Some(PressureTendency::Falling));
    }

    #[test]
    fn test_visibility_conversion_exact() {
        let row = "2024 01 15 12 00 MM MM MM MM MM MM MM MM MM MM MM 5.0 MM MM\n";
        let obs = parse_realtime("41001", row).unwrap().unwrap();
        assert_eq!(obs.readings().visibility_m, Some(9260.0));
    }

    #[test]
    fn test_two_digit_year() {
        let row = "24 01 15 12 00 270 5.1 MM MM MM MM MM MM MM MM MM MM MM MM\n";
        let obs = parse_realtime("41001", row).unwrap().unwrap();
        assert_eq!(obs.observed_at().to_rfc3339(), "2024-01-15T12:00:00+00:00");
    }

    #[test]
    fn test_missing_tokens_are_null_not_zero() {
        let row = "2024 01 15 12 00 999 99.0 9999.0 MM MM MM MM 9999 999.0 MM MM MM MM MM\n";
        let obs = parse_realtime("41001", row).unwrap().unwrap();
        assert!(obs.readings().is_empty());
    }

    #[test]
    fn test_short_row_keeps_leading_columns() {
        let row = "2024 01 15 12 00 270 5.1\n";
        let obs = parse_realtime("41001", row).unwrap().unwrap();
        assert_eq!(obs.readings().wind_direction_deg, Some(270));
        assert_eq!(obs.readings().wind_speed_mps, Some(5.1));
        assert_eq!(obs.readings().air_temp_c, None);

        let stub = "2024 01 15\n";
        assert!(matches!(parse_realtime("41001", stub), Err(SourceError::Parse { .. })));
    }

    #[test]
    fn test_header_only_file() {
        let content = "#YY  MM DD hh mm WDIR\n#yr  mo dy hr mn degT\n";
        assert!(parse_realtime("41001", content).unwrap().is_none());
    }

    #[test]
    fn test_bad_timestamp_is_parse_error() {
        let row = "2024 13 15 12 00 270\n";
        assert!(matches!(parse_realtime("41001", row), Err(SourceError::Parse { .. })));
    }

    #[test]
    fn test_parse_station_page() {
        let meta = parse_station_page("41001", fixtures::ndbc::STATION_PAGE).unwrap().unwrap();
        assert_approx_eq!(meta.latitude(), 34.724, 1e-9);
        assert_approx_eq!(meta.longitude(), -72.317, 1e-9);
        assert_eq!(meta.name(), Some("Station 41001 - EAST HATTERAS"));
        assert_eq!(meta.station_type(), Some("buoy"));
        assert_eq!(meta.country_code(), Some("US"));
    }

    #[test]
    fn test_station_page_without_coordinates() {
        assert!(parse_station_page("41001", "<html><h1>Nothing</h1></html>").unwrap().is_none());
    }
}
