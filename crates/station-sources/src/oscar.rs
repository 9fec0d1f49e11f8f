//! WMO OSCAR/Surface station registry.
//!
//! The registry has no observations; it is a metadata-only source. Its
//! search endpoint is loosely typed, so every field is read through an
//! explicit fallback chain over `serde_json::Value`.

use async_trait::async_trait;
use serde_json::Value;
use station_common::{DataSource, Observation, StationDetails, StationMetadata};
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::client::{SourceClient, StationRef};
use crate::config::{secs, OscarConfig};
use crate::error::Result;
use crate::gate::ConcurrencyGate;
use crate::http::{join_url, HttpFetcher, HttpOptions};
use crate::resolver::{matches_any, StationResolver};

const INAPPLICABLE: &str = "(inapplicable)";

/// A normalized OSCAR registry record.
#[derive(Debug, Clone, PartialEq)]
pub struct OscarStation {
    pub wigos_id: String,
    pub name: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: Option<f64>,
    pub country_code: Option<String>,
    pub territory: Option<String>,
    pub region: Option<String>,
    pub station_class: Option<String>,
    pub facility_type: Option<String>,
    pub owner: Option<String>,
    pub status: Option<String>,
}

impl StationRef for OscarStation {
    fn station_id(&self) -> &str {
        &self.wigos_id
    }
}

/// Why a registry record could not be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NoIdentifier,
    NoCoordinates,
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

fn first_text(record: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text(record.get(key)))
}

/// WIGOS id: `wigosId` → `wigosStationIdentifier` → primary entry of
/// `wigosStationIdentifiers` → its first entry.
pub fn resolve_wigos_id(record: &Value) -> Option<String> {
    if let Some(id) = first_text(record, &["wigosId", "wigosStationIdentifier"]) {
        return Some(id);
    }
    let entries = record.get("wigosStationIdentifiers")?.as_array()?;
    let entry_id = |entry: &Value| text(entry.get("wigosStationIdentifier"));
    entries
        .iter()
        .find(|entry| entry.get("primary").and_then(Value::as_bool).unwrap_or(false))
        .and_then(entry_id)
        .or_else(|| entries.first().and_then(entry_id))
}

fn organization(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        object @ Value::Object(_) => first_text(object, &["name", "acronym"]),
        _ => None,
    }
}

fn not_inapplicable(value: Option<String>) -> Option<String> {
    value.filter(|v| v != INAPPLICABLE)
}

/// Normalize one registry record.
pub fn normalize(record: &Value) -> std::result::Result<OscarStation, Rejection> {
    let wigos_id = resolve_wigos_id(record).ok_or(Rejection::NoIdentifier)?;
    let (Some(latitude), Some(longitude)) =
        (number(record.get("latitude")), number(record.get("longitude")))
    else {
        return Err(Rejection::NoCoordinates);
    };

    let (country_code, territory) = match record.get("territory") {
        Some(object @ Value::Object(_)) => (
            text(object.get("countryCode")),
            not_inapplicable(text(object.get("name"))),
        ),
        Some(value) => (None, not_inapplicable(text(Some(value)))),
        None => (None, None),
    };

    let owner = organization(record.get("supervisionOrganization"))
        .or_else(|| organization(record.get("organization")));

    Ok(OscarStation {
        wigos_id,
        name: text(record.get("name")),
        latitude,
        longitude,
        elevation_m: number(record.get("elevation")),
        country_code,
        territory,
        region: not_inapplicable(text(record.get("region"))),
        station_class: first_text(record, &["stationClass", "stationTypeName"]),
        facility_type: first_text(record, &["facilityType", "stationTypeCode"]),
        owner,
        status: first_text(record, &["stationStatus", "declaredStatus", "stationStatusCode"]),
    })
}

/// The records of one search response, whatever its shape.
pub fn records(page: &Value) -> Vec<&Value> {
    match page {
        Value::Array(items) => items.iter().collect(),
        Value::Object(object) => match object
            .get("stations")
            .or_else(|| object.get("stationSearchResults"))
        {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => vec![page],
        },
        _ => Vec::new(),
    }
}

/// Normalize every record of a page, dropping the ones that fail.
pub fn parse_page(page: &Value) -> Vec<OscarStation> {
    let mut rejected = 0usize;
    let stations: Vec<OscarStation> = records(page)
        .into_iter()
        .filter_map(|record| match normalize(record) {
            Ok(station) => Some(station),
            Err(_) => {
                rejected += 1;
                None
            }
        })
        .collect();
    if rejected > 0 {
        info!(rejected, kept = stations.len(), "Dropped OSCAR records without id or coordinates");
    }
    stations
}

/// Canonical station type for an OSCAR station class.
pub fn station_type(class: &str) -> String {
    match class {
        "synoptic" => "synoptic",
        "upperAir" => "upper_air",
        "climatological" => "climatological",
        "agriculturalMeteorological" => "agricultural",
        "precipitation" => "precipitation",
        "oceanographic" => "oceanographic",
        "spaceWeather" => "space_weather",
        other => return other.to_lowercase(),
    }
    .to_string()
}

impl OscarStation {
    pub fn to_metadata(&self) -> Result<StationMetadata> {
        let details = StationDetails {
            wmo_id: Some(self.wigos_id.clone()),
            name: self.name.clone(),
            elevation_m: self.elevation_m,
            country_code: self
                .country_code
                .clone()
                .filter(|code| code.chars().count() == 2),
            state_province: self.region.clone(),
            station_type: self.station_class.as_deref().map(station_type),
            owner: self.owner.clone(),
        };
        Ok(StationMetadata::new(
            DataSource::Oscar,
            self.wigos_id.clone(),
            self.latitude,
            self.longitude,
            details,
        )?)
    }
}

/// OSCAR client.
pub struct OscarClient {
    config: OscarConfig,
    http: HttpFetcher,
    stations: RwLock<Option<Vec<OscarStation>>>,
}

impl OscarClient {
    pub fn new(config: OscarConfig) -> Result<Self> {
        let http = HttpFetcher::new(
            ConcurrencyGate::new(1, std::time::Duration::ZERO),
            HttpOptions {
                timeout: secs(config.api_timeout_secs),
                ..Default::default()
            },
        )?;
        Ok(Self {
            config,
            http,
            stations: RwLock::new(None),
        })
    }

    /// Apply the configured territory / class / facility filters.
    pub fn filter(&self, stations: Vec<OscarStation>) -> Vec<OscarStation> {
        let config = &self.config;
        let mut resolver = StationResolver::new(&[]);
        if config.has_filters() {
            resolver = resolver.with_group(move |s: &OscarStation| {
                (config.territories.is_empty()
                    || matches_any(s.territory.as_deref(), &config.territories))
                    && (config.station_classes.is_empty()
                        || matches_any(s.station_class.as_deref(), &config.station_classes))
                    && (config.facility_types.is_empty()
                        || matches_any(s.facility_type.as_deref(), &config.facility_types))
            });
        }
        resolver.resolve(stations).stations
    }

    #[instrument(skip(self))]
    async fn fetch_all(&self) -> Result<Vec<OscarStation>> {
        let url = join_url(&self.config.base_url, "search/station");
        let mut stations = Vec::new();
        let mut page_number: u64 = 1;

        loop {
            let query = [
                ("pageNumber", page_number.to_string()),
                ("itemsPerPage", self.config.items_per_page.to_string()),
            ];
            let page: Value = match self.http.get_json(&url, &query).await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                // A failed first page fails the listing; a later one ends it.
                Err(e) if page_number == 1 => return Err(e),
                Err(e) => {
                    warn!(
                        page = page_number,
                        error = %e,
                        "OSCAR page fetch failed, keeping earlier pages"
                    );
                    break;
                }
            };

            let batch = parse_page(&page);
            let page_count = page.get("pageCount").and_then(Value::as_u64).unwrap_or(1);
            let empty = batch.is_empty();
            stations.extend(batch);

            if empty || page_number >= page_count {
                break;
            }
            page_number += 1;
        }

        Ok(stations)
    }
}

#[async_trait]
impl SourceClient for OscarClient {
    type Station = OscarStation;

    fn source(&self) -> DataSource {
        DataSource::Oscar
    }

    fn concurrency(&self) -> usize {
        1
    }

    async fn list_candidates(&self) -> Result<Vec<OscarStation>> {
        if let Some(cached) = self.stations.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let stations = self.fetch_all().await?;
        info!(count = stations.len(), "Loaded OSCAR stations");
        *self.stations.write().await = Some(stations.clone());
        Ok(stations)
    }

    async fn resolve_stations(&self) -> Result<Vec<OscarStation>> {
        let all = self.list_candidates().await?;
        Ok(self.filter(all))
    }

    async fn fetch_observation(&self, _station: &OscarStation) -> Result<Option<Observation>> {
        Ok(None)
    }

    async fn fetch_metadata(&self, station: &OscarStation) -> Result<Option<StationMetadata>> {
        station.to_metadata().map(Some)
    }

    async fn fetch_observations(&self, _stations: &[OscarStation]) -> Vec<Observation> {
        Vec::new()
    }
}
