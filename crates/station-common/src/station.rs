//! Canonical station metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::observation::cell;
use crate::source::DataSource;
use crate::time::{format_utc, parse_utc};

/// Column order of metadata CSV files.
pub const METADATA_COLUMNS: [&str; 12] = [
    "source",
    "source_station_id",
    "wmo_id",
    "name",
    "latitude",
    "longitude",
    "elevation_m",
    "country_code",
    "state_province",
    "station_type",
    "owner",
    "updated_at",
];

/// Optional descriptive attributes of a station.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StationDetails {
    pub wmo_id: Option<String>,
    pub name: Option<String>,
    pub elevation_m: Option<f64>,
    pub country_code: Option<String>,
    pub state_province: Option<String>,
    pub station_type: Option<String>,
    pub owner: Option<String>,
}

/// Latest known description of a station. An upsert record: consumers keep
/// only the newest one per [`StationMetadata::key`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStationMetadata")]
pub struct StationMetadata {
    source: DataSource,
    source_station_id: String,
    wmo_id: Option<String>,
    name: Option<String>,
    latitude: f64,
    longitude: f64,
    elevation_m: Option<f64>,
    country_code: Option<String>,
    state_province: Option<String>,
    station_type: Option<String>,
    owner: Option<String>,
    updated_at: DateTime<Utc>,
}

impl StationMetadata {
    pub fn new(
        source: DataSource,
        source_station_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        details: StationDetails,
    ) -> ValidationResult<Self> {
        let source_station_id = source_station_id.into();
        if source_station_id.trim().is_empty() {
            return Err(ValidationError::EmptyStationId);
        }
        coordinate("latitude", latitude, 90.0)?;
        coordinate("longitude", longitude, 180.0)?;
        if let Some(elevation) = details.elevation_m {
            if !elevation.is_finite() {
                return Err(ValidationError::NotFinite {
                    field: "elevation_m",
                });
            }
        }
        if let Some(code) = &details.country_code {
            if code.chars().count() != 2 {
                return Err(ValidationError::InvalidCountryCode(code.clone()));
            }
        }

        Ok(Self {
            source,
            source_station_id,
            wmo_id: details.wmo_id,
            name: details.name,
            latitude,
            longitude,
            elevation_m: details.elevation_m,
            country_code: details.country_code,
            state_province: details.state_province,
            station_type: details.station_type,
            owner: details.owner,
            updated_at: Utc::now(),
        })
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn source_station_id(&self) -> &str {
        &self.source_station_id
    }

    pub fn wmo_id(&self) -> Option<&str> {
        self.wmo_id.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn elevation_m(&self) -> Option<f64> {
        self.elevation_m
    }

    pub fn country_code(&self) -> Option<&str> {
        self.country_code.as_deref()
    }

    pub fn state_province(&self) -> Option<&str> {
        self.state_province.as_deref()
    }

    pub fn station_type(&self) -> Option<&str> {
        self.station_type.as_deref()
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.source, self.source_station_id)
    }

    /// Cells in [`METADATA_COLUMNS`] order.
    pub fn csv_record(&self) -> Vec<String> {
        vec![
            self.source.to_string(),
            self.source_station_id.clone(),
            cell(self.wmo_id.as_deref()),
            cell(self.name.as_deref()),
            self.latitude.to_string(),
            self.longitude.to_string(),
            cell(self.elevation_m),
            cell(self.country_code.as_deref()),
            cell(self.state_province.as_deref()),
            cell(self.station_type.as_deref()),
            cell(self.owner.as_deref()),
            format_utc(&self.updated_at),
        ]
    }
}

fn coordinate(field: &'static str, value: f64, limit: f64) -> ValidationResult<()> {
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < -limit || value > limit {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: -limit,
            max: limit,
        });
    }
    Ok(())
}

#[derive(Deserialize)]
struct RawStationMetadata {
    source: DataSource,
    source_station_id: String,
    latitude: f64,
    longitude: f64,
    updated_at: String,
    #[serde(flatten)]
    details: StationDetails,
}

impl TryFrom<RawStationMetadata> for StationMetadata {
    type Error = ValidationError;

    fn try_from(raw: RawStationMetadata) -> Result<Self, Self::Error> {
        let updated_at = parse_utc(&raw.updated_at)?;
        Ok(StationMetadata::new(
            raw.source,
            raw.source_station_id,
            raw.latitude,
            raw.longitude,
            raw.details,
        )?
        .with_updated_at(updated_at))
    }
}
