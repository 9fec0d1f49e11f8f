//! Canonical weather observation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationResult};
use crate::source::{DataSource, PressureTendency};
use crate::time::{format_utc, parse_utc};

/// Column order of observation CSV files.
pub const OBSERVATION_COLUMNS: [&str; 21] = [
    "source",
    "source_station_id",
    "observed_at",
    "ingested_at",
    "air_temp_c",
    "dewpoint_c",
    "relative_humidity_pct",
    "pressure_hpa",
    "pressure_tendency",
    "wind_speed_mps",
    "wind_direction_deg",
    "wind_gust_mps",
    "visibility_m",
    "weather_code",
    "cloud_cover_pct",
    "precipitation_1h_mm",
    "precipitation_6h_mm",
    "precipitation_24h_mm",
    "wave_height_m",
    "wave_period_s",
    "water_temp_c",
];

/// The optional physical quantities of an observation.
///
/// Every field is `None` when the upstream value was missing, flagged bad,
/// or a sentinel. Zero always means a measured zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Readings {
    pub air_temp_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub relative_humidity_pct: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub pressure_tendency: Option<PressureTendency>,
    pub wind_speed_mps: Option<f64>,
    pub wind_direction_deg: Option<i32>,
    pub wind_gust_mps: Option<f64>,
    pub visibility_m: Option<f64>,
    pub weather_code: Option<String>,
    pub cloud_cover_pct: Option<f64>,
    pub precipitation_1h_mm: Option<f64>,
    pub precipitation_6h_mm: Option<f64>,
    pub precipitation_24h_mm: Option<f64>,
    pub wave_height_m: Option<f64>,
    pub wave_period_s: Option<f64>,
    pub water_temp_c: Option<f64>,
}

impl Readings {
    /// Check every populated field against its plausibility range.
    pub fn validate(&self) -> ValidationResult<()> {
        const UNBOUNDED: f64 = f64::INFINITY;

        check("air_temp_c", self.air_temp_c, -100.0, 70.0)?;
        check("dewpoint_c", self.dewpoint_c, -100.0, 70.0)?;
        check("relative_humidity_pct", self.relative_humidity_pct, 0.0, 100.0)?;
        check("pressure_hpa", self.pressure_hpa, 800.0, 1100.0)?;
        check("wind_speed_mps", self.wind_speed_mps, 0.0, UNBOUNDED)?;
        check(
            "wind_direction_deg",
            self.wind_direction_deg.map(f64::from),
            0.0,
            360.0,
        )?;
        check("wind_gust_mps", self.wind_gust_mps, 0.0, UNBOUNDED)?;
        check("visibility_m", self.visibility_m, 0.0, UNBOUNDED)?;
        check("cloud_cover_pct", self.cloud_cover_pct, 0.0, 100.0)?;
        check("precipitation_1h_mm", self.precipitation_1h_mm, 0.0, UNBOUNDED)?;
        check("precipitation_6h_mm", self.precipitation_6h_mm, 0.0, UNBOUNDED)?;
        check("precipitation_24h_mm", self.precipitation_24h_mm, 0.0, UNBOUNDED)?;
        check("wave_height_m", self.wave_height_m, 0.0, UNBOUNDED)?;
        check("wave_period_s", self.wave_period_s, 0.0, UNBOUNDED)?;
        check("water_temp_c", self.water_temp_c, -10.0, 50.0)?;
        Ok(())
    }

    /// True when no quantity at all was decoded.
    pub fn is_empty(&self) -> bool {
        *self == Readings::default()
    }
}

fn check(field: &'static str, value: Option<f64>, min: f64, max: f64) -> ValidationResult<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !value.is_finite() {
        return Err(ValidationError::NotFinite { field });
    }
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// One instantaneous reading from one station at one instant.
///
/// Only constructible through [`Observation::new`] (or deserialization,
/// which goes through the same checks), so an `Observation` is always valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawObservation")]
pub struct Observation {
    source: DataSource,
    source_station_id: String,
    observed_at: DateTime<Utc>,
    ingested_at: DateTime<Utc>,
    #[serde(flatten)]
    readings: Readings,
}

impl Observation {
    pub fn new(
        source: DataSource,
        source_station_id: impl Into<String>,
        observed_at: DateTime<Utc>,
        readings: Readings,
    ) -> ValidationResult<Self> {
        let source_station_id = source_station_id.into();
        if source_station_id.trim().is_empty() {
            return Err(ValidationError::EmptyStationId);
        }
        readings.validate()?;

        Ok(Self {
            source,
            source_station_id,
            observed_at,
            ingested_at: Utc::now(),
            readings,
        })
    }

    /// Replace the ingestion instant (replays and tests).
    pub fn with_ingested_at(mut self, ingested_at: DateTime<Utc>) -> Self {
        self.ingested_at = ingested_at;
        self
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    pub fn source_station_id(&self) -> &str {
        &self.source_station_id
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    pub fn readings(&self) -> &Readings {
        &self.readings
    }

    /// Partition key: `{source}.{source_station_id}`.
    pub fn key(&self) -> String {
        format!("{}.{}", self.source, self.source_station_id)
    }

    /// Cells in [`OBSERVATION_COLUMNS`] order; absent values are empty.
    pub fn csv_record(&self) -> Vec<String> {
        let r = &self.readings;
        vec![
            self.source.to_string(),
            self.source_station_id.clone(),
            format_utc(&self.observed_at),
            format_utc(&self.ingested_at),
            cell(r.air_temp_c),
            cell(r.dewpoint_c),
            cell(r.relative_humidity_pct),
            cell(r.pressure_hpa),
            cell(r.pressure_tendency),
            cell(r.wind_speed_mps),
            cell(r.wind_direction_deg),
            cell(r.wind_gust_mps),
            cell(r.visibility_m),
            cell(r.weather_code.as_deref()),
            cell(r.cloud_cover_pct),
            cell(r.precipitation_1h_mm),
            cell(r.precipitation_6h_mm),
            cell(r.precipitation_24h_mm),
            cell(r.wave_height_m),
            cell(r.wave_period_s),
            cell(r.water_temp_c),
        ]
    }
}

pub(crate) fn cell<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[derive(Deserialize)]
struct RawObservation {
    source: DataSource,
    source_station_id: String,
    observed_at: String,
    ingested_at: String,
    #[serde(flatten)]
    readings: Readings,
}

impl TryFrom<RawObservation> for Observation {
    type Error = ValidationError;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        let observed_at = parse_utc(&raw.observed_at)?;
        let ingested_at = parse_utc(&raw.ingested_at)?;
        Ok(Observation::new(raw.source, raw.source_station_id, observed_at, raw.readings)?
            .with_ingested_at(ingested_at))
    }
}
