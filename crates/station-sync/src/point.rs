//! Observation CSV rows as time-series points.
//!
//! Tags are `source` and `station_id`, the timestamp is `observed_at`
//! (second precision) and every populated quantity column becomes a field.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use csv::StringRecord;
use station_common::{parse_utc, DataSource};

use crate::error::{Result, SyncError};

/// Columns written as float fields.
pub const NUMERIC_FIELDS: [&str; 15] = [
    "air_temp_c",
    "dewpoint_c",
    "relative_humidity_pct",
    "pressure_hpa",
    "wind_speed_mps",
    "wind_direction_deg",
    "wind_gust_mps",
    "visibility_m",
    "cloud_cover_pct",
    "precipitation_1h_mm",
    "precipitation_6h_mm",
    "precipitation_24h_mm",
    "wave_height_m",
    "wave_period_s",
    "water_temp_c",
];

/// Columns written as string fields.
pub const STRING_FIELDS: [&str; 2] = ["pressure_tendency", "weather_code"];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub source: DataSource,
    pub station_id: String,
    pub fields: Vec<(&'static str, FieldValue)>,
    pub time: DateTime<Utc>,
}

/// Header name to column index.
#[derive(Debug, Clone)]
pub struct Columns(HashMap<String, usize>);

impl Columns {
    pub fn new(headers: &StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        )
    }

    fn get<'r>(&self, row: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.0.get(name).and_then(|&i| row.get(i)).map(str::trim)
    }
}

fn is_absent(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("none") || value.eq_ignore_ascii_case("null")
}

/// Convert one CSV row. Unparseable numeric cells are skipped, not fatal.
pub fn from_row(measurement: &str, columns: &Columns, row: &StringRecord) -> Result<Point> {
    let source: DataSource = columns
        .get(row, "source")
        .ok_or_else(|| SyncError::InvalidRow("missing source".into()))?
        .parse()
        .map_err(|e| SyncError::InvalidRow(format!("{e}")))?;
    let station_id = columns
        .get(row, "source_station_id")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SyncError::InvalidRow("missing source_station_id".into()))?
        .to_string();
    let time = columns
        .get(row, "observed_at")
        .ok_or_else(|| SyncError::InvalidRow("missing observed_at".into()))
        .and_then(|raw| parse_utc(raw).map_err(|e| SyncError::InvalidRow(format!("{e}"))))?;

    let mut fields = Vec::new();
    for name in NUMERIC_FIELDS {
        let Some(value) = columns.get(row, name).filter(|v| !is_absent(v)) else {
            continue;
        };
        if let Ok(number) = value.parse::<f64>() {
            if number.is_finite() {
                fields.push((name, FieldValue::Float(number)));
            }
        }
    }
    for name in STRING_FIELDS {
        if let Some(value) = columns.get(row, name).filter(|v| !is_absent(v)) {
            fields.push((name, FieldValue::Text(value.to_string())));
        }
    }

    Ok(Point {
        measurement: measurement.to_string(),
        source,
        station_id,
        fields,
        time,
    })
}

fn escape_key(raw: &str) -> String {
    raw.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}

fn escape_measurement(raw: &str) -> String {
    raw.replace(',', "\\,").replace(' ', "\\ ")
}

fn escape_string_field(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Point {
    pub fn has_fields(&self) -> bool {
        !self.fields.is_empty()
    }

    /// InfluxDB line protocol with a seconds timestamp.
    pub fn to_line_protocol(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|(name, value)| match value {
                FieldValue::Float(v) => format!("{name}={v}"),
                FieldValue::Text(s) => format!("{name}=\"{}\"", escape_string_field(s)),
            })
            .collect();
        format!(
            "{},source={},station_id={} {} {}",
            escape_measurement(&self.measurement),
            escape_key(self.source.as_str()),
            escape_key(&self.station_id),
            fields.join(","),
            self.time.timestamp()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Columns {
        Columns::new(&StringRecord::from(station_common::OBSERVATION_COLUMNS.to_vec()))
    }

    fn row(cells: &[(&str, &str)]) -> StringRecord {
        let values: Vec<String> = station_common::OBSERVATION_COLUMNS
            .iter()
            .map(|col| {
                cells
                    .iter()
                    .find(|(name, _)| name == col)
                    .map(|(_, v)| v.to_string())
                    .unwrap_or_default()
            })
            .collect();
        StringRecord::from(values)
    }

    #[test]
    fn test_row_to_point() {
        let record = row(&[
            ("source", "ndbc"),
            ("source_station_id", "41001"),
            ("observed_at", "2024-01-15T12:00:00Z"),
            ("air_temp_c", "15.2"),
            ("wind_direction_deg", "270"),
            ("dewpoint_c", "None"),
            ("visibility_m", "null"),
            ("pressure_tendency", "falling"),
        ]);

        let point = from_row("observation", &columns(), &record).unwrap();

        assert_eq!(point.source, DataSource::Ndbc);
        assert_eq!(point.station_id, "41001");
        assert_eq!(point.time.timestamp(), 1705320000);
        assert_eq!(
            point.fields,
            vec![
                ("air_temp_c", FieldValue::Float(15.2)),
                ("wind_direction_deg", FieldValue::Float(270.0)),
                ("pressure_tendency", FieldValue::Text("falling".into())),
            ]
        );
    }

    #[test]
    fn test_line_protocol() {
        let record = row(&[
            ("source", "isd"),
            ("source_station_id", "725030 14732"),
            ("observed_at", "2024-01-15T12:00:00Z"),
            ("pressure_hpa", "1013.2"),
            ("weather_code", "Light \"Rain\""),
        ]);
        let point = from_row("observation", &columns(), &record).unwrap();

        assert_eq!(
            point.to_line_protocol(),
            "observation,source=isd,station_id=725030\\ 14732 pressure_hpa=1013.2,weather_code=\"Light \\\"Rain\\\"\" 1705320000"
        );
    }

    #[test]
    fn test_non_utc_timestamp_rejected() {
        let record = row(&[
            ("source", "nws"),
            ("source_station_id", "KJFK"),
            ("observed_at", "2024-01-15T12:00:00+02:00"),
        ]);
        assert!(matches!(
            from_row("observation", &columns(), &record),
            Err(SyncError::InvalidRow(_))
        ));
    }

    #[test]
    fn test_unknown_source_rejected() {
        let record = row(&[
            ("source", "metar"),
            ("source_station_id", "KJFK"),
            ("observed_at", "2024-01-15T12:00:00Z"),
        ]);
        assert!(from_row("observation", &columns(), &record).is_err());
    }

    #[test]
    fn test_empty_row_has_no_fields() {
        let record = row(&[
            ("source", "ndbc"),
            ("source_station_id", "41001"),
            ("observed_at", "2024-01-15T12:00:00Z"),
        ]);
        assert!(!from_row("observation", &columns(), &record).unwrap().has_fields());
    }
}
