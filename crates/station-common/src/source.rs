//! Data origin and pressure tendency enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upstream network a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// NOAA National Data Buoy Center
    Ndbc,
    /// NOAA Integrated Surface Database
    Isd,
    /// WMO OSCAR/Surface station registry
    Oscar,
    /// NOAA National Weather Service API
    Nws,
    /// Open-Meteo forecast API (current conditions)
    OpenMeteo,
}

impl DataSource {
    pub const ALL: [DataSource; 5] = [
        DataSource::Ndbc,
        DataSource::Isd,
        DataSource::Oscar,
        DataSource::Nws,
        DataSource::OpenMeteo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Ndbc => "ndbc",
            DataSource::Isd => "isd",
            DataSource::Oscar => "oscar",
            DataSource::Nws => "nws",
            DataSource::OpenMeteo => "openmeteo",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ndbc" => Ok(DataSource::Ndbc),
            "isd" => Ok(DataSource::Isd),
            "oscar" => Ok(DataSource::Oscar),
            "nws" => Ok(DataSource::Nws),
            "openmeteo" | "open-meteo" => Ok(DataSource::OpenMeteo),
            other => Err(ValidationError::UnknownSource(other.to_string())),
        }
    }
}

/// Three-hour pressure tendency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureTendency {
    Rising,
    Falling,
    Steady,
}

impl PressureTendency {
    pub fn as_str(&self) -> &'static str {
        match self {
            PressureTendency::Rising => "rising",
            PressureTendency::Falling => "falling",
            PressureTendency::Steady => "steady",
        }
    }

    /// Tendency from a signed pressure change in hPa.
    pub fn from_change(delta_hpa: f64) -> Option<Self> {
        if !delta_hpa.is_finite() {
            return None;
        }
        Some(if delta_hpa > 0.0 {
            PressureTendency::Rising
        } else if delta_hpa < 0.0 {
            PressureTendency::Falling
        } else {
            PressureTendency::Steady
        })
    }
}

impl fmt::Display for PressureTendency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PressureTendency {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rising" => Ok(PressureTendency::Rising),
            "falling" => Ok(PressureTendency::Falling),
            "steady" => Ok(PressureTendency::Steady),
            other => Err(ValidationError::UnknownTendency(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_round_trips_through_str() {
        for source in DataSource::ALL {
            assert_eq!(source.as_str().parse::<DataSource>().unwrap(), source);
        }
        assert_eq!("NDBC".parse::<DataSource>().unwrap(), DataSource::Ndbc);
        assert!("metar".parse::<DataSource>().is_err());
    }

    #[test]
    fn test_source_serializes_lowercase() {
        let json = serde_json::to_string(&DataSource::OpenMeteo).unwrap();
        assert_eq!(json, "\"openmeteo\"");
    }

    #[test]
    fn test_tendency_from_change() {
        assert_eq!(PressureTendency::from_change(1.2), Some(PressureTendency::Rising));
        assert_eq!(PressureTendency::from_change(-0.4), Some(PressureTendency::Falling));
        assert_eq!(PressureTendency::from_change(0.0), Some(PressureTendency::Steady));
        assert_eq!(PressureTendency::from_change(f64::NAN), None);
    }
}
