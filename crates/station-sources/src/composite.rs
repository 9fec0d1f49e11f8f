//! Decoders for ISD fixed composite fields.
//!
//! A composite field is `value,quality[,...]`. Values are integers, usually
//! scaled by 10, with a reserved sentinel magnitude for "missing". A value
//! is kept only when it is below its sentinel and its quality code is
//! accepted. Anything else decodes to `None`, never to zero.

/// Which quality codes are trusted.
///
/// ISD uses "1" for "passed all QC checks" and "5" for "not checked"; the
/// set is policy and can be widened or narrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityPolicy {
    accepted: Vec<String>,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self::new(["1", "5"])
    }
}

impl QualityPolicy {
    pub fn new<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: flags.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, flag: &str) -> bool {
        let flag = flag.trim();
        self.accepted.iter().any(|accepted| accepted == flag)
    }
}

const TEMPERATURE_SENTINEL: i64 = 9999;
const PRESSURE_SENTINEL: i64 = 99999;
const DIRECTION_SENTINEL: i64 = 999;
const SPEED_SENTINEL: i64 = 9999;
const VISIBILITY_SENTINEL: i64 = 999999;
const DEPTH_SENTINEL: i64 = 9999;

/// Decode one gated integer against its sentinel.
fn gated(value: &str, quality: &str, sentinel: i64, policy: &QualityPolicy) -> Option<i64> {
    let value: i64 = value.trim().parse().ok()?;
    if value.abs() >= sentinel || !policy.accepts(quality) {
        return None;
    }
    Some(value)
}

fn parts(raw: &str) -> Vec<&str> {
    raw.split(',').map(str::trim).collect()
}

/// TMP / DEW: `+0152,1` → 15.2 °C.
pub fn decode_temperature(raw: &str, policy: &QualityPolicy) -> Option<f64> {
    let p = parts(raw);
    let (value, quality) = (p.first()?, p.get(1)?);
    gated(value, quality, TEMPERATURE_SENTINEL, policy).map(|v| v as f64 / 10.0)
}

/// SLP: `10132,1` → 1013.2 hPa.
pub fn decode_pressure(raw: &str, policy: &QualityPolicy) -> Option<f64> {
    let p = parts(raw);
    let (value, quality) = (p.first()?, p.get(1)?);
    gated(value, quality, PRESSURE_SENTINEL, policy).map(|v| v as f64 / 10.0)
}

/// Decoded WND group. Direction and speed are gated independently.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Wind {
    pub direction_deg: Option<i32>,
    pub speed_mps: Option<f64>,
}

/// WND: `direction,dirQuality,type,speedScaled,speedQuality`.
pub fn decode_wind(raw: &str, policy: &QualityPolicy) -> Wind {
    let p = parts(raw);
    let direction_deg = match (p.first(), p.get(1)) {
        (Some(value), Some(quality)) => {
            gated(value, quality, DIRECTION_SENTINEL, policy).and_then(|v| i32::try_from(v).ok())
        }
        _ => None,
    };
    let speed_mps = match (p.get(3), p.get(4)) {
        (Some(value), Some(quality)) => {
            gated(value, quality, SPEED_SENTINEL, policy).map(|v| v as f64 / 10.0)
        }
        _ => None,
    };
    Wind {
        direction_deg,
        speed_mps,
    }
}

/// VIS: `distance,quality,variability,variabilityQuality`, distance in whole metres.
pub fn decode_visibility(raw: &str, policy: &QualityPolicy) -> Option<f64> {
    let p = parts(raw);
    let (value, quality) = (p.first()?, p.get(1)?);
    gated(value, quality, VISIBILITY_SENTINEL, policy).map(|v| v as f64)
}

/// Liquid precipitation over a fixed period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Precipitation {
    pub period_hours: u32,
    pub depth_mm: f64,
}

/// AA1..AA4: `periodHours,depthScaled,condition,quality`.
pub fn decode_precipitation(raw: &str, policy: &QualityPolicy) -> Option<Precipitation> {
    let p = parts(raw);
    let period_hours: u32 = p.first()?.parse().ok()?;
    let depth = gated(p.get(1)?, p.get(3)?, DEPTH_SENTINEL, policy)?;
    if period_hours == 99 {
        return None;
    }
    Some(Precipitation {
        period_hours,
        depth_mm: depth as f64 / 10.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::assert_approx_eq;

    #[test]
    fn test_temperature_quality_gating() {
        let q = QualityPolicy::default();
        assert_approx_eq!(decode_temperature("+0152,1", &q).unwrap(), 15.2, 1e-9);
        assert_eq!(decode_temperature("+0152,3", &q), None);
        assert_eq!(decode_temperature("+9999,1", &q), None);
        assert_approx_eq!(decode_temperature("-0050,1", &q).unwrap(), -5.0, 1e-9);
        assert_approx_eq!(decode_temperature("+0000,5", &q).unwrap(), 0.0, 1e-9);
    }

    #[test]
    fn test_temperature_malformed() {
        let q = QualityPolicy::default();
        assert_eq!(decode_temperature("", &q), None);
        assert_eq!(decode_temperature("+0152", &q), None);
        assert_eq!(decode_temperature("abc,1", &q), None);
    }

    #[test]
    fn test_wind_independent_nulling() {
        let q = QualityPolicy::default();
        let wind = decode_wind("270,1,N,0051,1", &q);
        assert_eq!(wind.direction_deg, Some(270));
        assert_approx_eq!(wind.speed_mps.unwrap(), 5.1, 1e-9);

        let wind = decode_wind("999,1,N,0051,1", &q);
        assert_eq!(wind.direction_deg, None);
        assert_approx_eq!(wind.speed_mps.unwrap(), 5.1, 1e-9);

        let wind = decode_wind("180,1,N,9999,9", &q);
        assert_eq!(wind.direction_deg, Some(180));
        assert_eq!(wind.speed_mps, None);
    }

    #[test]
    fn test_pressure_and_visibility() {
        let q = QualityPolicy::default();
        assert_approx_eq!(decode_pressure("10132,1", &q).unwrap(), 1013.2, 1e-9);
        assert_eq!(decode_pressure("99999,9", &q), None);
        assert_eq!(decode_visibility("016000,1,9,9", &q), Some(16000.0));
        assert_eq!(decode_visibility("999999,9,9,9", &q), None);
    }

    #[test]
    fn test_precipitation() {
        let q = QualityPolicy::default();
        let precip = decode_precipitation("01,0005,9,1", &q).unwrap();
        assert_eq!(precip.period_hours, 1);
        assert_approx_eq!(precip.depth_mm, 0.5, 1e-9);

        assert_eq!(decode_precipitation("06,9999,9,1", &q), None);
        assert_eq!(decode_precipitation("06,0010,9,2", &q), None);
    }

    #[test]
    fn test_custom_quality_policy() {
        let strict = QualityPolicy::new(["1"]);
        assert_eq!(decode_temperature("+0152,5", &strict), None);
        let lenient = QualityPolicy::new(["0", "1", "4", "5", "9"]);
        assert!(decode_temperature("+0152,9", &lenient).is_some());
    }
}
