//! UTC timestamp handling.
//!
//! The pipeline only ever stores UTC instants. Text that carries a non-zero
//! offset, or no offset at all, is rejected rather than guessed at.

use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use crate::error::{ValidationError, ValidationResult};

/// Parse an RFC 3339 timestamp that must be UTC (`Z` or `+00:00`).
pub fn parse_utc(s: &str) -> ValidationResult<DateTime<Utc>> {
    let s = s.trim();
    let dt = DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%:z"))
        .map_err(|_| {
            if looks_naive(s) {
                ValidationError::NonUtcTimestamp(s.to_string())
            } else {
                ValidationError::InvalidTimestamp(s.to_string())
            }
        })?;

    if dt.offset().local_minus_utc() != 0 {
        return Err(ValidationError::NonUtcTimestamp(s.to_string()));
    }

    Ok(dt.with_timezone(&Utc))
}

fn looks_naive(s: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

/// Canonical text form used in CSV files: second precision, `Z` suffix.
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Source of "now" for anything that rotates, ages or expires.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = to;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_utc_accepts_z_and_zero_offset() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(parse_utc("2024-01-15T12:00:00Z").unwrap(), expected);
        assert_eq!(parse_utc("2024-01-15T12:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_utc("2024-01-15 12:00:00+00:00").unwrap(), expected);
    }

    #[test]
    fn test_parse_utc_rejects_other_offsets() {
        let err = parse_utc("2024-01-15T12:00:00+05:00").unwrap_err();
        assert!(matches!(err, ValidationError::NonUtcTimestamp(_)));
    }

    #[test]
    fn test_parse_utc_rejects_naive() {
        let err = parse_utc("2024-01-15T12:00:00").unwrap_err();
        assert!(matches!(err, ValidationError::NonUtcTimestamp(_)));
    }

    #[test]
    fn test_parse_utc_rejects_garbage() {
        let err = parse_utc("yesterday").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidTimestamp(_)));
    }

    #[test]
    fn test_format_utc() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 5).unwrap();
        assert_eq!(format_utc(&dt), "2024-01-15T12:30:05Z");
    }

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 23, 59, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::minutes(2));
        assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 1, 16, 0, 1, 0).unwrap());
    }
}
