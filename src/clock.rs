//! Time source and timestamp normalization.

use chrono::{DateTime, NaiveDateTime, Utc};

/// A source of the current time. Services never read the system clock directly.
pub trait Clock: Send + Sync {
    /// The current instant, in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Naive layouts accepted for stored timestamps. SQLite's `datetime('now')` yields the first.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

/// Parse a stored timestamp into UTC.
///
/// Values carrying an offset are converted to UTC. Naive values (no offset) are
/// interpreted as UTC, so arithmetic against [`Clock::now`] never mixes aware and naive
/// times.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    #[test]
    fn naive_timestamps_are_utc() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(parse_utc("2024-03-01 12:30:00"), Some(expected));
        assert_eq!(parse_utc("2024-03-01T12:30:00"), Some(expected));
        assert_eq!(parse_utc("2024-03-01 12:30:00.000"), Some(expected));
    }

    #[test]
    fn offsets_are_normalized() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        assert_eq!(parse_utc("2024-03-01T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_utc("2024-03-01T10:30:00Z"), Some(expected));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(parse_utc("yesterday"), None);
        assert_eq!(parse_utc(""), None);
    }
}
