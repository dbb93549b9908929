//! Query time windows in strict ISO-8601 UTC
//!
//! Trace scans are bounded by a closed interval `[start, end]`, written as
//! `YYYY-MM-DDTHH:MM:SS.sssZ` (the fractional part is optional). Only the `Z`
//! designator is accepted; offsets such as `+02:00` are rejected so windows
//! are never silently shifted.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("Timestamp '{0}' must end with 'Z' (UTC)")]
    NotUtc(String),

    #[error("Invalid timestamp '{input}': {reason}")]
    Parse { input: String, reason: String },

    #[error("Window end {end} is before start {start}")]
    Inverted { start: String, end: String },
}

/// Closed time interval for trace scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if end < start {
            return Err(WindowError::Inverted {
                start: start.format(QUERY_FORMAT).to_string(),
                end: end.format(QUERY_FORMAT).to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse both bounds from strict ISO-8601 UTC strings
    pub fn parse(start: &str, end: &str) -> Result<Self, WindowError> {
        Self::new(parse_utc(start)?, parse_utc(end)?)
    }

    /// Window covering every representable millisecond timestamp
    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Membership test for epoch-millisecond record timestamps
    pub fn contains_millis(&self, millis: i64) -> bool {
        match Utc.timestamp_millis_opt(millis).single() {
            Some(instant) => self.contains(instant),
            None => false,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Bounds formatted the way the record source expects them
    pub fn to_query_strings(&self) -> (String, String) {
        (
            self.start.format(QUERY_FORMAT).to_string(),
            self.end.format(QUERY_FORMAT).to_string(),
        )
    }
}

/// Parse a single strict ISO-8601 UTC timestamp
pub fn parse_utc(input: &str) -> Result<DateTime<Utc>, WindowError> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_suffix('Z')
        .ok_or_else(|| WindowError::NotUtc(input.to_string()))?;

    let naive = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f").map_err(|e| {
        WindowError::Parse {
            input: input.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_millis() {
        let window = TimeWindow::parse("2020-05-20T00:00:00.000Z", "2020-05-21T00:00:00.000Z").unwrap();
        assert_eq!(window.duration(), Duration::days(1));
    }

    #[test]
    fn test_parse_without_fraction() {
        let instant = parse_utc("2020-05-20T12:30:00Z").unwrap();
        assert_eq!(instant.timestamp(), 1_589_977_800);
    }

    #[test]
    fn test_rejects_offset() {
        let err = parse_utc("2020-05-20T00:00:00+02:00").unwrap_err();
        assert!(matches!(err, WindowError::NotUtc(_)));
    }

    #[test]
    fn test_rejects_garbage() {
        let err = parse_utc("yesterdayZ").unwrap_err();
        assert!(matches!(err, WindowError::Parse { .. }));
    }

    #[test]
    fn test_rejects_inverted_window() {
        let err = TimeWindow::parse("2020-05-21T00:00:00Z", "2020-05-20T00:00:00Z").unwrap_err();
        assert!(matches!(err, WindowError::Inverted { .. }));
    }

    #[test]
    fn test_closed_interval() {
        let window = TimeWindow::parse("1970-01-01T00:00:01.000Z", "1970-01-01T00:00:02.000Z").unwrap();
        assert!(window.contains_millis(1_000));
        assert!(window.contains_millis(2_000));
        assert!(window.contains_millis(1_500));
        assert!(!window.contains_millis(999));
        assert!(!window.contains_millis(2_001));
    }

    #[test]
    fn test_unbounded_contains_everything() {
        let window = TimeWindow::unbounded();
        assert!(window.contains_millis(0));
        assert!(window.contains_millis(-1_000));
        assert!(window.contains_millis(4_102_444_800_000));
    }

    #[test]
    fn test_query_strings_round_format() {
        let window = TimeWindow::parse("2020-05-20T00:00:00Z", "2020-05-20T06:00:00.5Z").unwrap();
        let (start, end) = window.to_query_strings();
        assert_eq!(start, "2020-05-20T00:00:00.000Z");
        assert_eq!(end, "2020-05-20T06:00:00.500Z");
    }
}
