//! # Temporal Types — Store-Precision Timestamps
//!
//! Defines `Timestamp`, the value carried by `date` fields. The document
//! store keeps datetimes as milliseconds since the Unix epoch in UTC, so
//! every `Timestamp` is normalized to UTC and truncated to milliseconds at
//! construction. Two timestamps that the store would consider equal always
//! compare equal here.
//!
//! Inputs with any RFC 3339 offset are accepted and converted to UTC.
//! Output is always `YYYY-MM-DDTHH:MM:SS.mmmZ`.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// A UTC timestamp truncated to millisecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated to milliseconds.
    pub fn now() -> Self {
        Self(truncate_to_millis(Utc::now()))
    }

    /// From a `chrono::DateTime<Utc>`, truncating sub-millisecond precision.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::InvalidDate`] if the string is not RFC 3339.
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValueError::InvalidDate {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_millis(dt.with_timezone(&Utc))))
    }

    /// From milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Result<Self, ValueError> {
        let dt = DateTime::from_timestamp_millis(millis).ok_or_else(|| ValueError::InvalidDate {
            value: millis.to_string(),
            reason: "out of range".to_string(),
        })?;
        Ok(Self(dt))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since the Unix epoch.
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// The same instant truncated to midnight UTC.
    pub fn start_of_day(&self) -> Self {
        let midnight = self
            .0
            .with_hour(0)
            .and_then(|dt| dt.with_minute(0))
            .and_then(|dt| dt.with_second(0))
            .and_then(|dt| dt.with_nanosecond(0))
            .unwrap_or(self.0);
        Self(midnight)
    }

    /// Render as RFC 3339 with millisecond precision and `Z` suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000 * 1_000_000;
    dt.with_nanosecond(millis).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_utc() {
        let ts = Timestamp::parse("2024-03-01T10:20:30Z").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:20:30.000Z");
    }

    #[test]
    fn test_parse_offset_converts_to_utc() {
        let ts = Timestamp::parse("2024-03-01T12:20:30+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:20:30.000Z");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = Timestamp::parse("yesterday").unwrap_err();
        assert!(matches!(err, ValueError::InvalidDate { .. }));
    }

    #[test]
    fn test_sub_millisecond_truncated() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::nanoseconds(1_234_567);
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.to_rfc3339(), "2024-01-01T00:00:00.001Z");
    }

    #[test]
    fn test_millis_roundtrip() {
        let ts = Timestamp::from_millis(1_700_000_000_123).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_start_of_day() {
        let ts = Timestamp::parse("2024-03-01T23:59:59.999Z").unwrap();
        assert_eq!(ts.start_of_day().to_rfc3339(), "2024-03-01T00:00:00.000Z");
    }
}
