//! Canonical timestamps and query windows.
//!
//! Every timestamp crossing the adapter boundary uses one textual form:
//! `YYYY-MM-DDTHH:mm:ss.sssZ`, always UTC, exactly three fractional digits
//! and a literal `Z`. [`parse_canonical`] is strict about that shape;
//! [`format_canonical`] truncates to millisecond precision.
//!
//! The form has a four-digit year, so it covers years 0000 through 9999.

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// `strftime` pattern of the canonical timestamp form.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Length in bytes of every canonical timestamp.
const CANONICAL_LEN: usize = 24;

/// A timestamp that does not follow the canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{input}` is not a canonical UTC timestamp (YYYY-MM-DDTHH:mm:ss.sssZ): {reason}")]
pub struct TimestampError {
    input: String,
    reason: String,
}

impl TimestampError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns the rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Formats a UTC instant in the canonical form.
///
/// Only instants in years 0000 through 9999 produce canonical output; chrono
/// renders other years with a sign and more digits (`+10000-…`, `-0001-…`),
/// which [`parse_canonical`] rejects.
pub fn format_canonical(dt: &DateTime<Utc>) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

/// Parses a canonical timestamp.
///
/// # Errors
///
/// Returns [`TimestampError`] when the input has the wrong length, lacks the
/// three fractional digits, or is not a valid calendar date and time. Years
/// outside 0000 through 9999 cannot be expressed and are rejected.
pub fn parse_canonical(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    if input.len() != CANONICAL_LEN {
        return Err(TimestampError::new(
            input,
            format!("expected {} characters, got {}", CANONICAL_LEN, input.len()),
        ));
    }
    if input.as_bytes().get(19) != Some(&b'.') {
        return Err(TimestampError::new(input, "missing millisecond fraction"));
    }

    NaiveDateTime::parse_from_str(input, CANONICAL_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| TimestampError::new(input, e.to_string()))
}

/// Serde adapter for `DateTime<Utc>` fields in the canonical form.
pub mod canonical {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_canonical(dt))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_canonical(&raw).map_err(de::Error::custom)
    }
}

/// A half-open interval `[start, end)` in UTC.
///
/// Unlike a validated range, a window whose start lies after its end is
/// allowed and simply overlaps nothing; the remote service decides whether
/// such a query is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Parses both bounds from canonical timestamps.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimestampError> {
        Ok(Self::new(parse_canonical(start)?, parse_canonical(end)?))
    }

    /// Checks if a datetime falls within this window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.start <= dt && dt < self.end
    }

    /// Checks if an item spanning `[start, end)` overlaps this window.
    ///
    /// Zero-length items are treated as instants and overlap when the window
    /// contains them.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        if start == end {
            return self.contains(start);
        }
        start < self.end && end > self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    mod canonical_form {
        use super::*;

        #[test]
        fn formats_with_three_fraction_digits() {
            let dt = utc(2020, 10, 11, 0, 0, 0);
            assert_eq!(format_canonical(&dt), "2020-10-11T00:00:00.000Z");

            let dt = utc(2020, 12, 11, 12, 34, 56) + Duration::milliseconds(789);
            assert_eq!(format_canonical(&dt), "2020-12-11T12:34:56.789Z");
        }

        #[test]
        fn formatting_truncates_below_milliseconds() {
            let dt = utc(2021, 1, 2, 3, 4, 5) + Duration::microseconds(123_999);
            assert_eq!(format_canonical(&dt), "2021-01-02T03:04:05.123Z");
        }

        #[test]
        fn parses_canonical_input() {
            let dt = parse_canonical("2020-12-11T12:34:56.789Z").unwrap();
            assert_eq!(dt, utc(2020, 12, 11, 12, 34, 56) + Duration::milliseconds(789));
        }

        #[test]
        fn round_trips_to_millisecond_precision() {
            let instants = [
                utc(1970, 1, 1, 0, 0, 0),
                utc(2020, 2, 29, 23, 59, 59) + Duration::milliseconds(999),
                utc(2038, 1, 19, 3, 14, 8) + Duration::milliseconds(1),
                utc(2099, 12, 31, 0, 0, 0) + Duration::microseconds(456_789),
            ];

            for instant in instants {
                let parsed = parse_canonical(&format_canonical(&instant)).unwrap();
                assert_eq!(
                    parsed.timestamp_millis(),
                    instant.timestamp_millis(),
                    "round trip of {instant}"
                );
            }
        }

        #[test]
        fn rejects_non_canonical_input() {
            for input in [
                "",
                "2020-10-11",
                "2020-10-11T00:00:00Z",
                "2020-10-11T00:00:00.0Z",
                "2020-10-11T00:00:00.0000Z",
                "2020-10-11T00:00:00.000+00:00",
                "2020-10-11 00:00:00.000Z",
                "2020-13-11T00:00:00.000Z",
                "2020-02-30T00:00:00.000Z",
                "2020-10-11T25:00:00.000Z",
                "not a timestamp at all!!",
            ] {
                assert!(parse_canonical(input).is_err(), "accepted `{input}`");
            }
        }

        #[test]
        fn error_keeps_input() {
            let err = parse_canonical("yesterday").unwrap_err();
            assert_eq!(err.input(), "yesterday");
            assert!(err.to_string().contains("yesterday"));
        }

        #[test]
        fn serde_adapter_uses_canonical_text() {
            #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
            struct Stamp {
                #[serde(with = "canonical")]
                at: DateTime<Utc>,
            }

            let stamp = Stamp {
                at: utc(2020, 10, 11, 8, 30, 0),
            };
            let json = serde_json::to_string(&stamp).unwrap();
            assert_eq!(json, r#"{"at":"2020-10-11T08:30:00.000Z"}"#);
            assert_eq!(serde_json::from_str::<Stamp>(&json).unwrap(), stamp);

            let bad = serde_json::from_str::<Stamp>(r#"{"at":"2020-10-11T08:30:00Z"}"#);
            assert!(bad.is_err());
        }
    }

    mod time_window {
        use super::*;

        #[test]
        fn parse_bounds() {
            let window =
                TimeWindow::parse("2020-10-11T00:00:00.000Z", "2020-12-11T12:34:56.789Z").unwrap();
            assert_eq!(window.start, utc(2020, 10, 11, 0, 0, 0));
            assert!(TimeWindow::parse("2020-10-11T00:00:00.000Z", "soon").is_err());
        }

        #[test]
        fn contains_is_half_open() {
            let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));
            assert!(window.contains(utc(2025, 2, 5, 9, 0, 0)));
            assert!(window.contains(utc(2025, 2, 5, 16, 59, 59)));
            assert!(!window.contains(utc(2025, 2, 5, 17, 0, 0)));
            assert!(!window.contains(utc(2025, 2, 5, 8, 59, 59)));
        }

        #[test]
        fn overlaps() {
            let window = TimeWindow::new(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 17, 0, 0));

            // inside, straddling either edge, enclosing
            assert!(window.overlaps(utc(2025, 2, 5, 10, 0, 0), utc(2025, 2, 5, 11, 0, 0)));
            assert!(window.overlaps(utc(2025, 2, 5, 8, 0, 0), utc(2025, 2, 5, 10, 0, 0)));
            assert!(window.overlaps(utc(2025, 2, 5, 16, 0, 0), utc(2025, 2, 5, 18, 0, 0)));
            assert!(window.overlaps(utc(2025, 2, 5, 8, 0, 0), utc(2025, 2, 5, 18, 0, 0)));

            // touching edges
            assert!(!window.overlaps(utc(2025, 2, 5, 8, 0, 0), utc(2025, 2, 5, 9, 0, 0)));
            assert!(!window.overlaps(utc(2025, 2, 5, 17, 0, 0), utc(2025, 2, 5, 18, 0, 0)));

            // instants
            assert!(window.overlaps(utc(2025, 2, 5, 9, 0, 0), utc(2025, 2, 5, 9, 0, 0)));
            assert!(!window.overlaps(utc(2025, 2, 5, 17, 0, 0), utc(2025, 2, 5, 17, 0, 0)));
        }

        #[test]
        fn inverted_window_overlaps_nothing() {
            let window = TimeWindow::new(utc(2025, 2, 5, 17, 0, 0), utc(2025, 2, 5, 9, 0, 0));
            assert!(!window.overlaps(utc(2025, 2, 5, 10, 0, 0), utc(2025, 2, 5, 11, 0, 0)));
        }
    }

    #[test]
    fn year_range_is_four_digits() {
        for year in [0, 1970, 9999] {
            let dt = Utc.with_ymd_and_hms(year, 12, 31, 23, 59, 59).unwrap();
            assert_eq!(parse_canonical(&format_canonical(&dt)).unwrap(), dt, "{year}");
        }

        for year in [10000, -1] {
            let dt = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
            let formatted = format_canonical(&dt);
            assert_ne!(formatted.len(), 24, "{formatted}");
            assert!(parse_canonical(&formatted).is_err(), "{formatted}");
        }
    }
}
