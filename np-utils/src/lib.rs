//! Shared utility functions for noise pulse crates.

/// Date utility functions
pub mod dates {
    use crate::error::DateError;
    use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, TimeZone, Utc};

    /// Milliseconds in one calendar day.
    pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

    /// Format a NaiveDate as "YYYY-MM-DD"
    pub fn format_date(date: &NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    /// Parse a date string in "YYYY-MM-DD" format
    pub fn parse_date(s: &str) -> Result<NaiveDate, DateError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| DateError(format!("{s:?}: {e}")))
    }

    /// Year-month key ("YYYY-MM") of an instant, taken in UTC.
    pub fn month_key<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
        let utc = instant.with_timezone(&Utc);
        format!("{:04}-{:02}", utc.year(), utc.month())
    }

    /// Year-month key ("YYYY-MM") of a calendar date.
    pub fn month_key_of_date(date: &NaiveDate) -> String {
        format!("{:04}-{:02}", date.year(), date.month())
    }

    /// Midnight UTC at the start of the given date.
    pub fn utc_midnight(date: &NaiveDate) -> DateTime<Utc> {
        date.and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .unwrap_or_default()
    }

    /// ISO-8601 timestamp with millisecond precision and a `Z` suffix,
    /// e.g. `2025-06-01T12:00:00.000Z`.
    pub fn iso_timestamp<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
        instant
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Whole days elapsed from `from` to `to`, rounded toward negative infinity.
    pub fn whole_days_between<A: TimeZone, B: TimeZone>(from: &DateTime<A>, to: &DateTime<B>) -> i64 {
        let millis = to.timestamp_millis() - from.timestamp_millis();
        millis.div_euclid(MILLIS_PER_DAY)
    }

    /// Fractional days elapsed since the Unix epoch.
    pub fn epoch_days<Tz: TimeZone>(instant: &DateTime<Tz>) -> f64 {
        instant.timestamp_millis() as f64 / MILLIS_PER_DAY as f64
    }

    /// Two-digit "HH:MM" clock label in the instant's own offset.
    pub fn clock_label<Tz: TimeZone>(instant: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        instant.format("%H:%M").to_string()
    }

}

/// Rounding helpers
pub mod math {
    /// Round to a fixed number of decimal places (half away from zero).
    pub fn round_to(value: f64, decimals: i32) -> f64 {
        let factor = 10f64.powi(decimals);
        (value * factor).round() / factor
    }

    #[cfg(test)]
    mod tests {
        use super::round_to;

        #[test]
        fn test_round_to() {
            assert_eq!(round_to(72.948, 1), 72.9);
            assert_eq!(round_to(8.684, 2), 8.68);
            assert_eq!(round_to(-1.26, 1), -1.3);
        }
    }
}

/// Error types
pub mod error {
    use std::fmt;

    #[derive(Debug)]
    pub struct DateError(pub String);

    impl fmt::Display for DateError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "Date error: {}", self.0)
        }
    }

    impl std::error::Error for DateError {}
}
