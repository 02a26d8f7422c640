//! Time handling: analysis windows and the single local-time conversion.
//!
//! Every instant inside the engine is a `DateTime<Utc>`. The configured UTC
//! offset is applied in exactly two places, both in this module:
//!
//! - [`AnalysisWindow::local_day`] turns a local calendar day into a UTC window
//! - [`TimeZoneConfig::format_local`] renders an instant as local wall-clock time
//!
//! Provider timestamps that carry no offset are read as UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Local time zone used for day boundaries and report rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeZoneConfig {
    /// Offset of local time from UTC, in seconds east of Greenwich.
    /// Default: 18000 (UTC+5)
    pub utc_offset_seconds: i32,
}

impl Default for TimeZoneConfig {
    fn default() -> Self {
        Self {
            utc_offset_seconds: 5 * 3600,
        }
    }
}

impl TimeZoneConfig {
    /// A zero-offset zone (local time == UTC).
    pub fn utc() -> Self {
        Self {
            utc_offset_seconds: 0,
        }
    }

    /// The configured offset. Out-of-range values fall back to UTC.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| Utc.fix())
    }

    /// Convert a UTC instant to local wall-clock time.
    pub fn localize(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset())
    }

    /// Render a UTC instant as local `YYYY-MM-DD HH:MM:SS`.
    pub fn format_local(&self, instant: DateTime<Utc>) -> String {
        self.localize(instant).format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// A closed interval `[start, end]` of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl AnalysisWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The UTC window covering one local calendar day, `00:00:00..=23:59:59` local.
    ///
    /// # Example
    /// ```
    /// use chrono::NaiveDate;
    /// use region_dwell::time::{AnalysisWindow, TimeZoneConfig};
    ///
    /// let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    /// let window = AnalysisWindow::local_day(day, &TimeZoneConfig::default());
    /// // Local midnight at UTC+5 is 19:00 UTC the previous day
    /// assert_eq!(window.start.to_rfc3339(), "2025-02-28T19:00:00+00:00");
    /// ```
    pub fn local_day(day: NaiveDate, tz: &TimeZoneConfig) -> Self {
        let local_midnight = day.and_time(NaiveTime::default());
        let offset = TimeDelta::seconds(i64::from(tz.offset().local_minus_utc()));
        let start = (local_midnight - offset).and_utc();
        let end = start + TimeDelta::days(1) - TimeDelta::seconds(1);
        Self { start, end }
    }

    /// Whether `instant` falls inside the window (both ends inclusive).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// Window length in whole seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

/// One window per local calendar day from `from` to `to` inclusive.
///
/// Returns an empty list when `to` is before `from`.
pub fn day_windows(from: NaiveDate, to: NaiveDate, tz: &TimeZoneConfig) -> Vec<AnalysisWindow> {
    from.iter_days()
        .take_while(|day| *day <= to)
        .map(|day| AnalysisWindow::local_day(day, tz))
        .collect()
}

/// Parse a provider timestamp string.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` (read as UTC) and RFC 3339.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert unix seconds to an instant, rejecting out-of-range values.
pub fn from_unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}

/// Format a number of seconds as `HH:MM:SS`. Hours are not wrapped at 24.
///
/// # Example
/// ```
/// assert_eq!(region_dwell::time::format_hms(3725), "01:02:05");
/// assert_eq!(region_dwell::time::format_hms(90_000), "25:00:00");
/// ```
pub fn format_hms(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(text: &str) -> DateTime<Utc> {
        parse_timestamp(text).unwrap()
    }

    #[test]
    fn test_local_day_window_utc_plus_five() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let window = AnalysisWindow::local_day(day, &TimeZoneConfig::default());
        assert_eq!(window.start, ts("2025-02-28 19:00:00"));
        assert_eq!(window.end, ts("2025-03-01 18:59:59"));
        assert_eq!(window.duration_secs(), 86_399);
    }

    #[test]
    fn test_local_day_window_utc() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let window = AnalysisWindow::local_day(day, &TimeZoneConfig::utc());
        assert_eq!(window.start, ts("2025-03-01 00:00:00"));
        assert!(window.contains(ts("2025-03-01 23:59:59")));
        assert!(!window.contains(ts("2025-03-02 00:00:00")));
    }

    #[test]
    fn test_format_local_applies_offset_once() {
        let tz = TimeZoneConfig::default();
        assert_eq!(tz.format_local(ts("2025-03-01 10:00:00")), "2025-03-01 15:00:00");
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        let tz = TimeZoneConfig {
            utc_offset_seconds: 200_000,
        };
        assert_eq!(tz.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_day_windows() {
        let from = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 2, 2).unwrap();
        let windows = day_windows(from, to, &TimeZoneConfig::utc());
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[3].start, ts("2025-02-02 00:00:00"));
        assert!(day_windows(to, from, &TimeZoneConfig::utc()).is_empty());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(
            parse_timestamp("2025-03-01T15:00:00+05:00"),
            Some(ts("2025-03-01 10:00:00"))
        );
        assert!(parse_timestamp("yesterday").is_none());
        assert_eq!(from_unix_seconds(0), Some(ts("1970-01-01 00:00:00")));
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(59), "00:00:59");
        assert_eq!(format_hms(-5), "00:00:00");
    }
}
