use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Parse an RFC 3339 timestamp into UTC
pub fn parse_timestamp(ts: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .context("Failed to parse timestamp")
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build a UTC timestamp from seconds and nanoseconds since the Unix epoch
pub fn from_epoch(secs: i64, nanos: u32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, nanos)
}

/// Whole days elapsed from `earlier` to `later`.
///
/// Partial days are truncated. A negative span (clock skew) counts as zero.
pub fn whole_days_between(earlier: &DateTime<Utc>, later: &DateTime<Utc>) -> u64 {
    let days = later.signed_duration_since(*earlier).num_days();
    u64::try_from(days).unwrap_or(0)
}

/// Format a date the way report file names carry it: `MMDDYYYY`
pub fn format_report_date(date: NaiveDate) -> String {
    date.format("%m%d%Y").to_string()
}
