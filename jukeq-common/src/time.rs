//! Timestamp utilities
//!
//! All timestamps are stored as UTC text in millisecond precision
//! ("2026-08-23T12:34:56.789Z"). The fixed width keeps string comparison
//! and SQLite's date functions consistent with chrono ordering.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db_string(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current UTC timestamp in storage format
pub fn now_db_string() -> String {
    to_db_string(now())
}

/// Parse a stored timestamp back into a `DateTime<Utc>`
pub fn from_db_string(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Malformed stored timestamp '{}': {}", s, e)))
}

/// Storage-format timestamp for today's UTC midnight
///
/// Used for "completed today" style stats queries.
pub fn today_start_db_string() -> String {
    let midnight = now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
        .and_utc();
    to_db_string(midnight)
}
