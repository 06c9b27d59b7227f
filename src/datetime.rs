//! Date/time utilities for roomcast.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC with
//! millisecond precision, so comparing the stored text orders by time.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time formatted for storage.
pub fn now_db_timestamp() -> String {
    to_db_timestamp(&Utc::now())
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339 and the SQLite `datetime('now')` format. Unparseable
/// input falls back to the Unix epoch so a corrupt row never aborts a read.
pub fn parse_db_timestamp(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }
    tracing::warn!("Unparseable timestamp in database: {}", s);
    DateTime::<Utc>::UNIX_EPOCH
}
