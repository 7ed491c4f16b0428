//! Identity and timestamp types for catalog rows

use chrono::{DateTime, NaiveDateTime, Utc};

/// Spatial reference system identifier, chosen by the caller.
pub type SrsId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Text form of timestamps stored in catalog tables.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp the way catalog tables store it.
pub fn format_timestamp(ts: &Timestamp) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp. Accepts the canonical form and RFC 3339.
pub fn parse_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
