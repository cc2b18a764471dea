//! Shared utility functions for the tracker.

use chrono::{DateTime, Utc};

/// Current instant as RFC 3339 text, the format every persisted timestamp
/// uses. Written once here so string ordering stays comparable across rows.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Whole minutes between two RFC 3339 timestamps, floored. None when either
/// timestamp fails to parse; a bad timestamp drops the derived duration
/// rather than failing the write that computed it.
pub fn minutes_between(started_at: &str, completed_at: &str) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(started_at).ok()?;
    let end = DateTime::parse_from_rfc3339(completed_at).ok()?;
    Some((end - start).num_seconds().div_euclid(60))
}
