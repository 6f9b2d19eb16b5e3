// Parsing of user-supplied points in time for the inbound surfaces.
//
// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates. A plain date resolves to the first
// or the last second of that UTC day depending on which end of a range it bounds.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp {0:?}, expected RFC 3339 or YYYY-MM-DD")]
pub struct InvalidTimestamp(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayEdge {
    Start,
    End,
}

pub fn parse_timestamp(raw: &str, edge: DayEdge) -> Result<DateTime<Utc>, InvalidTimestamp> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| InvalidTimestamp(raw.to_string()))?;
    let time = match edge {
        DayEdge::Start => NaiveTime::MIN,
        DayEdge::End => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

/// Parses an optional value, treating an empty string as absent.
pub fn parse_optional(
    raw: Option<&str>,
    edge: DayEdge,
) -> Result<Option<DateTime<Utc>>, InvalidTimestamp> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_timestamp(s, edge))
        .transpose()
}
