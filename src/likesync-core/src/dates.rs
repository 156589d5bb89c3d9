use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid timestamp '{input}'")]
pub struct DateParseError {
    pub input: String,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M",
];

/// Parse the timestamp shapes returned by streaming APIs and used in fixtures.
///
/// Accepts RFC 3339 and a few naive layouts down to a bare year. Partial dates
/// resolve to the first day of the month (or year) at midnight UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    let padded = match trimmed.len() {
        4 => format!("{trimmed}-01-01"),
        7 => format!("{trimmed}-01"),
        _ => trimmed.to_string(),
    };
    NaiveDate::parse_from_str(&padded, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| DateParseError {
            input: input.to_string(),
        })
}
