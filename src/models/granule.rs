use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Acquisition window declared by one raw granule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranuleReference {
    pub filename: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl GranuleReference {
    pub fn new(filename: String, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            filename,
            start,
            end,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }
}

/// Parse an ISO-8601 instant as written in product attributes.
///
/// Accepts RFC 3339 (`2023-05-01T05:12:33Z`, with or without fractional
/// seconds) and offset-less forms, which are taken as UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f"))?;
    Ok(naive.and_utc())
}
