//! Timestamp parsing for history payloads.

use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::TelemetryError;

/// Parses an RFC 3339 / ISO 8601 timestamp.
///
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(text: &str) -> Result<OffsetDateTime, TelemetryError> {
    let trimmed = text.trim();
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(value);
    }
    if let Ok(value) = OffsetDateTime::parse(trimmed, &Iso8601::DEFAULT) {
        return Ok(value);
    }
    PrimitiveDateTime::parse(trimmed, &Iso8601::DEFAULT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| TelemetryError::InvalidTimestamp(trimmed.into()))
}
