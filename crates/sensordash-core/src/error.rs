//! Core errors.

#![allow(missing_docs)]

use smol_str::SmolStr;
use thiserror::Error;

/// Errors raised while decoding stream and history data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// Stream frame is not a `{topic, payload}` object.
    #[error("invalid envelope '{0}'")]
    InvalidEnvelope(SmolStr),

    /// Timestamp is neither RFC 3339 nor ISO 8601.
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(SmolStr),
}
