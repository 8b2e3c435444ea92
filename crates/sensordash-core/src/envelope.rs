//! Stream envelope codec.

use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// `{topic, payload}` unit exchanged over the stream, in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Hierarchical sensor topic, `location/measurement`.
    pub topic: String,
    /// Raw payload as published on the bus.
    pub payload: String,
}

impl Envelope {
    /// Builds an envelope from a topic and a raw payload.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    /// Decodes one text frame.
    pub fn decode(text: &str) -> Result<Self, TelemetryError> {
        serde_json::from_str(text)
            .map_err(|err| TelemetryError::InvalidEnvelope(err.to_string().into()))
    }

    /// Encodes the envelope as a text frame.
    #[must_use]
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
