//! Runtime errors.

#![allow(missing_docs)]

use sensordash_core::TelemetryError;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashError {
    /// Configuration error.
    #[error("invalid config '{0}'")]
    InvalidConfig(SmolStr),

    /// Websocket handshake failed.
    #[error("connect error '{0}'")]
    Connect(SmolStr),

    /// Established link failed while reading or writing.
    #[error("transport error '{0}'")]
    Transport(SmolStr),

    /// History request or body decoding failed.
    #[error("history fetch error '{0}'")]
    History(SmolStr),

    /// Worker thread could not be started.
    #[error("thread spawn error '{0}'")]
    ThreadSpawn(SmolStr),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
}
