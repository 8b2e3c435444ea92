//! `sensordash-runtime` - live stream connection, history backfill and the
//! single-threaded session loop around the `sensordash-core` dashboard.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Dashboard configuration loading.
pub mod config;
/// Connection state machine and reconnect scheduling.
pub mod connection;
/// Runtime errors.
pub mod error;
/// History backfill sources.
pub mod history;
/// Websocket link to the telemetry bridge.
pub mod link;
/// Session event loop.
pub mod session;
/// Rendering-side observers.
pub mod view;

pub use config::{DashConfig, ServerConfig};
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, Connector};
pub use error::DashError;
pub use history::{HistorySource, HttpHistory};
pub use link::WsConnector;
pub use session::Session;
pub use view::{LogSink, ViewSink};
