//! `sensordash-core` - telemetry classification and temporal reconstruction.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Per-topic card view-models and reading ingestion.
pub mod dashboard;
/// Door state-change logs and open/close interval pairing.
pub mod doors;
/// Stream envelope codec.
pub mod envelope;
/// Core errors.
pub mod error;
/// Static sensor type registry.
pub mod registry;
/// Bounded sliding-window time series.
pub mod series;
/// Timestamp parsing for history payloads.
pub mod timestamp;
/// Topic parsing, location labels and ignore filtering.
pub mod topic;

pub use dashboard::{
    CardDisplay, CardViewModel, Dashboard, DashboardConfig, HistoryBatch, HistoryRequest,
    HistoryStatus, IngestOutcome, SensorBuffer,
};
pub use doors::{DoorEvent, DoorInterval, DoorState, EventLog, IntervalDuration};
pub use envelope::Envelope;
pub use error::TelemetryError;
pub use registry::{ParsedValue, SensorKind, SensorTypeDescriptor};
pub use series::{TelemetryPoint, TimeSeriesBuffer};
pub use topic::{ClassifiedReading, TopicClassifier};
