//! History backfill sources.
//!
//! A freshly created card asks for its recent past once. Failures are never
//! surfaced to the dashboard: the card simply records that no history is
//! available.

#![allow(missing_docs)]

use std::time::Duration;

use sensordash_core::doors::{DoorEvent, DoorState};
use sensordash_core::series::TelemetryPoint;
use sensordash_core::timestamp::parse_timestamp;
use sensordash_core::{HistoryBatch, HistoryRequest, SensorKind};
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::{debug, warn};

use crate::error::DashError;

/// Where backfill data comes from.
pub trait HistorySource: Send + Sync {
    /// Recent samples for a continuous sensor, oldest first.
    fn series(&self, location: &str, measurement: &str) -> Result<Vec<TelemetryPoint>, DashError>;

    /// Recent state changes for a discrete sensor, oldest first.
    fn events(&self, location: &str, measurement: &str) -> Result<Vec<DoorEvent>, DashError>;
}

/// Runs the fetch matching the request's sensor kind.
pub fn fetch_batch(source: &dyn HistorySource, request: &HistoryRequest) -> HistoryBatch {
    let result = match request.kind {
        SensorKind::Continuous => source
            .series(&request.location, &request.measurement)
            .map(HistoryBatch::Series),
        SensorKind::Discrete => source
            .events(&request.location, &request.measurement)
            .map(HistoryBatch::Events),
    };
    match result {
        Ok(batch) => batch,
        Err(err) => {
            warn!(topic = %request.topic, %err, "history unavailable");
            HistoryBatch::Unavailable
        }
    }
}

/// `GET /api/history` and `GET /api/events` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpHistory {
    agent: ureq::Agent,
    base_url: SmolStr,
}

impl HttpHistory {
    #[must_use]
    pub fn new(base_url: impl Into<SmolStr>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: base_url.into(),
        }
    }

    fn fetch(&self, path: &str, location: &str, measurement: &str) -> Result<String, DashError> {
        let url = format!("{}{path}", self.base_url);
        let mut response = self
            .agent
            .get(&url)
            .query("location", location)
            .query("measurement", measurement)
            .call()
            .map_err(|err| DashError::History(format!("{path}: {err}").into()))?;
        response
            .body_mut()
            .read_to_string()
            .map_err(|err| DashError::History(format!("{path}: {err}").into()))
    }
}

impl HistorySource for HttpHistory {
    fn series(&self, location: &str, measurement: &str) -> Result<Vec<TelemetryPoint>, DashError> {
        parse_series_body(&self.fetch("/api/history", location, measurement)?)
    }

    fn events(&self, location: &str, measurement: &str) -> Result<Vec<DoorEvent>, DashError> {
        parse_events_body(&self.fetch("/api/events", location, measurement)?)
    }
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    time: String,
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    time: String,
    value: String,
}

/// Decodes `[{time, value: number}]`. Entries with a bad timestamp or a
/// missing value are skipped.
pub fn parse_series_body(body: &str) -> Result<Vec<TelemetryPoint>, DashError> {
    let entries: Vec<SeriesEntry> = serde_json::from_str(body)
        .map_err(|err| DashError::History(format!("history body: {err}").into()))?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| {
            let value = entry.value?;
            match parse_timestamp(&entry.time) {
                Ok(time) => Some(TelemetryPoint::new(time, value)),
                Err(err) => {
                    debug!(%err, "skipping history entry");
                    None
                }
            }
        })
        .collect())
}

/// Decodes `[{time, value: "open" | "closed"}]`. Entries with a bad
/// timestamp are skipped.
pub fn parse_events_body(body: &str) -> Result<Vec<DoorEvent>, DashError> {
    let entries: Vec<EventEntry> = serde_json::from_str(body)
        .map_err(|err| DashError::History(format!("events body: {err}").into()))?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match parse_timestamp(&entry.time) {
            Ok(time) => Some(DoorEvent::new(time, DoorState::parse(&entry.value))),
            Err(err) => {
                debug!(%err, "skipping event entry");
                None
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use sensordash_core::series::TelemetryPoint;
    use smol_str::SmolStr;
    use time::macros::datetime;

    use super::*;

    struct FailingSource;

    impl HistorySource for FailingSource {
        fn series(&self, _: &str, _: &str) -> Result<Vec<TelemetryPoint>, DashError> {
            Err(DashError::History("connection refused".into()))
        }

        fn events(&self, _: &str, _: &str) -> Result<Vec<DoorEvent>, DashError> {
            Err(DashError::History("connection refused".into()))
        }
    }

    #[test]
    fn series_body_skips_bad_entries() {
        let body = r#"[
            {"time": "2024-06-01T18:00:00Z", "value": 20.5},
            {"time": "yesterday", "value": 21.0},
            {"time": "2024-06-01T18:01:00", "value": null},
            {"time": "2024-06-01T18:02:00", "value": 21.5}
        ]"#;
        let points = parse_series_body(body).expect("series");
        assert_eq!(
            points,
            vec![
                TelemetryPoint::new(datetime!(2024-06-01 18:00 UTC), 20.5),
                TelemetryPoint::new(datetime!(2024-06-01 18:02 UTC), 21.5),
            ]
        );
    }

    #[test]
    fn events_body_maps_states() {
        let body = r#"[
            {"time": "2024-06-01T18:00:00+00:00", "value": "open"},
            {"time": "2024-06-01T18:05:00Z", "value": "closed"}
        ]"#;
        let events = parse_events_body(body).expect("events");
        assert_eq!(
            events,
            vec![
                DoorEvent::new(datetime!(2024-06-01 18:00 UTC), DoorState::Open),
                DoorEvent::new(datetime!(2024-06-01 18:05 UTC), DoorState::Closed),
            ]
        );
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(matches!(
            parse_series_body("<html>"),
            Err(DashError::History(_))
        ));
        assert!(parse_events_body(r#"{"detail": "nope"}"#).is_err());
    }

    #[test]
    fn failed_fetch_means_unavailable() {
        let request = HistoryRequest {
            topic: SmolStr::new("home/salon/temp"),
            location: SmolStr::new("home/salon"),
            measurement: SmolStr::new("temp"),
            kind: SensorKind::Continuous,
        };
        assert_eq!(fetch_batch(&FailingSource, &request), HistoryBatch::Unavailable);
    }
}
