//! Per-topic card view-models and reading ingestion.
//!
//! [`Dashboard`] is the single owner of all per-topic state. Every accepted
//! reading goes through [`Dashboard::ingest`], which is also the only place a
//! [`CardViewModel`] is created.

#![allow(missing_docs)]

use indexmap::map::Entry;
use indexmap::IndexMap;
use smol_str::SmolStr;
use time::OffsetDateTime;

use crate::doors::{DoorEvent, DoorInterval, DoorState, EventLog, DEFAULT_INTERVAL_LIMIT};
use crate::envelope::Envelope;
use crate::registry::{ParsedValue, SensorKind, SensorTypeDescriptor};
use crate::series::{TelemetryPoint, TimeSeriesBuffer, DEFAULT_SERIES_CAPACITY};
use crate::topic::{ClassifiedReading, TopicClassifier};

/// Buffer sizing for new cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardConfig {
    pub series_capacity: usize,
    pub interval_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            series_capacity: DEFAULT_SERIES_CAPACITY,
            interval_limit: DEFAULT_INTERVAL_LIMIT,
        }
    }
}

/// Backfill needed for a freshly created card, keyed by location and
/// measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub topic: SmolStr,
    pub location: SmolStr,
    pub measurement: SmolStr,
    pub kind: SensorKind,
}

/// Result of a history fetch, ready to be applied to a card.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryBatch {
    Series(Vec<TelemetryPoint>),
    Events(Vec<DoorEvent>),
    /// The fetch failed; the card shows "no data" for its history.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStatus {
    Pending,
    Loaded,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Topic matched the ignore filter.
    Ignored,
    /// No sensor type for the measurement.
    Unroutable,
    /// First reading for the topic: a card was created.
    Created(HistoryRequest),
    /// Existing card mutated.
    Updated,
}

/// Latest displayed state of a card.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CardDisplay {
    Gauge {
        value: Option<f64>,
        /// Last payload did not parse as a number.
        parse_error: bool,
    },
    Binary {
        state: DoorState,
    },
}

/// Auxiliary per-topic buffer, owned by the card.
#[derive(Debug, Clone)]
pub enum SensorBuffer {
    Series(TimeSeriesBuffer),
    Events(EventLog),
}

#[derive(Debug, Clone)]
pub struct CardViewModel {
    reading: ClassifiedReading,
    descriptor: &'static SensorTypeDescriptor,
    display: CardDisplay,
    buffer: SensorBuffer,
    history: HistoryStatus,
    updated_at: OffsetDateTime,
    readings: u64,
}

impl CardViewModel {
    fn new(
        reading: ClassifiedReading,
        descriptor: &'static SensorTypeDescriptor,
        config: DashboardConfig,
        now: OffsetDateTime,
    ) -> Self {
        let (display, buffer) = match descriptor.kind {
            SensorKind::Continuous => (
                CardDisplay::Gauge {
                    value: None,
                    parse_error: false,
                },
                SensorBuffer::Series(TimeSeriesBuffer::new(config.series_capacity)),
            ),
            SensorKind::Discrete => (
                CardDisplay::Binary {
                    state: DoorState::Closed,
                },
                SensorBuffer::Events(EventLog::new(config.interval_limit)),
            ),
        };
        Self {
            reading,
            descriptor,
            display,
            buffer,
            history: HistoryStatus::Pending,
            updated_at: now,
            readings: 0,
        }
    }

    /// Applies a parsed reading. `initial` marks the creation snapshot, which
    /// updates the display but never the buffers.
    fn apply(&mut self, parsed: ParsedValue, now: OffsetDateTime, initial: bool) {
        self.updated_at = now;
        self.readings += 1;
        // Display and buffer variants are fixed by the descriptor kind at creation.
        match (&mut self.display, &mut self.buffer, parsed) {
            (
                CardDisplay::Gauge { value, parse_error },
                SensorBuffer::Series(series),
                ParsedValue::Magnitude(magnitude),
            ) => {
                if magnitude.is_nan() {
                    *parse_error = true;
                    return;
                }
                *parse_error = false;
                *value = Some(magnitude);
                if !initial {
                    series.push(TelemetryPoint::new(now, magnitude));
                }
            }
            (CardDisplay::Binary { state }, SensorBuffer::Events(log), ParsedValue::State(next)) => {
                *state = next;
                if initial {
                    log.seed_state(next, now);
                } else {
                    log.append(next, now);
                }
            }
            _ => {}
        }
    }

    fn apply_history(&mut self, batch: HistoryBatch) -> bool {
        if self.history != HistoryStatus::Pending {
            return false;
        }
        match (batch, &mut self.buffer) {
            (HistoryBatch::Series(points), SensorBuffer::Series(series)) => {
                series.seed_history(points);
            }
            (HistoryBatch::Events(events), SensorBuffer::Events(log)) => {
                log.seed_history(events);
            }
            (HistoryBatch::Unavailable, _) => {
                self.history = HistoryStatus::Unavailable;
                return true;
            }
            _ => return false,
        }
        self.history = HistoryStatus::Loaded;
        true
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.reading.topic
    }

    #[must_use]
    pub fn reading(&self) -> &ClassifiedReading {
        &self.reading
    }

    #[must_use]
    pub fn descriptor(&self) -> &'static SensorTypeDescriptor {
        self.descriptor
    }

    #[must_use]
    pub fn kind(&self) -> SensorKind {
        self.descriptor.kind
    }

    #[must_use]
    pub fn display(&self) -> CardDisplay {
        self.display
    }

    #[must_use]
    pub fn buffer(&self) -> &SensorBuffer {
        &self.buffer
    }

    #[must_use]
    pub fn series(&self) -> Option<&TimeSeriesBuffer> {
        match &self.buffer {
            SensorBuffer::Series(series) => Some(series),
            SensorBuffer::Events(_) => None,
        }
    }

    #[must_use]
    pub fn events(&self) -> Option<&EventLog> {
        match &self.buffer {
            SensorBuffer::Events(log) => Some(log),
            SensorBuffer::Series(_) => None,
        }
    }

    /// Display-limited intervals; empty for continuous sensors.
    #[must_use]
    pub fn recent_intervals(&self) -> Vec<DoorInterval> {
        self.events()
            .map(EventLog::recent_intervals)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn history_status(&self) -> HistoryStatus {
        self.history
    }

    #[must_use]
    pub fn updated_at(&self) -> OffsetDateTime {
        self.updated_at
    }

    /// Number of readings applied, including the creation snapshot.
    #[must_use]
    pub fn readings(&self) -> u64 {
        self.readings
    }

    /// Formatted value: `21.5°C`, `--°C` before the first number, or the
    /// state label for binary sensors.
    #[must_use]
    pub fn display_value(&self) -> String {
        match self.display {
            CardDisplay::Gauge { value: Some(value), .. } => {
                format!("{value:.1}{}", self.descriptor.unit)
            }
            CardDisplay::Gauge { value: None, .. } => format!("--{}", self.descriptor.unit),
            CardDisplay::Binary { state } => self
                .descriptor
                .binary()
                .map_or(state.as_str(), |binary| binary.style_for(state).label)
                .to_string(),
        }
    }

    /// Colour of the current gauge zone or binary state.
    #[must_use]
    pub fn accent_color(&self) -> Option<&'static str> {
        match self.display {
            CardDisplay::Gauge { value, .. } => {
                let gauge = self.descriptor.gauge()?;
                gauge.zone_for(value?).map(|zone| zone.color)
            }
            CardDisplay::Binary { state } => self
                .descriptor
                .binary()
                .map(|binary| binary.style_for(state).color),
        }
    }
}

/// Owner of every card, keyed by topic in creation order.
#[derive(Debug, Clone, Default)]
pub struct Dashboard {
    classifier: TopicClassifier,
    config: DashboardConfig,
    cards: IndexMap<SmolStr, CardViewModel>,
}

impl Dashboard {
    #[must_use]
    pub fn new(classifier: TopicClassifier, config: DashboardConfig) -> Self {
        Self {
            classifier,
            config,
            cards: IndexMap::new(),
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &TopicClassifier {
        &self.classifier
    }

    #[must_use]
    pub fn config(&self) -> DashboardConfig {
        self.config
    }

    /// Full pipeline for one stream envelope: ignore filter, classification,
    /// ingestion.
    pub fn handle_envelope(&mut self, envelope: &Envelope, now: OffsetDateTime) -> IngestOutcome {
        if self.classifier.should_ignore(&envelope.topic) {
            return IngestOutcome::Ignored;
        }
        let reading = match self.cards.get(envelope.topic.as_str()) {
            Some(card) => card.reading.clone(),
            None => self.classifier.classify(&envelope.topic),
        };
        self.ingest(reading, &envelope.payload, now)
    }

    /// Ingests one classified reading.
    ///
    /// The first accepted reading for a topic creates its card and only seeds
    /// the display; later readings update the display and feed the buffer.
    pub fn ingest(
        &mut self,
        reading: ClassifiedReading,
        payload: &str,
        now: OffsetDateTime,
    ) -> IngestOutcome {
        let Some(descriptor) = reading.sensor_type else {
            return IngestOutcome::Unroutable;
        };
        let parsed = descriptor.parse_value(payload);
        let config = self.config;
        match self.cards.entry(reading.topic.clone()) {
            Entry::Occupied(entry) => {
                entry.into_mut().apply(parsed, now, false);
                IngestOutcome::Updated
            }
            Entry::Vacant(entry) => {
                let request = HistoryRequest {
                    topic: reading.topic.clone(),
                    location: reading.location.clone(),
                    measurement: reading.measurement.clone(),
                    kind: descriptor.kind,
                };
                entry
                    .insert(CardViewModel::new(reading, descriptor, config, now))
                    .apply(parsed, now, true);
                IngestOutcome::Created(request)
            }
        }
    }

    /// Seeds a card's buffer from a history fetch. Only the first batch for a
    /// card is applied.
    pub fn apply_history(&mut self, topic: &str, batch: HistoryBatch) -> bool {
        self.cards
            .get_mut(topic)
            .is_some_and(|card| card.apply_history(batch))
    }

    #[must_use]
    pub fn card(&self, topic: &str) -> Option<&CardViewModel> {
        self.cards.get(topic)
    }

    /// Cards in creation order.
    pub fn cards(&self) -> impl Iterator<Item = &CardViewModel> + '_ {
        self.cards.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-06-01 09:00 UTC);

    #[test]
    fn creation_snapshot_does_not_touch_series() {
        let mut dashboard = Dashboard::default();
        let outcome = dashboard.handle_envelope(&Envelope::new("home/salon/temp", "21.5"), T0);
        assert!(matches!(outcome, IngestOutcome::Created(_)));
        let card = dashboard.card("home/salon/temp").expect("card");
        assert_eq!(card.display_value(), "21.5°C");
        assert_eq!(card.series().map(TimeSeriesBuffer::len), Some(0));
        assert_eq!(card.accent_color(), Some("#4ecca3"));
    }

    #[test]
    fn nan_keeps_previous_magnitude() {
        let mut dashboard = Dashboard::default();
        dashboard.handle_envelope(&Envelope::new("home/salon/temp", "20"), T0);
        dashboard.handle_envelope(&Envelope::new("home/salon/temp", "sensor fault"), T0);
        let card = dashboard.card("home/salon/temp").expect("card");
        assert_eq!(
            card.display(),
            CardDisplay::Gauge {
                value: Some(20.0),
                parse_error: true,
            }
        );
        assert_eq!(card.series().map(TimeSeriesBuffer::len), Some(0));
        assert_eq!(card.readings(), 2);
    }

    #[test]
    fn nan_first_reading_still_creates_card() {
        let mut dashboard = Dashboard::default();
        dashboard.handle_envelope(&Envelope::new("home/terraza/temp", "n/a"), T0);
        let card = dashboard.card("home/terraza/temp").expect("card");
        assert_eq!(card.display_value(), "--°C");
        assert_eq!(card.accent_color(), None);
    }

    #[test]
    fn history_applies_once_and_reports_unavailable() {
        let mut dashboard = Dashboard::default();
        dashboard.handle_envelope(&Envelope::new("home/entrada/door", "closed"), T0);
        assert!(!dashboard.apply_history("home/entrada/door", HistoryBatch::Series(Vec::new())));
        assert!(dashboard.apply_history("home/entrada/door", HistoryBatch::Unavailable));
        let card = dashboard.card("home/entrada/door").expect("card");
        assert_eq!(card.history_status(), HistoryStatus::Unavailable);
        assert!(!dashboard.apply_history("home/entrada/door", HistoryBatch::Events(Vec::new())));
        assert!(!dashboard.apply_history("home/other/door", HistoryBatch::Unavailable));
    }

    #[test]
    fn known_topic_reuses_card_classification() {
        let classifier = TopicClassifier::new().with_label("lab", "Laboratorio");
        let mut dashboard = Dashboard::new(classifier, DashboardConfig::default());
        dashboard.handle_envelope(&Envelope::new("lab/temp", "5"), T0);
        dashboard.handle_envelope(&Envelope::new("lab/temp", "6"), T0);
        assert_eq!(dashboard.len(), 1);
        let card = dashboard.card("lab/temp").expect("card");
        assert_eq!(card.reading().location_label, "Laboratorio");
        assert_eq!(card.accent_color(), Some("#3498db"));
    }
}
