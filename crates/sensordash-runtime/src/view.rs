//! Rendering-side observers.

use sensordash_core::{CardViewModel, HistoryStatus};
use tracing::{debug, info};

/// Receives dashboard changes from the session loop. All methods default to
/// no-ops so a renderer only implements what it draws.
pub trait ViewSink {
    /// Live stream status flipped.
    fn connection_changed(&mut self, _connected: bool) {}

    /// A card was created by its first reading.
    fn card_created(&mut self, _card: &CardViewModel) {}

    /// A card's display or buffer changed.
    fn card_updated(&mut self, _card: &CardViewModel) {}

    /// A card's history fetch finished, with data or without.
    fn history_applied(&mut self, _card: &CardViewModel) {}
}

/// Writes every change to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ViewSink for LogSink {
    fn connection_changed(&mut self, connected: bool) {
        info!(connected, "connection status");
    }

    fn card_created(&mut self, card: &CardViewModel) {
        info!(
            topic = card.topic(),
            location = %card.reading().location_label,
            sensor = card.descriptor().label,
            kind = card.kind().as_str(),
            value = %card.display_value(),
            "card created"
        );
    }

    fn card_updated(&mut self, card: &CardViewModel) {
        info!(topic = card.topic(), value = %card.display_value(), "card updated");
        for interval in card.recent_intervals().iter().take(1) {
            if let Some(duration) = interval.duration() {
                debug!(topic = card.topic(), %duration, "last interval");
            }
        }
    }

    fn history_applied(&mut self, card: &CardViewModel) {
        let status = match card.history_status() {
            HistoryStatus::Pending => "pending",
            HistoryStatus::Loaded => "loaded",
            HistoryStatus::Unavailable => "unavailable",
        };
        if let Some(series) = card.series() {
            info!(
                topic = card.topic(),
                status,
                points = series.len(),
                capacity = series.capacity(),
                "history applied"
            );
        } else if let Some(log) = card.events() {
            info!(
                topic = card.topic(),
                status,
                events = log.events().len(),
                shown = log.recent_intervals().len(),
                limit = log.limit(),
                "history applied"
            );
        }
    }
}
