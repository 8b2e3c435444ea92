//! Door state-change logs and open/close interval pairing.
//!
//! An [`EventLog`] records only transitions: appending the state the log
//! already holds is a no-op, so the stored sequence never has two adjacent
//! events with the same state. Intervals are derived from the full log on
//! demand and returned most recent first.

#![allow(missing_docs)]

use std::fmt;

use time::OffsetDateTime;

/// Number of intervals exposed for display.
pub const DEFAULT_INTERVAL_LIMIT: usize = 8;

/// Closed two-state classification of a binary sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoorState {
    Open,
    Closed,
}

impl DoorState {
    /// Normalizes a raw payload. `on`, `open` and `1` mean open; everything
    /// else is closed.
    #[must_use]
    pub fn parse(payload: &str) -> Self {
        match payload.trim().to_lowercase().as_str() {
            "on" | "open" | "1" => Self::Open,
            _ => Self::Closed,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorEvent {
    pub time: OffsetDateTime,
    pub state: DoorState,
}

impl DoorEvent {
    #[must_use]
    pub fn new(time: OffsetDateTime, state: DoorState) -> Self {
        Self { time, state }
    }
}

/// Derived open→close span.
///
/// `open` is `None` for a close with no pending open; `close` is `None` for
/// an open that was never closed (superseded by another open, or still open).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoorInterval {
    pub open: Option<DoorEvent>,
    pub close: Option<DoorEvent>,
}

impl DoorInterval {
    /// Elapsed time of a fully paired interval.
    #[must_use]
    pub fn duration(&self) -> Option<IntervalDuration> {
        match (self.open, self.close) {
            (Some(open), Some(close)) => Some(IntervalDuration::from_elapsed(close.time - open.time)),
            _ => None,
        }
    }

    /// Latest timestamp carried by the interval.
    #[must_use]
    pub fn latest(&self) -> Option<OffsetDateTime> {
        self.close.or(self.open).map(|event| event.time)
    }

    #[must_use]
    pub fn is_unclosed(&self) -> bool {
        self.close.is_none()
    }
}

/// Interval length in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalDuration {
    UnderMinute,
    Minutes(i64),
}

impl IntervalDuration {
    #[must_use]
    pub fn from_elapsed(elapsed: time::Duration) -> Self {
        match elapsed.whole_minutes() {
            minutes if minutes < 1 => Self::UnderMinute,
            minutes => Self::Minutes(minutes),
        }
    }
}

impl fmt::Display for IntervalDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnderMinute => f.write_str("<1 min"),
            Self::Minutes(minutes) => write!(f, "{minutes} min"),
        }
    }
}

/// Deduplicated state-change log of one discrete sensor.
#[derive(Debug, Clone)]
pub struct EventLog {
    events: Vec<DoorEvent>,
    last_state: Option<DoorState>,
    snapshot: Option<DoorEvent>,
    seeded: bool,
    limit: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL_LIMIT)
    }
}

impl EventLog {
    /// Creates an empty log exposing at most `limit` intervals for display.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            events: Vec::new(),
            last_state: None,
            snapshot: None,
            seeded: false,
            limit,
        }
    }

    /// Records the state of an initial snapshot without logging a transition.
    pub fn seed_state(&mut self, state: DoorState, now: OffsetDateTime) {
        self.last_state = Some(state);
        self.snapshot = Some(DoorEvent::new(now, state));
    }

    /// Records a transition at `now`. Returns `false` when `state` repeats
    /// the last recorded state.
    pub fn append(&mut self, state: DoorState, now: OffsetDateTime) -> bool {
        if self.last_state == Some(state) {
            return false;
        }
        self.events.push(DoorEvent::new(now, state));
        self.last_state = Some(state);
        true
    }

    /// Merges a one-time history backfill.
    ///
    /// History events at or after the snapshot (or the oldest live event) are
    /// dropped; the rest go in front of the live events with the dedup rule
    /// applied across the whole sequence. When the history ends in a state
    /// other than the snapshot, the snapshot is logged as a transition at its
    /// own time, so the log tail always agrees with `last_state`. Returns
    /// `false` if the log was already seeded.
    pub fn seed_history(&mut self, history: impl IntoIterator<Item = DoorEvent>) -> bool {
        if self.seeded {
            return false;
        }
        self.seeded = true;
        let cutoff = self
            .snapshot
            .or_else(|| self.events.first().copied())
            .map(|event| event.time);
        let mut merged = Vec::with_capacity(self.events.len());
        for event in history {
            if cutoff.is_some_and(|cutoff| event.time >= cutoff) {
                continue;
            }
            push_transition(&mut merged, event);
        }
        if let Some(snapshot) = self.snapshot {
            if !merged.is_empty() {
                push_transition(&mut merged, snapshot);
            }
        }
        for event in self.events.drain(..) {
            push_transition(&mut merged, event);
        }
        self.events = merged;
        if self.last_state.is_none() {
            self.last_state = self.events.last().map(|event| event.state);
        }
        true
    }

    #[must_use]
    pub fn events(&self) -> &[DoorEvent] {
        &self.events
    }

    #[must_use]
    pub fn last_state(&self) -> Option<DoorState> {
        self.last_state
    }

    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// All intervals, most recent first.
    #[must_use]
    pub fn intervals(&self) -> Vec<DoorInterval> {
        pair_intervals(&self.events)
    }

    /// The most recent intervals, truncated to the display limit.
    #[must_use]
    pub fn recent_intervals(&self) -> Vec<DoorInterval> {
        let mut intervals = self.intervals();
        intervals.truncate(self.limit);
        intervals
    }
}

fn push_transition(events: &mut Vec<DoorEvent>, event: DoorEvent) {
    if events.last().is_some_and(|last| last.state == event.state) {
        return;
    }
    events.push(event);
}

/// Pairs a chronological event sequence into intervals, most recent first.
///
/// A single pending-open slot is kept. An open arriving while the slot is
/// occupied flushes the previous open as an unclosed interval; a close takes
/// whatever is pending (possibly nothing). A trailing open is emitted last.
#[must_use]
pub fn pair_intervals(events: &[DoorEvent]) -> Vec<DoorInterval> {
    let mut intervals = Vec::new();
    let mut pending: Option<DoorEvent> = None;
    for event in events {
        match event.state {
            DoorState::Open => {
                if let Some(previous) = pending.replace(*event) {
                    intervals.push(DoorInterval {
                        open: Some(previous),
                        close: None,
                    });
                }
            }
            DoorState::Closed => intervals.push(DoorInterval {
                open: pending.take(),
                close: Some(*event),
            }),
        }
    }
    if let Some(open) = pending {
        intervals.push(DoorInterval {
            open: Some(open),
            close: None,
        });
    }
    intervals.reverse();
    intervals
}
