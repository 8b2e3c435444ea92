//! Bounded sliding-window time series.

#![allow(missing_docs)]

use std::collections::VecDeque;

use time::OffsetDateTime;

/// Points kept per continuous sensor.
pub const DEFAULT_SERIES_CAPACITY: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPoint {
    pub time: OffsetDateTime,
    pub value: f64,
}

impl TelemetryPoint {
    #[must_use]
    pub fn new(time: OffsetDateTime, value: f64) -> Self {
        Self { time, value }
    }
}

/// FIFO window of samples: once `capacity` is exceeded the oldest point is
/// evicted first.
#[derive(Debug, Clone)]
pub struct TimeSeriesBuffer {
    points: VecDeque<TelemetryPoint>,
    capacity: usize,
    seeded: bool,
}

impl Default for TimeSeriesBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl TimeSeriesBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
            seeded: false,
        }
    }

    /// Appends a live point. `NaN` values are rejected.
    pub fn push(&mut self, point: TelemetryPoint) -> bool {
        if point.value.is_nan() {
            return false;
        }
        self.points.push_back(point);
        self.evict();
        true
    }

    /// Merges a one-time history backfill in front of the live points.
    ///
    /// Only history strictly older than the oldest live point is kept, so
    /// live samples are never overwritten. Returns `false` if already seeded.
    pub fn seed_history(&mut self, history: impl IntoIterator<Item = TelemetryPoint>) -> bool {
        if self.seeded {
            return false;
        }
        self.seeded = true;
        let cutoff = self.points.front().map(|point| point.time);
        let mut merged: VecDeque<TelemetryPoint> = history
            .into_iter()
            .filter(|point| !point.value.is_nan())
            .filter(|point| cutoff.map_or(true, |cutoff| point.time < cutoff))
            .collect();
        merged.append(&mut self.points);
        self.points = merged;
        self.evict();
        true
    }

    fn evict(&mut self) {
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TelemetryPoint> + '_ {
        self.points.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<TelemetryPoint> {
        self.points.iter().copied().collect()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryPoint> {
        self.points.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }
}
