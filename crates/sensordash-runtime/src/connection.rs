//! Live stream connection lifecycle.
//!
//! The manager is a plain state machine: link threads report
//! [`LinkEvent`]s tagged with the generation that produced them, and the
//! owning loop feeds them back through [`ConnectionManager::handle`]. Events
//! from a retired generation are discarded, so a late close from an old link
//! can never tear down its replacement.

#![allow(missing_docs)]

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use sensordash_core::Envelope;
use smol_str::SmolStr;
use tracing::{debug, info, trace, warn};

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// Report from a link thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEvent {
    pub generation: u64,
    pub kind: LinkEventKind,
}

impl LinkEvent {
    #[must_use]
    pub fn new(generation: u64, kind: LinkEventKind) -> Self {
        Self { generation, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEventKind {
    Opened,
    Text(String),
    /// Link ended, by error or normal close.
    Closed(SmolStr),
}

/// Typed output of the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Connected,
    Disconnected,
    Envelope(Envelope),
}

/// Owning side of one open link.
///
/// Dropping the handle drops the outbound sender, which tells the link
/// thread to close. [`LinkHandle::close`] additionally waits for it.
#[derive(Debug)]
pub struct LinkHandle {
    generation: u64,
    outbound: Option<Sender<String>>,
    worker: Option<JoinHandle<()>>,
}

impl LinkHandle {
    #[must_use]
    pub fn new(generation: u64, outbound: Sender<String>, worker: Option<JoinHandle<()>>) -> Self {
        Self {
            generation,
            outbound: Some(outbound),
            worker,
        }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queues a text frame for the link thread.
    pub fn send(&self, text: String) -> bool {
        self.outbound
            .as_ref()
            .is_some_and(|outbound| outbound.send(text).is_ok())
    }

    /// Closes the link after queued frames are flushed and joins its thread.
    pub fn close(mut self) {
        self.outbound.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!(generation = self.generation, "link thread panicked");
            }
        }
    }
}

/// Transport seam: opens one link and reports its events on `events`.
pub trait Connector {
    fn open(&mut self, generation: u64, events: Sender<LinkEvent>) -> LinkHandle;
}

/// Pending reconnect owned by the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRetry {
    pub generation: u64,
    pub due: Instant,
}

type StatusHook = Box<dyn FnMut(bool)>;

pub struct ConnectionManager<C: Connector> {
    connector: C,
    events: Sender<LinkEvent>,
    reconnect_delay: Duration,
    state: ConnectionState,
    generation: u64,
    link: Option<LinkHandle>,
    retry: Option<ScheduledRetry>,
    status_hooks: Vec<StatusHook>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates the manager and immediately attempts the first connection.
    pub fn start(connector: C, events: Sender<LinkEvent>, reconnect_delay: Duration) -> Self {
        let mut manager = Self {
            connector,
            events,
            reconnect_delay,
            state: ConnectionState::Disconnected,
            generation: 0,
            link: None,
            retry: None,
            status_hooks: Vec::new(),
        };
        manager.connect();
        manager
    }

    /// Registers a callback invoked with `true` on open and `false` on close.
    pub fn subscribe(&mut self, hook: impl FnMut(bool) + 'static) {
        self.status_hooks.push(Box::new(hook));
    }

    fn connect(&mut self) {
        self.retry = None;
        self.link.take();
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        debug!(generation = self.generation, "opening live stream");
        self.link = Some(self.connector.open(self.generation, self.events.clone()));
    }

    fn notify(&mut self, connected: bool) {
        for hook in &mut self.status_hooks {
            hook(connected);
        }
    }

    /// Applies one link event.
    pub fn handle(&mut self, event: LinkEvent, now: Instant) -> Option<ConnectionEvent> {
        if event.generation != self.generation {
            trace!(
                generation = event.generation,
                current = self.generation,
                "discarding event from retired link"
            );
            return None;
        }
        match event.kind {
            LinkEventKind::Opened => {
                if self.state != ConnectionState::Connecting {
                    return None;
                }
                self.state = ConnectionState::Connected;
                info!(generation = self.generation, "live stream connected");
                self.notify(true);
                Some(ConnectionEvent::Connected)
            }
            LinkEventKind::Text(text) => match Envelope::decode(&text) {
                Ok(envelope) => Some(ConnectionEvent::Envelope(envelope)),
                Err(err) => {
                    debug!(%err, "dropping malformed frame");
                    None
                }
            },
            LinkEventKind::Closed(reason) => {
                if self.state == ConnectionState::Disconnected {
                    return None;
                }
                self.state = ConnectionState::Disconnected;
                self.link.take();
                let due = now + self.reconnect_delay;
                self.retry = Some(ScheduledRetry {
                    generation: self.generation,
                    due,
                });
                warn!(
                    generation = self.generation,
                    reason = %reason,
                    retry_in_ms = u64::try_from(self.reconnect_delay.as_millis()).unwrap_or(u64::MAX),
                    "live stream closed"
                );
                self.notify(false);
                Some(ConnectionEvent::Disconnected)
            }
        }
    }

    /// Opens a new connection if the scheduled retry is due.
    pub fn poll_retry(&mut self, now: Instant) -> bool {
        let Some(retry) = self.retry else {
            return false;
        };
        if retry.generation != self.generation || retry.due > now {
            return false;
        }
        info!(generation = self.generation + 1, "reconnecting live stream");
        self.connect();
        true
    }

    /// Time left before the scheduled retry fires.
    #[must_use]
    pub fn time_until_retry(&self, now: Instant) -> Option<Duration> {
        self.retry
            .map(|retry| retry.due.saturating_duration_since(now))
    }

    /// Sends one envelope. Dropped unless connected.
    pub fn send(&self, topic: &str, payload: &str) -> bool {
        if self.state != ConnectionState::Connected {
            debug!(topic, state = self.state.as_str(), "dropping outbound envelope");
            return false;
        }
        self.link
            .as_ref()
            .is_some_and(|link| link.send(Envelope::new(topic, payload).encode()))
    }

    /// Closes the current link and cancels any retry. Later events from it
    /// are ignored.
    pub fn close(&mut self) {
        self.retry = None;
        self.generation += 1;
        let was_connected = self.state == ConnectionState::Connected;
        self.state = ConnectionState::Disconnected;
        if let Some(link) = self.link.take() {
            link.close();
        }
        if was_connected {
            self.notify(false);
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub fn scheduled_retry(&self) -> Option<ScheduledRetry> {
        self.retry
    }

    #[must_use]
    pub fn connector(&self) -> &C {
        &self.connector
    }
}
