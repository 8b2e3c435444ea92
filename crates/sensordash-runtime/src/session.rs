//! Session event loop.
//!
//! One thread owns the dashboard and the connection manager. Link threads and
//! history fetches only post messages; every reaction runs to completion on
//! the session thread.

#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use sensordash_core::{Dashboard, Envelope, HistoryBatch, HistoryRequest, IngestOutcome};
use smol_str::SmolStr;
use time::OffsetDateTime;
use tracing::{debug, trace, warn};

use crate::config::DashConfig;
use crate::connection::{
    ConnectionEvent, ConnectionManager, ConnectionState, Connector, LinkEvent,
};
use crate::history::{fetch_batch, HistorySource};
use crate::view::ViewSink;

/// Granularity of the stop-flag check in [`Session::run_until`].
const STOP_POLL: Duration = Duration::from_millis(100);

#[derive(Debug)]
struct HistoryResult {
    topic: SmolStr,
    batch: HistoryBatch,
}

#[derive(Debug)]
enum SessionEvent {
    Link(LinkEvent),
    History(HistoryResult),
}

/// Dashboard, connection and history wiring around a single event loop.
pub struct Session<C: Connector, S: ViewSink> {
    dashboard: Dashboard,
    connection: ConnectionManager<C>,
    link_rx: Receiver<LinkEvent>,
    history: Arc<dyn HistorySource>,
    history_tx: Sender<HistoryResult>,
    history_rx: Receiver<HistoryResult>,
    sink: S,
}

impl<C: Connector, S: ViewSink> Session<C, S> {
    /// Builds the dashboard and opens the first connection.
    pub fn new(
        config: &DashConfig,
        connector: C,
        history: Arc<dyn HistorySource>,
        sink: S,
    ) -> Self {
        let (link_tx, link_rx) = crossbeam_channel::unbounded();
        let (history_tx, history_rx) = crossbeam_channel::unbounded();
        Self {
            dashboard: Dashboard::new(config.classifier(), config.dashboard),
            connection: ConnectionManager::start(connector, link_tx, config.server.reconnect_delay),
            link_rx,
            history,
            history_tx,
            history_rx,
            sink,
        }
    }

    /// Waits up to `timeout` for one event and processes it. Returns `false`
    /// when nothing happened.
    pub fn step(&mut self, timeout: Duration) -> bool {
        let now = Instant::now();
        if self.connection.poll_retry(now) {
            return true;
        }
        let wait = self
            .connection
            .time_until_retry(now)
            .map_or(timeout, |left| left.min(timeout));
        let event = select! {
            recv(self.link_rx) -> event => event.ok().map(SessionEvent::Link),
            recv(self.history_rx) -> result => result.ok().map(SessionEvent::History),
            default(wait) => None,
        };
        match event {
            Some(SessionEvent::Link(event)) => self.on_link(event),
            Some(SessionEvent::History(result)) => self.on_history(result),
            None => return self.connection.poll_retry(Instant::now()),
        }
        true
    }

    /// Processes events until `stop` is raised, then closes the link.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            self.step(STOP_POLL);
        }
        self.shutdown();
    }

    /// Processes events until the link is open or `timeout` elapses.
    pub fn wait_connected(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.connection.is_connected() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.step(deadline - now);
        }
        true
    }

    /// Sends one envelope on the live link. Dropped unless connected.
    pub fn send(&self, topic: &str, payload: &str) -> bool {
        self.connection.send(topic, payload)
    }

    /// Closes the live link and cancels any pending reconnect.
    pub fn shutdown(&mut self) {
        self.connection.close();
    }

    fn on_link(&mut self, event: LinkEvent) {
        match self.connection.handle(event, Instant::now()) {
            Some(ConnectionEvent::Connected) => self.sink.connection_changed(true),
            Some(ConnectionEvent::Disconnected) => self.sink.connection_changed(false),
            Some(ConnectionEvent::Envelope(envelope)) => self.on_envelope(&envelope),
            None => {}
        }
    }

    fn on_envelope(&mut self, envelope: &Envelope) {
        match self
            .dashboard
            .handle_envelope(envelope, OffsetDateTime::now_utc())
        {
            IngestOutcome::Ignored => trace!(topic = %envelope.topic, "ignored topic"),
            IngestOutcome::Unroutable => debug!(topic = %envelope.topic, "unroutable topic"),
            IngestOutcome::Created(request) => {
                if let Some(card) = self.dashboard.card(&request.topic) {
                    self.sink.card_created(card);
                }
                self.spawn_backfill(request);
            }
            IngestOutcome::Updated => {
                if let Some(card) = self.dashboard.card(&envelope.topic) {
                    self.sink.card_updated(card);
                }
            }
        }
    }

    fn spawn_backfill(&mut self, request: HistoryRequest) {
        let topic = request.topic.clone();
        let source = Arc::clone(&self.history);
        let results = self.history_tx.clone();
        let spawned = thread::Builder::new()
            .name("sensordash-history".into())
            .spawn(move || {
                let batch = fetch_batch(source.as_ref(), &request);
                let _ = results.send(HistoryResult {
                    topic: request.topic,
                    batch,
                });
            });
        if let Err(err) = spawned {
            warn!(topic = %topic, %err, "history fetch not started");
            self.on_history(HistoryResult {
                topic,
                batch: HistoryBatch::Unavailable,
            });
        }
    }

    fn on_history(&mut self, result: HistoryResult) {
        if !self.dashboard.apply_history(&result.topic, result.batch) {
            debug!(topic = %result.topic, "history batch not applied");
            return;
        }
        if let Some(card) = self.dashboard.card(&result.topic) {
            self.sink.history_applied(card);
        }
    }

    #[must_use]
    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
