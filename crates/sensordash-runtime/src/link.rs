//! Websocket link to the telemetry bridge.

#![allow(missing_docs)]

use std::io::ErrorKind;
use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use smol_str::SmolStr;
use tracing::{debug, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::connection::{Connector, LinkEvent, LinkEventKind, LinkHandle};
use crate::error::DashError;

/// Read timeout between outbound drains.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Opens one tungstenite client thread per connection attempt.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: SmolStr,
    poll_interval: Duration,
}

impl WsConnector {
    #[must_use]
    pub fn new(url: impl Into<SmolStr>) -> Self {
        Self {
            url: url.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    fn open(&mut self, generation: u64, events: Sender<LinkEvent>) -> LinkHandle {
        let (outbound_tx, outbound_rx) = crossbeam_channel::unbounded();
        let url = self.url.clone();
        let poll_interval = self.poll_interval;
        let link_events = events.clone();
        let spawned = thread::Builder::new()
            .name(format!("sensordash-link-{generation}"))
            .spawn(move || {
                let reason = match run_link(&url, poll_interval, generation, &link_events, &outbound_rx)
                {
                    Ok(()) => SmolStr::new_static("closed"),
                    Err(err) => SmolStr::new(err.to_string()),
                };
                let _ = link_events.send(LinkEvent::new(generation, LinkEventKind::Closed(reason)));
            });
        match spawned {
            Ok(worker) => LinkHandle::new(generation, outbound_tx, Some(worker)),
            Err(err) => {
                let err = DashError::ThreadSpawn(err.to_string().into());
                warn!(%err, "link thread unavailable");
                let _ = events.send(LinkEvent::new(
                    generation,
                    LinkEventKind::Closed(err.to_string().into()),
                ));
                LinkHandle::new(generation, outbound_tx, None)
            }
        }
    }
}

fn run_link(
    url: &str,
    poll_interval: Duration,
    generation: u64,
    events: &Sender<LinkEvent>,
    outbound: &Receiver<String>,
) -> Result<(), DashError> {
    let (mut socket, _response) =
        tungstenite::connect(url).map_err(|err| DashError::Connect(err.to_string().into()))?;
    configure_read_timeout(&mut socket, poll_interval)?;
    if events
        .send(LinkEvent::new(generation, LinkEventKind::Opened))
        .is_err()
    {
        return Ok(());
    }
    loop {
        loop {
            match outbound.try_recv() {
                Ok(text) => socket
                    .send(Message::text(text))
                    .map_err(|err| DashError::Transport(err.to_string().into()))?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!(generation, "link retired, closing socket");
                    let _ = socket.close(None);
                    let _ = socket.flush();
                    return Ok(());
                }
            }
        }
        match socket.read() {
            Ok(Message::Text(text)) => {
                let event = LinkEvent::new(generation, LinkEventKind::Text(text.as_str().to_owned()));
                if events.send(event).is_err() {
                    return Ok(());
                }
            }
            Ok(Message::Close(_)) => return Ok(()),
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {}
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Ok(());
            }
            Err(err) => return Err(DashError::Transport(err.to_string().into())),
        }
    }
}

fn configure_read_timeout(
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    poll_interval: Duration,
) -> Result<(), DashError> {
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        stream
            .set_read_timeout(Some(poll_interval))
            .map_err(|err| DashError::Transport(err.to_string().into()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn unreachable_endpoint_reports_close() {
        let (events, rx) = crossbeam_channel::unbounded();
        let mut connector = WsConnector::new("ws://127.0.0.1:1/ws");
        let handle = connector.open(7, events);
        let event = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("close event");
        assert_eq!(event.generation, 7);
        assert!(matches!(event.kind, LinkEventKind::Closed(_)));
        let started = Instant::now();
        handle.close();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
