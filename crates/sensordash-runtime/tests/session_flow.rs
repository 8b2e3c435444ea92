use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use sensordash_core::doors::{DoorEvent, DoorState};
use sensordash_core::series::TelemetryPoint;
use sensordash_core::{CardViewModel, Envelope, HistoryStatus};
use sensordash_runtime::connection::{LinkEvent, LinkEventKind, LinkHandle};
use sensordash_runtime::{
    ConnectionState, Connector, DashConfig, DashError, HistorySource, Session, ViewSink,
};
use time::macros::datetime;

struct OpenedLink {
    generation: u64,
    events: Sender<LinkEvent>,
    outbound: Receiver<String>,
}

#[derive(Clone, Default)]
struct ScriptedConnector {
    links: Arc<Mutex<Vec<OpenedLink>>>,
}

impl ScriptedConnector {
    fn emit(&self, generation: u64, kind: LinkEventKind) {
        let links = self.links.lock().expect("links");
        let link = links
            .iter()
            .find(|link| link.generation == generation)
            .expect("link generation");
        link.events
            .send(LinkEvent::new(generation, kind))
            .expect("emit link event");
    }

    fn frame(&self, generation: u64, topic: &str, payload: &str) {
        self.emit(
            generation,
            LinkEventKind::Text(Envelope::new(topic, payload).encode()),
        );
    }

    fn generations(&self) -> Vec<u64> {
        self.links
            .lock()
            .expect("links")
            .iter()
            .map(|link| link.generation)
            .collect()
    }

    fn sent(&self, generation: u64) -> Vec<String> {
        let links = self.links.lock().expect("links");
        links
            .iter()
            .find(|link| link.generation == generation)
            .map(|link| link.outbound.try_iter().collect())
            .unwrap_or_default()
    }
}

impl Connector for ScriptedConnector {
    fn open(&mut self, generation: u64, events: Sender<LinkEvent>) -> LinkHandle {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.links.lock().expect("links").push(OpenedLink {
            generation,
            events,
            outbound: rx,
        });
        LinkHandle::new(generation, tx, None)
    }
}

struct MemoryHistory {
    series: Vec<TelemetryPoint>,
    events: Vec<DoorEvent>,
    available: bool,
}

impl HistorySource for MemoryHistory {
    fn series(&self, _location: &str, _measurement: &str) -> Result<Vec<TelemetryPoint>, DashError> {
        if self.available {
            Ok(self.series.clone())
        } else {
            Err(DashError::History("offline".into()))
        }
    }

    fn events(&self, _location: &str, _measurement: &str) -> Result<Vec<DoorEvent>, DashError> {
        if self.available {
            Ok(self.events.clone())
        } else {
            Err(DashError::History("offline".into()))
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    log: Vec<String>,
}

impl ViewSink for RecordingSink {
    fn connection_changed(&mut self, connected: bool) {
        self.log.push(format!("connected={connected}"));
    }

    fn card_created(&mut self, card: &CardViewModel) {
        self.log.push(format!("created {} {}", card.topic(), card.display_value()));
    }

    fn card_updated(&mut self, card: &CardViewModel) {
        self.log.push(format!("updated {} {}", card.topic(), card.display_value()));
    }

    fn history_applied(&mut self, card: &CardViewModel) {
        self.log.push(format!("history {}", card.topic()));
    }
}

fn history(available: bool) -> Arc<dyn HistorySource> {
    Arc::new(MemoryHistory {
        series: vec![
            TelemetryPoint::new(datetime!(2020-01-01 10:00 UTC), 19.0),
            TelemetryPoint::new(datetime!(2020-01-01 10:01 UTC), 19.5),
        ],
        events: vec![
            DoorEvent::new(datetime!(2020-01-01 09:00 UTC), DoorState::Open),
            DoorEvent::new(datetime!(2020-01-01 09:03 UTC), DoorState::Closed),
        ],
        available,
    })
}

fn config() -> DashConfig {
    let mut config = DashConfig::default();
    config.server.reconnect_delay = Duration::from_millis(20);
    config
}

fn drain(session: &mut Session<ScriptedConnector, RecordingSink>) {
    while session.step(Duration::from_millis(50)) {}
}

fn wait_for_history(session: &mut Session<ScriptedConnector, RecordingSink>, count: usize) {
    for _ in 0..100 {
        let seen = session
            .sink()
            .log
            .iter()
            .filter(|line| line.starts_with("history"))
            .count();
        if seen >= count {
            return;
        }
        session.step(Duration::from_millis(50));
    }
    panic!("history never applied: {:?}", session.sink().log);
}

#[test]
fn first_reading_creates_card_and_backfills() {
    let connector = ScriptedConnector::default();
    let mut session = Session::new(&config(), connector.clone(), history(true), RecordingSink::default());
    assert_eq!(connector.generations(), vec![1]);

    connector.emit(1, LinkEventKind::Opened);
    connector.frame(1, "home/salon/temp", "21.5");
    drain(&mut session);
    wait_for_history(&mut session, 1);

    connector.frame(1, "home/salon/temp", r#"{"value": 22.0}"#);
    drain(&mut session);

    assert_eq!(
        session.sink().log,
        vec![
            "connected=true",
            "created home/salon/temp 21.5°C",
            "history home/salon/temp",
            "updated home/salon/temp 22.0°C",
        ]
    );
    let card = session.dashboard().card("home/salon/temp").expect("card");
    assert_eq!(card.history_status(), HistoryStatus::Loaded);
    let values: Vec<f64> = card
        .series()
        .expect("series")
        .iter()
        .map(|point| point.value)
        .collect();
    assert_eq!(values, vec![19.0, 19.5, 22.0]);
}

#[test]
fn failed_backfill_marks_card_unavailable() {
    let connector = ScriptedConnector::default();
    let mut session = Session::new(&config(), connector.clone(), history(false), RecordingSink::default());
    connector.emit(1, LinkEventKind::Opened);
    connector.frame(1, "home/entrada/door", "closed");
    drain(&mut session);
    wait_for_history(&mut session, 1);

    let card = session.dashboard().card("home/entrada/door").expect("card");
    assert_eq!(card.history_status(), HistoryStatus::Unavailable);
    assert!(card.events().expect("event log").events().is_empty());
}

#[test]
fn ignored_and_unknown_topics_stay_off_the_dashboard() {
    let connector = ScriptedConnector::default();
    let mut session = Session::new(&config(), connector.clone(), history(true), RecordingSink::default());
    connector.emit(1, LinkEventKind::Opened);
    connector.frame(1, "home/salon/test", "1");
    connector.frame(1, "home/garage/humidity", "40");
    connector.emit(1, LinkEventKind::Text("not json".into()));
    drain(&mut session);

    assert!(session.dashboard().is_empty());
    assert_eq!(session.sink().log, vec!["connected=true"]);
}

#[test]
fn close_reconnects_and_drops_stale_frames() {
    let connector = ScriptedConnector::default();
    let mut session = Session::new(&config(), connector.clone(), history(true), RecordingSink::default());
    connector.emit(1, LinkEventKind::Opened);
    drain(&mut session);
    assert!(session.send("home/entrada/door", "open"));
    assert_eq!(connector.sent(1).len(), 1);

    connector.emit(1, LinkEventKind::Closed("reset by peer".into()));
    drain(&mut session);
    assert!(!session.send("home/entrada/door", "closed"));

    for _ in 0..100 {
        if connector.generations().len() == 2 {
            break;
        }
        session.step(Duration::from_millis(10));
    }
    assert_eq!(connector.generations(), vec![1, 2]);
    assert_eq!(session.connection_state(), ConnectionState::Connecting);

    connector.frame(1, "home/salon/temp", "30");
    connector.emit(2, LinkEventKind::Opened);
    drain(&mut session);
    assert!(session.dashboard().is_empty());
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(
        session.sink().log,
        vec!["connected=true", "connected=false", "connected=true"]
    );

    assert!(session.send("home/entrada/door", "closed"));
    let sent = connector.sent(2);
    assert_eq!(sent.len(), 1);
    assert_eq!(
        Envelope::decode(&sent[0]).expect("envelope"),
        Envelope::new("home/entrada/door", "closed")
    );
}
