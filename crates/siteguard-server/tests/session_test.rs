//! Tracking session end-to-end tests.
//!
//! Runs the real loops against in-process bus, radio and sound with paused
//! time, from sensor fixes through to wearable commands.

use chrono::{Duration as ChronoDuration, Utc};
use siteguard_core::{EntityKind, PositionFix, Provider, TrackedEntity};
use siteguard_server::alerts::{
    AlertBus, AlertSound, ChannelRadioLink, InMemoryAlertBus, RadioCommand, RadioLink,
};
use siteguard_server::config::Config;
use siteguard_server::session::{SessionDeps, TrackingSession};
use siteguard_server::state::{AppState, SensorEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct CountingSound(AtomicUsize);

impl AlertSound for CountingSound {
    fn play(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn fix(lat: f64, lon: f64, offset_s: i64) -> PositionFix {
    PositionFix::new(
        lat,
        lon,
        Provider::Gps,
        5.0,
        Utc::now() + ChronoDuration::seconds(offset_s),
    )
}

fn drain(rx: &mut mpsc::Receiver<u8>) -> Vec<RadioCommand> {
    let mut commands = Vec::new();
    while let Ok(byte) = rx.try_recv() {
        commands.extend(RadioCommand::from_byte(byte));
    }
    commands
}

struct Harness {
    state: Arc<AppState>,
    bus: Arc<InMemoryAlertBus>,
    radio: Arc<ChannelRadioLink>,
    radio_rx: mpsc::Receiver<u8>,
    sound: Arc<CountingSound>,
    session: TrackingSession,
}

fn start(config: Config) -> Harness {
    let bus = Arc::new(InMemoryAlertBus::new());
    let (state, sensor_rx) = AppState::new(config, bus.clone());
    let state = Arc::new(state);
    state.register_entity(TrackedEntity::new("W1", EntityKind::Worker, "quarry"));
    state.register_entity(TrackedEntity::new("M1", EntityKind::Machine, "quarry"));

    let (radio, radio_rx) = ChannelRadioLink::new(16);
    let radio = Arc::new(radio);
    let sound = Arc::new(CountingSound::default());
    let session = TrackingSession::start(
        state.clone(),
        sensor_rx,
        SessionDeps {
            radio: radio.clone(),
            sound: sound.clone(),
        },
    );

    Harness {
        state,
        bus,
        radio,
        radio_rx,
        sound,
        session,
    }
}

fn device_config() -> Config {
    Config {
        device_id: Some("W1".to_string()),
        ..Config::default()
    }
}

#[tokio::test(start_paused = true)]
async fn approach_raises_and_retreat_clears_local_alert() {
    let mut h = start(device_config());

    h.state.queue_fix(SensorEvent::new("W1", fix(0.0, 0.0, 0))).unwrap();
    h.state.queue_fix(SensorEvent::new("M1", fix(0.00005, 0.0, 0))).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.bus.current("W1"), Some(true));
    assert_eq!(h.bus.current("M1"), Some(true));
    assert_eq!(drain(&mut h.radio_rx), vec![RadioCommand::Engage]);
    assert!(h.sound.0.load(Ordering::SeqCst) >= 1);

    // Machine drives away with a newer, equally accurate fix
    h.state.queue_fix(SensorEvent::new("M1", fix(0.01, 0.0, 1))).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.bus.current("W1"), Some(false));
    assert_eq!(h.bus.current("M1"), Some(false));
    assert_eq!(drain(&mut h.radio_rx), vec![RadioCommand::Clear]);

    let plays = h.sound.0.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.sound.0.load(Ordering::SeqCst), plays);

    h.session.stop().await;
    assert!(!h.radio.is_connected());
    assert!(drain(&mut h.radio_rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stopping_an_alerting_session_clears_the_wearable() {
    let mut h = start(device_config());

    h.state.queue_fix(SensorEvent::new("W1", fix(1.0, 1.0, 0))).unwrap();
    h.state.queue_fix(SensorEvent::new("M1", fix(1.0, 1.0, 0))).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(drain(&mut h.radio_rx), vec![RadioCommand::Engage]);

    h.session.stop().await;

    assert_eq!(drain(&mut h.radio_rx), vec![RadioCommand::Clear]);
    assert!(!h.radio.is_connected());

    // No loop keeps publishing after teardown
    let mut feed = h.bus.feed();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(feed.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn stale_out_of_order_report_does_not_move_an_entity() {
    let mut h = start(Config::default());

    h.state.queue_fix(SensorEvent::new("W1", fix(0.0, 0.0, 0))).unwrap();
    h.state.queue_fix(SensorEvent::new("M1", fix(5.0, 5.0, 0))).unwrap();
    // Arrives late, taken five minutes before the held fix
    h.state.queue_fix(SensorEvent::new("M1", fix(0.0, 0.0, -300))).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert_eq!(h.bus.current("W1"), Some(false));
    assert_eq!(h.state.current_fix("M1").map(|f| f.lat), Some(5.0));
    assert!(drain(&mut h.radio_rx).is_empty());

    h.session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn watch_mode_follows_bus_without_running_detection() {
    let mut h = start(Config {
        device_id: Some("W1".to_string()),
        watch_only: true,
        ..Config::default()
    });

    // Co-located, but nothing detects collisions in watch mode
    h.state.queue_fix(SensorEvent::new("W1", fix(0.0, 0.0, 0))).unwrap();
    h.state.queue_fix(SensorEvent::new("M1", fix(0.0, 0.0, 0))).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(h.bus.current("M1"), None);
    assert!(drain(&mut h.radio_rx).is_empty());

    // Another monitor raises this device's flag
    h.bus
        .publish(&siteguard_core::AlertState::new("W1", true))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(drain(&mut h.radio_rx), vec![RadioCommand::Engage]);

    h.bus
        .publish(&siteguard_core::AlertState::new("W1", false))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(drain(&mut h.radio_rx), vec![RadioCommand::Clear]);

    h.session.stop().await;
    assert!(!h.radio.is_connected());
}
