//! Continuous collision detection loop.
//!
//! Each tick copies the fleet, runs the collision engine and hands the
//! result to the alert dispatcher. External write failures are logged by the
//! dispatcher and never end the loop.

use std::sync::Arc;

use tokio::sync::watch;

use crate::alerts::{AlertDispatcher, DispatchReport};
use crate::loops::{is_shutdown, pause};
use crate::state::AppState;

/// Start the collision detection loop.
pub async fn run_collision_loop(
    state: Arc<AppState>,
    mut dispatcher: AlertDispatcher,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = state.config().rules.collision_check();
    let worksite = state.config().worksite.clone();

    loop {
        if is_shutdown(&shutdown) {
            break;
        }

        check_once(&state, &mut dispatcher, worksite.as_deref());

        if !pause(&mut shutdown, period).await {
            break;
        }
    }

    dispatcher.shutdown();
    tracing::info!("Collision loop shutting down");
}

/// One detection pass over a consistent snapshot of the fleet.
pub fn check_once(
    state: &AppState,
    dispatcher: &mut AlertDispatcher,
    worksite: Option<&str>,
) -> DispatchReport {
    let snapshot = state.snapshot_for(worksite);
    let engine = state.collision_engine();

    let pairs = engine.detect_pairs(&snapshot);
    for pair in &pairs {
        tracing::warn!(
            "Proximity alert: worker {} <-> machine {} at {:.6} deg",
            pair.worker_id,
            pair.machine_id,
            pair.distance_deg
        );
    }

    let colliding = engine.detect(&snapshot);
    let report = dispatcher.apply(&colliding, &snapshot.entity_ids());

    tracing::debug!(
        "Collision check: {} entities, {} pair(s), {} published, {} failed",
        snapshot.len(),
        pairs.len(),
        report.published,
        report.publish_failures
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertBus, InMemoryAlertBus};
    use crate::config::Config;
    use chrono::Utc;
    use siteguard_core::{EntityKind, PositionFix, Provider, TrackedEntity};
    use std::time::Duration;

    fn entity(id: &str, kind: EntityKind, site: &str, lat: f64, lon: f64) -> TrackedEntity {
        TrackedEntity::new(id, kind, site).with_fix(PositionFix::new(
            lat,
            lon,
            Provider::Remote,
            5.0,
            Utc::now(),
        ))
    }

    fn setup() -> (Arc<AppState>, Arc<InMemoryAlertBus>) {
        let bus = Arc::new(InMemoryAlertBus::new());
        let (state, _rx) = AppState::new(Config::default(), bus.clone());
        (Arc::new(state), bus)
    }

    #[test]
    fn check_publishes_flags_for_every_entity() {
        let (state, bus) = setup();
        state.register_entity(entity("W1", EntityKind::Worker, "quarry", 0.0, 0.0));
        state.register_entity(entity("M1", EntityKind::Machine, "quarry", 0.0001, 0.0));
        state.register_entity(entity("W2", EntityKind::Worker, "quarry", 1.0, 1.0));
        state.register_entity(TrackedEntity::new("M2", EntityKind::Machine, "quarry"));

        let mut dispatcher = AlertDispatcher::new(bus.clone(), None);
        let report = check_once(&state, &mut dispatcher, None);

        assert_eq!(report.published, 4);
        assert_eq!(report.active, 2);
        assert_eq!(bus.current("W1"), Some(true));
        assert_eq!(bus.current("M1"), Some(true));
        assert_eq!(bus.current("W2"), Some(false));
        assert_eq!(bus.current("M2"), Some(false));
    }

    #[test]
    fn check_is_limited_to_configured_worksite() {
        let (state, bus) = setup();
        state.register_entity(entity("W1", EntityKind::Worker, "quarry", 0.0, 0.0));
        state.register_entity(entity("M1", EntityKind::Machine, "pit", 0.0, 0.0));

        let mut dispatcher = AlertDispatcher::new(bus.clone(), None);
        let report = check_once(&state, &mut dispatcher, Some("quarry"));

        assert_eq!(report.published, 1);
        assert_eq!(bus.current("W1"), Some(false));
        assert_eq!(bus.current("M1"), None);
    }

    #[test]
    fn threshold_change_applies_on_next_check() {
        let (state, bus) = setup();
        state.register_entity(entity("W1", EntityKind::Worker, "quarry", 0.0, 0.0));
        state.register_entity(entity("M1", EntityKind::Machine, "quarry", 0.0003, 0.0));

        let mut dispatcher = AlertDispatcher::new(bus.clone(), None);
        check_once(&state, &mut dispatcher, None);
        assert_eq!(bus.current("W1"), Some(false));

        state.set_threshold(0.0005).unwrap();
        check_once(&state, &mut dispatcher, None);
        assert_eq!(bus.current("W1"), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_runs_each_period_until_shutdown() {
        let (state, bus) = setup();
        state.register_entity(entity("W1", EntityKind::Worker, "quarry", 0.0, 0.0));
        let mut feed = bus.feed();

        let (tx, rx) = watch::channel(false);
        let dispatcher = AlertDispatcher::new(bus.clone(), None);
        let handle = tokio::spawn(run_collision_loop(state, dispatcher, rx));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        tx.send_replace(true);
        handle.await.unwrap();

        let mut writes = 0;
        while feed.try_recv().is_ok() {
            writes += 1;
        }
        assert_eq!(writes, 3);
    }
}
