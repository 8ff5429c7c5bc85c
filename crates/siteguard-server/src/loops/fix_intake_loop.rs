//! Sensor fix intake.
//!
//! Drains the sensor queue and runs best-fix arbitration for each reading.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::loops::is_shutdown;
use crate::state::{AppState, SensorEvent};

pub async fn run_fix_intake_loop(
    state: Arc<AppState>,
    mut rx: mpsc::Receiver<SensorEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if is_shutdown(&shutdown) {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = rx.recv() => match event {
                Some(event) => apply_event(&state, event),
                None => {
                    tracing::info!("Sensor queue closed");
                    break;
                }
            },
        }
    }

    tracing::info!("Fix intake loop shutting down");
}

/// Offer one reading to the fusion cache.
pub fn apply_event(state: &AppState, event: SensorEvent) {
    match state.submit_fix(&event.entity_id, event.fix) {
        Some(decision) if decision.accepted() => {
            tracing::debug!("Fix for {} accepted ({:?})", event.entity_id, decision);
        }
        Some(decision) => {
            tracing::debug!("Fix for {} rejected ({:?})", event.entity_id, decision);
        }
        None => {
            tracing::warn!("Dropping fix for unregistered entity {}", event.entity_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::InMemoryAlertBus;
    use crate::config::Config;
    use chrono::Utc;
    use siteguard_core::{EntityKind, PositionFix, Provider, TrackedEntity};

    #[tokio::test]
    async fn drains_queue_into_fusion_cache() {
        let (state, rx) = AppState::new(Config::default(), Arc::new(InMemoryAlertBus::new()));
        let state = Arc::new(state);
        state.register_entity(TrackedEntity::new("W1", EntityKind::Worker, "quarry"));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_fix_intake_loop(state.clone(), rx, shutdown_rx));

        let fix = PositionFix::new(1.5, 2.5, Provider::Gps, 3.0, Utc::now());
        state.queue_fix(SensorEvent::new("W1", fix.clone())).unwrap();

        for _ in 0..100 {
            if state.current_fix("W1").is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(state.current_fix("W1"), Some(fix));

        shutdown_tx.send_replace(true);
        handle.await.unwrap();
    }

    #[test]
    fn unknown_entity_is_dropped() {
        let (state, _rx) = AppState::new(Config::default(), Arc::new(InMemoryAlertBus::new()));
        let fix = PositionFix::new(1.0, 1.0, Provider::Remote, 1.0, Utc::now());
        apply_event(&state, SensorEvent::new("ghost", fix));
        assert!(state.get_all_entities().is_empty());
    }
}
