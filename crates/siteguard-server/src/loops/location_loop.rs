//! Location refresh loop.
//!
//! Publishes the local device's best fix to the record store so other
//! observers see it, once per refresh period for the life of the session.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;

use crate::loops::{is_shutdown, pause};
use crate::persistence::entities as entities_db;
use crate::state::AppState;

pub async fn run_location_loop(
    state: Arc<AppState>,
    device_id: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = state.config().rules.location_refresh();
    tracing::info!("Location refresh loop started for {} every {:?}", device_id, period);

    loop {
        if is_shutdown(&shutdown) {
            break;
        }

        if let Err(err) = publish_local_fix(&state, &device_id).await {
            tracing::error!("Failed to publish location for {}: {}", device_id, err);
        }

        if !pause(&mut shutdown, period).await {
            break;
        }
    }

    tracing::info!("Location refresh loop shutting down");
}

/// Write the device's current best fix to the record store.
///
/// Returns true when a position was written.
pub async fn publish_local_fix(state: &AppState, device_id: &str) -> Result<bool> {
    let Some(fix) = state.current_fix(device_id) else {
        tracing::debug!("No fix yet for {}", device_id);
        return Ok(false);
    };
    let Some(db) = state.database() else {
        return Ok(false);
    };

    let updated = entities_db::update_entity_gps(db.pool(), device_id, &fix).await?;
    if updated {
        tracing::debug!("Published location {} for {}", fix.point(), device_id);
    } else {
        tracing::warn!("Device {} has no record in the store", device_id);
    }
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::InMemoryAlertBus;
    use crate::config::Config;
    use crate::persistence::init_database;
    use chrono::Utc;
    use siteguard_core::{EntityKind, PositionFix, Provider, TrackedEntity};
    use std::time::Duration;

    async fn state_with_store() -> Arc<AppState> {
        let db = init_database(":memory:", 1).await.unwrap();
        let worker = TrackedEntity::new("W1", EntityKind::Worker, "quarry");
        entities_db::upsert_entity(db.pool(), &worker).await.unwrap();

        let (state, _rx) = AppState::new(Config::default(), Arc::new(InMemoryAlertBus::new()));
        let state = state.with_database(db);
        state.register_entity(worker);
        Arc::new(state)
    }

    #[tokio::test]
    async fn publishes_best_fix_to_store() {
        let state = state_with_store().await;
        assert!(!publish_local_fix(&state, "W1").await.unwrap());

        state.submit_fix("W1", PositionFix::new(3.0, 4.0, Provider::Gps, 2.0, Utc::now()));
        assert!(publish_local_fix(&state, "W1").await.unwrap());

        let db = state.database().unwrap();
        let stored = entities_db::load_entities(db.pool()).await.unwrap();
        let fix = stored[0].current_fix.as_ref().unwrap();
        assert_eq!((fix.lat, fix.lon), (3.0, 4.0));
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let state = state_with_store().await;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_location_loop(state, "W1".to_string(), rx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
