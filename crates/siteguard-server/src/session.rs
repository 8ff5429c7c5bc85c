//! Tracking session lifecycle.
//!
//! A session owns every background loop. Stopping it flips the shutdown
//! signal, waits for each loop to finish its current tick, and leaves the
//! local alert released.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::alerts::{AlertDispatcher, AlertSound, LocalAlert, RadioLink};
use crate::loops::{alert_watch_loop, collision_loop, fix_intake_loop, location_loop};
use crate::state::{AppState, SensorEvent};

/// Device outputs handed to a session.
#[derive(Clone)]
pub struct SessionDeps {
    pub radio: Arc<dyn RadioLink>,
    pub sound: Arc<dyn AlertSound>,
}

pub struct TrackingSession {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl TrackingSession {
    /// Spawn the loops this configuration needs.
    pub fn start(
        state: Arc<AppState>,
        sensor_rx: mpsc::Receiver<SensorEvent>,
        deps: SessionDeps,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let config = state.config().clone();
        let mut tasks = Vec::new();

        let local_alert = config.device_id.as_ref().map(|device_id| {
            LocalAlert::new(
                device_id.clone(),
                deps.radio.clone(),
                deps.sound.clone(),
                config.rules.alert_sound_interval(),
            )
        });

        tasks.push((
            "fix-intake",
            tokio::spawn(fix_intake_loop::run_fix_intake_loop(
                state.clone(),
                sensor_rx,
                shutdown_rx.clone(),
            )),
        ));

        if let Some(device_id) = config.device_id.clone() {
            tasks.push((
                "location-refresh",
                tokio::spawn(location_loop::run_location_loop(
                    state.clone(),
                    device_id,
                    shutdown_rx.clone(),
                )),
            ));
        }

        if config.watch_only {
            match local_alert {
                Some(local) => tasks.push((
                    "alert-watch",
                    tokio::spawn(alert_watch_loop::run_alert_watch_loop(
                        state.clone(),
                        local,
                        shutdown_rx.clone(),
                    )),
                )),
                None => tracing::warn!("Watch mode without a device id; nothing to watch"),
            }
        } else {
            let dispatcher = AlertDispatcher::new(state.bus(), local_alert);
            tasks.push((
                "collision-check",
                tokio::spawn(collision_loop::run_collision_loop(
                    state.clone(),
                    dispatcher,
                    shutdown_rx.clone(),
                )),
            ));
        }

        tracing::info!(
            "Tracking session started ({})",
            tasks.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
        );

        Self { shutdown, tasks }
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|(_, handle)| !handle.is_finished())
    }

    /// Signal shutdown and wait for every loop to exit.
    pub async fn stop(self) {
        self.shutdown.send_replace(true);

        for (name, handle) in self.tasks {
            if let Err(err) = handle.await {
                tracing::error!("{} loop ended abnormally: {}", name, err);
            }
        }
        tracing::info!("Tracking session stopped");
    }
}
