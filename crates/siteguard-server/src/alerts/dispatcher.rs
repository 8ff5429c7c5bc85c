//! Turns collision results into alert flags and local device feedback.
//!
//! Every cycle republishes the flag of every tracked entity, so the bus is
//! resynchronised from scratch and tolerates dropped writes. Only the device
//! this process runs on reacts to transitions, by driving the radio link and
//! the alert sound.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use siteguard_core::AlertState;

use super::bus::AlertBus;
use super::radio::{RadioCommand, RadioLink};
use super::sound::{AlertSound, SoundLoop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertTransition {
    Raised,
    Cleared,
}

/// Outcome of one dispatch cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub published: usize,
    pub publish_failures: usize,
    pub active: usize,
    pub transition: Option<AlertTransition>,
}

/// Alert state of the local device and the outputs it drives.
pub struct LocalAlert {
    device_id: String,
    radio: Arc<dyn RadioLink>,
    sound: Arc<dyn AlertSound>,
    sound_interval: Duration,
    active: bool,
    sound_loop: Option<SoundLoop>,
    /// Command the radio still owes the wearable after a failed write
    radio_pending: Option<RadioCommand>,
}

impl LocalAlert {
    pub fn new(
        device_id: impl Into<String>,
        radio: Arc<dyn RadioLink>,
        sound: Arc<dyn AlertSound>,
        sound_interval: Duration,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            radio,
            sound,
            sound_interval,
            active: false,
            sound_loop: None,
            radio_pending: None,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sound_running(&self) -> bool {
        self.sound_loop
            .as_ref()
            .map(SoundLoop::is_running)
            .unwrap_or(false)
    }

    /// Apply the latest flag. Outputs change only on a transition; a radio
    /// command that failed earlier is retried on every call until delivered.
    pub fn update(&mut self, active: bool) -> Option<AlertTransition> {
        let transition = match (self.active, active) {
            (false, true) => Some(AlertTransition::Raised),
            (true, false) => Some(AlertTransition::Cleared),
            _ => None,
        };

        match transition {
            Some(AlertTransition::Raised) => {
                tracing::info!("Alarm status for {}: on", self.device_id);
                self.sound_loop = Some(SoundLoop::start(self.sound.clone(), self.sound_interval));
            }
            Some(AlertTransition::Cleared) => {
                tracing::info!("Alarm status for {}: off", self.device_id);
                if let Some(sound_loop) = self.sound_loop.take() {
                    sound_loop.stop();
                }
            }
            None => {}
        }
        if transition.is_some() {
            self.radio_pending = Some(RadioCommand::for_alert(active));
        }
        self.active = active;

        self.flush_radio();
        transition
    }

    /// Stop the sound, clear the wearable if it is alerting, and release the link.
    pub fn release(&mut self) {
        if let Some(sound_loop) = self.sound_loop.take() {
            sound_loop.stop();
        }
        if self.active {
            self.active = false;
            self.radio_pending = Some(RadioCommand::Clear);
            self.flush_radio();
        }
        self.radio_pending = None;
        self.radio.disconnect();
    }

    fn flush_radio(&mut self) {
        let Some(command) = self.radio_pending else {
            return;
        };
        match self.radio.send(command) {
            Ok(()) => {
                tracing::debug!("Sent {:?} to wearable {}", command, self.device_id);
                self.radio_pending = None;
            }
            Err(err) => {
                tracing::warn!(
                    "Radio send {:?} to {} failed: {} (retrying next cycle)",
                    command,
                    self.device_id,
                    err
                );
            }
        }
    }
}

/// Publishes per-entity alert flags and drives the local alert.
pub struct AlertDispatcher {
    bus: Arc<dyn AlertBus>,
    local: Option<LocalAlert>,
}

impl AlertDispatcher {
    pub fn new(bus: Arc<dyn AlertBus>, local: Option<LocalAlert>) -> Self {
        Self { bus, local }
    }

    pub fn local(&self) -> Option<&LocalAlert> {
        self.local.as_ref()
    }

    /// Publish `active = id ∈ colliding` for every id in `all_ids`.
    pub fn apply(
        &mut self,
        colliding: &BTreeSet<String>,
        all_ids: &BTreeSet<String>,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for entity_id in all_ids {
            let state = AlertState::new(entity_id.clone(), colliding.contains(entity_id));
            if state.active {
                report.active += 1;
            }
            match self.bus.publish(&state) {
                Ok(()) => report.published += 1,
                Err(err) => {
                    report.publish_failures += 1;
                    tracing::error!("Failed to publish alert for {}: {}", entity_id, err);
                }
            }
        }

        if let Some(local) = self.local.as_mut() {
            let active = colliding.contains(local.device_id());
            report.transition = local.update(active);
        }

        report
    }

    /// Release the local device outputs at session teardown.
    pub fn shutdown(&mut self) {
        if let Some(local) = self.local.as_mut() {
            local.release();
        }
    }
}
