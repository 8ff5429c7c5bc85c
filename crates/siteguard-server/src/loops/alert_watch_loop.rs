//! Alert watch loop for worn devices.
//!
//! A device that does not run collision checks itself follows its own flag
//! on the alert bus and drives the local alert from it. The flag is also
//! re-applied every period so a failed radio write gets another attempt.

use std::sync::Arc;

use tokio::sync::watch;

use crate::alerts::LocalAlert;
use crate::loops::is_shutdown;
use crate::state::AppState;

pub async fn run_alert_watch_loop(
    state: Arc<AppState>,
    mut local: LocalAlert,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = state.config().rules.collision_check();
    let mut flag = state.bus().subscribe(local.device_id());
    tracing::info!("Watching alert flag for {}", local.device_id());

    loop {
        if is_shutdown(&shutdown) {
            break;
        }

        let active = flag.borrow_and_update().unwrap_or(false);
        if let Some(transition) = local.update(active) {
            tracing::debug!("Local alert {:?} from bus", transition);
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = flag.changed() => {
                if changed.is_err() {
                    tracing::warn!("Alert bus closed the flag for {}", local.device_id());
                    break;
                }
            }
            _ = tokio::time::sleep(period) => {}
        }
    }

    local.release();
    tracing::info!("Alert watch loop shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::radio::{ChannelRadioLink, RadioCommand};
    use crate::alerts::sound::tests::CountingSound;
    use crate::alerts::{AlertBus, InMemoryAlertBus, RadioLink};
    use crate::config::Config;
    use siteguard_core::AlertState;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn follows_own_flag_and_clears_on_shutdown() {
        let bus = Arc::new(InMemoryAlertBus::new());
        let (state, _rx) = AppState::new(Config::default(), bus.clone());
        let (radio, mut radio_rx) = ChannelRadioLink::new(8);
        let radio = Arc::new(radio);
        let sound = Arc::new(CountingSound::default());
        let local = LocalAlert::new("W1", radio.clone(), sound.clone(), Duration::from_secs(2));

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(run_alert_watch_loop(Arc::new(state), local, rx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        bus.publish(&AlertState::new("W2", true)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(radio_rx.try_recv().is_err());

        bus.publish(&AlertState::new("W1", true)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(radio_rx.try_recv().ok(), Some(RadioCommand::Engage.as_byte()));
        assert!(sound.count() >= 1);

        tx.send_replace(true);
        handle.await.unwrap();

        assert_eq!(radio_rx.try_recv().ok(), Some(RadioCommand::Clear.as_byte()));
        assert!(!radio.is_connected());
    }
}
