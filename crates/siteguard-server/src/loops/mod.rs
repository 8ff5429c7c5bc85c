//! Background loops for continuous processing.
//!
//! Every loop checks the shutdown signal at the top of each tick and sleeps
//! its period only after the tick has finished, so ticks of one loop never
//! overlap.

pub mod alert_watch_loop;
pub mod collision_loop;
pub mod fix_intake_loop;
pub mod location_loop;

use std::time::Duration;

use tokio::sync::watch;

/// True once shutdown has been signalled or the session handle is gone.
pub(crate) fn is_shutdown(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Sleep for `period`, waking early on shutdown.
///
/// Returns false when the loop should exit.
pub(crate) async fn pause(shutdown: &mut watch::Receiver<bool>, period: Duration) -> bool {
    let sleep = tokio::time::sleep(period);
    tokio::pin!(sleep);

    loop {
        if *shutdown.borrow_and_update() {
            return false;
        }
        tokio::select! {
            _ = &mut sleep => return !*shutdown.borrow(),
            changed = shutdown.changed() => {
                if changed.is_err() {
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pause_sleeps_the_full_period() {
        let (_tx, mut rx) = watch::channel(false);
        let started = tokio::time::Instant::now();
        assert!(pause(&mut rx, Duration::from_secs(2)).await);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_wakes_on_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        let waiter = tokio::spawn(async move { pause(&mut rx, Duration::from_secs(60)).await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send_replace(true);
        assert!(!waiter.await.unwrap());
    }

    #[tokio::test]
    async fn dropped_sender_counts_as_shutdown() {
        let (tx, mut rx) = watch::channel(false);
        drop(tx);
        assert!(is_shutdown(&rx));
        assert!(!pause(&mut rx, Duration::from_secs(60)).await);
    }
}
