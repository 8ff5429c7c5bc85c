//! Repeating alert sound bound to the lifetime of a local alert.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Audible feedback on the local device.
pub trait AlertSound: Send + Sync {
    fn play(&self);
}

/// Sound output for headless deployments.
#[derive(Debug, Default)]
pub struct LoggingSound;

impl AlertSound for LoggingSound {
    fn play(&self) {
        tracing::info!("Playing alert sound");
    }
}

/// Cancellable periodic task that replays the alert sound.
///
/// Plays immediately, then once per period until [`SoundLoop::stop`] is
/// called or the handle is dropped.
pub struct SoundLoop {
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SoundLoop {
    pub fn start(sound: Arc<dyn AlertSound>, period: Duration) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            loop {
                if !matches!(
                    stop_rx.try_recv(),
                    Err(oneshot::error::TryRecvError::Empty)
                ) {
                    break;
                }

                sound.play();

                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(period) => {}
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop replaying. No playback starts after this returns.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for SoundLoop {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.abort();
    }
}
