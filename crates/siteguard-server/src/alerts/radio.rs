//! Short-range radio link to the wearable alert device.
//!
//! The hard hat understands two one-byte commands. Delivery is best effort:
//! the link never blocks the caller and acknowledgment is the radio layer's
//! concern.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioCommand {
    /// Start the wearable's alert
    Engage,
    /// Stop the wearable's alert
    Clear,
}

impl RadioCommand {
    pub fn as_byte(self) -> u8 {
        match self {
            RadioCommand::Engage => b'A',
            RadioCommand::Clear => b'O',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(RadioCommand::Engage),
            b'O' => Some(RadioCommand::Clear),
            _ => None,
        }
    }

    pub fn for_alert(active: bool) -> Self {
        if active {
            RadioCommand::Engage
        } else {
            RadioCommand::Clear
        }
    }
}

impl fmt::Display for RadioCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RadioError {
    #[error("radio link not connected")]
    NotConnected,
    #[error("radio queue full, dropped {0}")]
    QueueFull(RadioCommand),
}

pub trait RadioLink: Send + Sync {
    /// Queue a command for transmission without waiting for delivery.
    fn send(&self, command: RadioCommand) -> Result<(), RadioError>;

    fn is_connected(&self) -> bool;

    /// Release the link; later sends fail with [`RadioError::NotConnected`].
    fn disconnect(&self);
}

/// Radio link backed by a bounded queue drained by the transport task.
pub struct ChannelRadioLink {
    tx: mpsc::Sender<u8>,
    connected: AtomicBool,
}

impl ChannelRadioLink {
    /// Create the link and the receiving end the transport drains.
    pub fn new(depth: usize) -> (Self, mpsc::Receiver<u8>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let link = Self {
            tx,
            connected: AtomicBool::new(true),
        };
        (link, rx)
    }
}

impl RadioLink for ChannelRadioLink {
    fn send(&self, command: RadioCommand) -> Result<(), RadioError> {
        if !self.is_connected() {
            return Err(RadioError::NotConnected);
        }
        self.tx.try_send(command.as_byte()).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => RadioError::QueueFull(command),
            mpsc::error::TrySendError::Closed(_) => {
                self.connected.store(false, Ordering::SeqCst);
                RadioError::NotConnected
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::info!("Radio link disconnected");
        }
    }
}

/// Drain the radio queue, logging each command as it would go on the air.
///
/// Stands in for the transport when no hardware is attached.
pub async fn run_logging_transport(mut rx: mpsc::Receiver<u8>) {
    while let Some(byte) = rx.recv().await {
        match RadioCommand::from_byte(byte) {
            Some(command) => tracing::info!("Radio TX {:?} ({})", command, command),
            None => tracing::warn!("Radio TX unknown byte 0x{:02x}", byte),
        }
    }
    tracing::debug!("Radio transport closed");
}
