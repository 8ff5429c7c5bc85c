//! Alert flag bus keyed by entity id.
//!
//! Last write wins: each key holds only the latest flag. Observers either
//! watch a single key (the worn device reacting to its own alert) or follow
//! the feed of every write (WebSocket clients).

use dashmap::DashMap;
use siteguard_core::AlertState;
use thiserror::Error;
use tokio::sync::{broadcast, watch};

const FEED_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("alert bus unavailable: {0}")]
    Unavailable(String),
}

/// Publish/subscribe channel for per-entity alert flags.
pub trait AlertBus: Send + Sync {
    /// Write the flag for one entity.
    fn publish(&self, state: &AlertState) -> Result<(), BusError>;

    /// Follow one entity's flag. `None` until the first write.
    fn subscribe(&self, entity_id: &str) -> watch::Receiver<Option<bool>>;

    /// Follow every write on the bus.
    fn feed(&self) -> broadcast::Receiver<AlertState>;

    fn current(&self, entity_id: &str) -> Option<bool>;

    /// Latest flag of every key that has been written.
    fn snapshot(&self) -> Vec<AlertState>;
}

/// Process-local bus.
pub struct InMemoryAlertBus {
    flags: DashMap<String, watch::Sender<Option<bool>>>,
    feed: broadcast::Sender<AlertState>,
}

impl Default for InMemoryAlertBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAlertBus {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            flags: DashMap::new(),
            feed,
        }
    }
}

impl AlertBus for InMemoryAlertBus {
    fn publish(&self, state: &AlertState) -> Result<(), BusError> {
        self.flags
            .entry(state.entity_id.clone())
            .or_insert_with(|| watch::channel(None).0)
            .send_replace(Some(state.active));
        // No feed subscribers is fine.
        let _ = self.feed.send(state.clone());
        Ok(())
    }

    fn subscribe(&self, entity_id: &str) -> watch::Receiver<Option<bool>> {
        self.flags
            .entry(entity_id.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    fn feed(&self) -> broadcast::Receiver<AlertState> {
        self.feed.subscribe()
    }

    fn current(&self, entity_id: &str) -> Option<bool> {
        self.flags
            .get(entity_id)
            .and_then(|sender| *sender.borrow())
    }

    fn snapshot(&self) -> Vec<AlertState> {
        let mut states: Vec<AlertState> = self
            .flags
            .iter()
            .filter_map(|entry| {
                let active = (*entry.value().borrow())?;
                Some(AlertState::new(entry.key().clone(), active))
            })
            .collect();
        states.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        states
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let bus = InMemoryAlertBus::new();
        assert_eq!(bus.current("W1"), None);

        bus.publish(&AlertState::new("W1", true)).unwrap();
        bus.publish(&AlertState::new("W1", false)).unwrap();
        assert_eq!(bus.current("W1"), Some(false));
    }

    #[tokio::test]
    async fn subscriber_sees_changes_after_subscribing() {
        let bus = InMemoryAlertBus::new();
        let mut rx = bus.subscribe("W1");
        assert_eq!(*rx.borrow(), None);

        bus.publish(&AlertState::new("W1", true)).unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(true));
    }

    #[tokio::test]
    async fn feed_carries_every_write() {
        let bus = InMemoryAlertBus::new();
        let mut feed = bus.feed();

        bus.publish(&AlertState::new("W1", true)).unwrap();
        bus.publish(&AlertState::new("M1", true)).unwrap();

        assert_eq!(feed.recv().await.unwrap(), AlertState::new("W1", true));
        assert_eq!(feed.recv().await.unwrap(), AlertState::new("M1", true));
    }

    #[test]
    fn snapshot_skips_unwritten_keys() {
        let bus = InMemoryAlertBus::new();
        let _rx = bus.subscribe("ghost");
        bus.publish(&AlertState::new("M1", false)).unwrap();
        bus.publish(&AlertState::new("A1", true)).unwrap();

        assert_eq!(
            bus.snapshot(),
            vec![AlertState::new("A1", true), AlertState::new("M1", false)]
        );
    }
}
