//! Storage change notifications
//!
//! Subscribers learn about writes and removals as they happen instead of
//! re-reading a key on a timer.

use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Kind of change applied to a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageChange {
    Set,
    Removed,
}

/// A change to one key in one store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageEvent {
    /// Backend that applied the change
    pub store: &'static str,
    /// Affected key
    pub key: String,
    pub change: StorageChange,
}

/// Broadcast channel shared by the stores of one session
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StorageEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event; having no subscribers is fine
    pub fn publish(&self, store: &'static str, key: &str, change: StorageChange) {
        let _ = self.sender.send(StorageEvent {
            store,
            key: key.to_string(),
            change,
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
