//! Local key-value storage backend
//!
//! Plain string values with no attributes. Used two ways:
//! - ephemeral (in memory) for the access token
//! - durable (JSON file) for the legacy refresh token scheme

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::backing::Backing;
use super::events::{EventBus, StorageChange};
use super::{CredentialStore, StoreOptions};
use crate::error::Result;

/// Local key-value storage backend
pub struct LocalStore {
    backing: Backing<String>,
    name: &'static str,
    events: EventBus,
}

impl LocalStore {
    /// Create an ephemeral store that forgets everything when dropped
    pub fn in_memory() -> Self {
        Self::with_backing(Backing::memory(), "Session Memory")
    }

    /// Create a durable store persisted to a JSON file
    pub fn at_path(path: PathBuf) -> Self {
        debug!("Local store backed by {:?}", path);
        Self::with_backing(Backing::file(path), "Local Store")
    }

    /// Create a store whose storage is blocked (e.g. disabled by the user)
    pub fn disabled(reason: &str) -> Self {
        warn!("Local store disabled: {}", reason);
        Self::with_backing(Backing::disabled(reason), "Local Store")
    }

    fn with_backing(backing: Backing<String>, name: &'static str) -> Self {
        Self {
            backing,
            name,
            events: EventBus::new(),
        }
    }

    /// Override the backend name reported in logs and events
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Publish changes on a shared event bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    async fn try_set(&self, name: &str, value: &str) -> Result<()> {
        let key = name.to_string();
        let value = value.to_string();
        self.backing
            .update(move |entries| {
                entries.insert(key, value);
            })
            .await?;

        self.events.publish(self.name, name, StorageChange::Set);
        Ok(())
    }

    async fn try_remove(&self, name: &str) -> Result<()> {
        let removed = self
            .backing
            .update(|entries| entries.remove(name).is_some())
            .await?;

        if removed {
            self.events.publish(self.name, name, StorageChange::Removed);
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for LocalStore {
    async fn set(&self, name: &str, value: &str, _options: &StoreOptions) {
        match self.try_set(name, value).await {
            Ok(()) => debug!("Stored key in {}: {}", self.name, name),
            Err(e) => warn!("{} write failed for {}: {}", self.name, name, e),
        }
    }

    async fn get(&self, name: &str) -> Option<String> {
        match self.backing.read(|entries| entries.get(name).cloned()).await {
            Ok(value) => value,
            Err(e) => {
                warn!("{} read failed for {}: {}", self.name, name, e);
                None
            }
        }
    }

    async fn remove(&self, name: &str) {
        if let Err(e) = self.try_remove(name).await {
            warn!("{} removal failed for {}: {}", self.name, name, e);
        }
    }

    fn is_available(&self) -> bool {
        self.backing.is_available()
    }

    fn backend_name(&self) -> &'static str {
        self.name
    }
}
