//! Cookie jar storage backend
//!
//! Holds cookie records keyed by name and applies the acceptance rules a
//! browser applies:
//! - a `Secure` cookie is refused on an unencrypted transport
//! - `SameSite=None` is refused without `Secure`
//! - expired records read as absent
//!
//! Removal writes an already-expired record rather than dropping the key.

use async_trait::async_trait;
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::backing::Backing;
use super::events::{EventBus, StorageChange};
use super::record::{SameSite, StorageRecord, StoreOptions};
use super::CredentialStore;
use crate::error::{Result, SessionError};

const BACKEND_NAME: &str = "Cookie Jar";

/// Cookie jar storage backend
pub struct CookieJar {
    backing: Backing<StorageRecord>,
    /// Whether the page is served over an encrypted transport
    secure_transport: bool,
    events: EventBus,
}

impl CookieJar {
    /// Create a jar that lives as long as the process
    pub fn in_memory(secure_transport: bool) -> Self {
        Self::with_backing(Backing::memory(), secure_transport)
    }

    /// Create a jar persisted to a JSON file
    pub fn at_path(path: PathBuf, secure_transport: bool) -> Self {
        debug!("Cookie jar backed by {:?}", path);
        Self::with_backing(Backing::file(path), secure_transport)
    }

    /// Create a jar whose storage is blocked (e.g. cookies disabled by policy)
    pub fn disabled(reason: &str) -> Self {
        warn!("Cookie jar disabled: {}", reason);
        Self::with_backing(Backing::disabled(reason), false)
    }

    fn with_backing(backing: Backing<StorageRecord>, secure_transport: bool) -> Self {
        Self {
            backing,
            secure_transport,
            events: EventBus::new(),
        }
    }

    /// Publish changes on a shared event bus
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    pub fn secure_transport(&self) -> bool {
        self.secure_transport
    }

    /// Apply a `Set-Cookie` header received from the backend
    ///
    /// This is how cookies arrive out-of-band; unlike [`CredentialStore::set`]
    /// it reports parse and acceptance failures.
    pub async fn accept_set_cookie(&self, header: &str) -> Result<()> {
        let record = StorageRecord::parse_set_cookie(header, Utc::now())?;
        self.write_record(record).await
    }

    /// Live records, sorted by name
    pub async fn records(&self) -> Vec<StorageRecord> {
        let now = Utc::now();
        let result = self
            .backing
            .read(|records| {
                let mut live: Vec<StorageRecord> = records
                    .values()
                    .filter(|r| !r.is_expired_at(now))
                    .cloned()
                    .collect();
                live.sort_by(|a, b| a.name.cmp(&b.name));
                live
            })
            .await;

        result.unwrap_or_else(|e| {
            warn!("Cookie jar read failed: {}", e);
            Vec::new()
        })
    }

    /// Check the record against browser acceptance rules
    fn admit(&self, record: &StorageRecord) -> Result<()> {
        if record.secure && !self.secure_transport {
            return Err(SessionError::CookieRejected(format!(
                "{} is Secure but the transport is not encrypted",
                record.name
            )));
        }
        if record.same_site == SameSite::None && !record.secure {
            return Err(SessionError::CookieRejected(format!(
                "{} uses SameSite=None without Secure",
                record.name
            )));
        }
        Ok(())
    }

    async fn write_record(&self, record: StorageRecord) -> Result<()> {
        self.admit(&record)?;

        let now = Utc::now();
        let name = record.name.clone();
        let live = !record.is_expired_at(now);

        let was_live = self
            .backing
            .update(move |records| {
                // Housekeeping happens on writes only
                records.retain(|_, r| !r.is_expired_at(now));
                let previous = records.insert(record.name.clone(), record);
                previous.is_some_and(|r| !r.is_expired_at(now))
            })
            .await?;

        if live {
            debug!("Set cookie: {}", name);
            self.events.publish(BACKEND_NAME, &name, StorageChange::Set);
        } else if was_live {
            debug!("Expired cookie: {}", name);
            self.events.publish(BACKEND_NAME, &name, StorageChange::Removed);
        }

        Ok(())
    }

    async fn read_value(&self, name: &str) -> Result<Option<String>> {
        let now = Utc::now();
        self.backing
            .read(|records| {
                records
                    .get(name)
                    .filter(|r| !r.is_expired_at(now))
                    .map(|r| r.value.clone())
            })
            .await
    }
}

#[async_trait]
impl CredentialStore for CookieJar {
    async fn set(&self, name: &str, value: &str, options: &StoreOptions) {
        if options.http_only {
            debug!(
                "HttpOnly requested for {} from client code; recorded but not enforceable",
                name
            );
        }

        let record =
            StorageRecord::from_options(name, value, options, self.secure_transport, Utc::now());

        if let Err(e) = self.write_record(record).await {
            warn!("Cookie write failed for {}: {}", name, e);
        }
    }

    async fn get(&self, name: &str) -> Option<String> {
        match self.read_value(name).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Cookie read failed for {}: {}", name, e);
                None
            }
        }
    }

    async fn remove(&self, name: &str) {
        let path = self
            .backing
            .read(|records| records.get(name).map(|r| r.path.clone()))
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| "/".to_string());

        if let Err(e) = self.write_record(StorageRecord::expired(name, &path)).await {
            warn!("Cookie removal failed for {}: {}", name, e);
        }
    }

    fn is_available(&self) -> bool {
        self.backing.is_available()
    }

    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
}
