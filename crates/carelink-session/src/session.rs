//! Session bootstrap
//!
//! An [`AuthSession`] is built once at application start and handed to
//! whatever needs credentials. It owns the stores, the shared change channel
//! and the migration coordinator. Logging out consumes it.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::credential::CredentialStores;
use crate::error::Result;
use crate::migration::MigrationCoordinator;
use crate::settings::Settings;
use crate::storage::{CookieJar, EventBus, LocalStore, StorageEvent};

const COOKIE_FILE: &str = "cookies.json";
const LOCAL_FILE: &str = "local_store.json";
const ACCESS_FILE: &str = "access.json";

/// Credential state for one application session
pub struct AuthSession {
    settings: Settings,
    cookie_jar: Arc<CookieJar>,
    coordinator: Arc<MigrationCoordinator>,
    events: EventBus,
}

impl AuthSession {
    /// Open the durable stores under the configured storage directory
    pub fn bootstrap(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let dir = settings.resolve_storage_dir()?;
        let secure_transport = settings.secure_transport();

        let cookie_jar = CookieJar::at_path(dir.join(COOKIE_FILE), secure_transport);
        let local = LocalStore::at_path(dir.join(LOCAL_FILE));
        let ephemeral = if settings.persist_access_token {
            LocalStore::at_path(dir.join(ACCESS_FILE))
        } else {
            LocalStore::in_memory()
        };

        info!("Bootstrapping session storage in {:?}", dir);
        Ok(Self::with_stores(settings, cookie_jar, local, ephemeral))
    }

    /// Session backed only by memory
    pub fn in_memory(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let cookie_jar = CookieJar::in_memory(settings.secure_transport());
        Ok(Self::with_stores(
            settings,
            cookie_jar,
            LocalStore::in_memory().named("Local Store"),
            LocalStore::in_memory(),
        ))
    }

    /// Assemble a session from explicit stores
    ///
    /// The stores are moved onto this session's event bus.
    pub fn with_stores(
        settings: Settings,
        cookie_jar: CookieJar,
        local: LocalStore,
        ephemeral: LocalStore,
    ) -> Self {
        let events = EventBus::new();
        let cookie_jar = Arc::new(cookie_jar.with_events(events.clone()));

        let stores = CredentialStores {
            ephemeral: Arc::new(ephemeral.with_events(events.clone())),
            cookie: cookie_jar.clone(),
            local: Arc::new(local.with_events(events.clone())),
        };

        let coordinator = MigrationCoordinator::new(
            stores,
            settings.token_keys(),
            settings.cookie_auth_enabled,
            settings.cookie.store_options(),
        );

        Self {
            settings,
            cookie_jar,
            coordinator: Arc::new(coordinator),
            events,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn coordinator(&self) -> Arc<MigrationCoordinator> {
        self.coordinator.clone()
    }

    /// The jar that backend `Set-Cookie` headers are applied to
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        self.cookie_jar.clone()
    }

    /// Receive every set and removal applied to this session's stores
    pub fn subscribe(&self) -> broadcast::Receiver<StorageEvent> {
        self.events.subscribe()
    }

    /// Clear credentials from every store and drop the session
    pub async fn logout(self) {
        self.coordinator.get_current_manager().clear_tokens().await;
        info!("Logged out");
    }
}
