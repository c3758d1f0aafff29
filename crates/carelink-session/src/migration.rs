//! Migration from local-store refresh tokens to cookie refresh tokens
//!
//! Sessions issued before the migration still carry their refresh token in
//! the local store, while new sessions use the cookie jar. The coordinator
//! picks the strategy once per session and reports when both schemes are
//! present. It never deletes a legacy credential on its own; only an explicit
//! clear does.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::credential::{
    AuthMethod, CredentialStores, SessionCredentialManager, StorageStrategy, TokenKeys,
};
use crate::error::Result;
use crate::storage::StoreOptions;

/// Migration status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationInfo {
    pub active_method: AuthMethod,
    /// Both schemes hold a refresh token; cleanup is pending
    pub legacy_method_present: bool,
}

/// Picks and holds the credential manager in effect for a session
pub struct MigrationCoordinator {
    manager: Arc<SessionCredentialManager>,
}

impl MigrationCoordinator {
    /// Decide the strategy and build the session's manager
    ///
    /// The cookie strategy needs cookie auth enabled and a usable cookie
    /// jar; anything else falls back to the legacy local-store strategy.
    pub fn new(
        stores: CredentialStores,
        keys: TokenKeys,
        cookie_auth_enabled: bool,
        cookie_options: StoreOptions,
    ) -> Self {
        let strategy = if cookie_auth_enabled && stores.cookie.is_available() {
            StorageStrategy::Cookie
        } else {
            StorageStrategy::LocalStore
        };

        info!(
            "Credential strategy: {} (cookie backend: {}, local backend: {})",
            strategy,
            stores.cookie.backend_name(),
            stores.local.backend_name()
        );

        let manager = SessionCredentialManager::new(stores, keys, strategy, cookie_options);
        Self {
            manager: Arc::new(manager),
        }
    }

    /// The manager in effect; the same instance for the whole session
    pub fn get_current_manager(&self) -> Arc<SessionCredentialManager> {
        self.manager.clone()
    }

    pub fn strategy(&self) -> StorageStrategy {
        self.manager.strategy()
    }

    /// Report which scheme is authoritative and whether the other lingers
    pub async fn get_migration_info(&self) -> MigrationInfo {
        let (in_cookie, in_local) = self.manager.get_refresh_presence().await;

        let migration = MigrationInfo {
            active_method: AuthMethod::from_presence(in_cookie, in_local),
            legacy_method_present: in_cookie && in_local,
        };
        debug!("Migration info: {:?}", migration);
        migration
    }

    pub async fn is_authenticated(&self) -> bool {
        self.manager.is_authenticated().await
    }

    pub async fn get_access_token(&self) -> Option<String> {
        self.manager.get_access_token().await
    }

    /// Access token for an authenticated call, or `MissingCredential`
    pub async fn require_access_token(&self) -> Result<String> {
        self.manager.require_access_token().await
    }

    pub async fn authorization_header(&self) -> Option<String> {
        self.manager.authorization_header().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CookieJar, CredentialStore, LocalStore};

    fn stores_with(cookie: CookieJar) -> (CredentialStores, Arc<CookieJar>, Arc<LocalStore>) {
        let cookie = Arc::new(cookie);
        let local = Arc::new(LocalStore::in_memory());
        let stores = CredentialStores {
            ephemeral: Arc::new(LocalStore::in_memory()),
            cookie: cookie.clone(),
            local: local.clone(),
        };
        (stores, cookie, local)
    }

    fn coordinator(
        cookie_auth_enabled: bool,
    ) -> (MigrationCoordinator, Arc<CookieJar>, Arc<LocalStore>) {
        let (stores, cookie, local) = stores_with(CookieJar::in_memory(true));
        let coordinator = MigrationCoordinator::new(
            stores,
            TokenKeys::default(),
            cookie_auth_enabled,
            StoreOptions::default(),
        );
        (coordinator, cookie, local)
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(coordinator(true).0.strategy(), StorageStrategy::Cookie);
        assert_eq!(coordinator(false).0.strategy(), StorageStrategy::LocalStore);

        let (stores, _, _) = stores_with(CookieJar::disabled("cookies blocked"));
        let coordinator =
            MigrationCoordinator::new(stores, TokenKeys::default(), true, StoreOptions::default());
        assert_eq!(coordinator.strategy(), StorageStrategy::LocalStore);
    }

    #[test]
    fn test_current_manager_is_stable() {
        let (coordinator, _, _) = coordinator(true);
        let first = coordinator.get_current_manager();
        let second = coordinator.get_current_manager();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_migration_info_states() {
        let (coordinator, cookie, local) = coordinator(true);
        let opts = StoreOptions::default();

        let info = coordinator.get_migration_info().await;
        assert_eq!(info.active_method, AuthMethod::None);
        assert!(!info.legacy_method_present);

        local.set("carelink_refresh", "legacy", &opts).await;
        let info = coordinator.get_migration_info().await;
        assert_eq!(info.active_method, AuthMethod::LocalStore);
        assert!(!info.legacy_method_present);

        cookie.set("carelink_refresh", "current", &opts).await;
        let info = coordinator.get_migration_info().await;
        assert_eq!(info.active_method, AuthMethod::Cookie);
        assert!(info.legacy_method_present);
    }

    #[tokio::test]
    async fn test_reads_never_delete_legacy_credential() {
        let (coordinator, cookie, local) = coordinator(true);
        let opts = StoreOptions::default();
        local.set("carelink_refresh", "legacy", &opts).await;
        cookie.set("carelink_refresh", "current", &opts).await;

        for _ in 0..3 {
            coordinator.get_migration_info().await;
            coordinator.is_authenticated().await;
            coordinator.get_current_manager().get_refresh_token().await;
        }

        assert_eq!(local.get("carelink_refresh").await, Some("legacy".to_string()));

        coordinator.get_current_manager().clear_tokens().await;
        assert_eq!(local.get("carelink_refresh").await, None);
        assert!(!coordinator.get_migration_info().await.legacy_method_present);
    }

    #[tokio::test]
    async fn test_migration_info_serializes() {
        let (coordinator, _, _) = coordinator(false);
        coordinator.get_current_manager().set_tokens("a", "r").await;

        let json = serde_json::to_value(coordinator.get_migration_info().await).unwrap();
        assert_eq!(json["activeMethod"], "local-store");
        assert_eq!(json["legacyMethodPresent"], false);
    }
}
