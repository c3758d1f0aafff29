//! Session credential manager
//!
//! Holds the access/refresh token pair across three stores:
//! - ephemeral store: access token
//! - cookie jar: refresh token (current scheme)
//! - local store: refresh token (legacy scheme), legacy access token copies
//!
//! # Precedence
//!
//! When both durable stores hold a refresh token, the cookie jar wins. This
//! holds even if the local value was written later. Callers that need
//! "newest wins" semantics must not use this type.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{
    AuthMethod, CredentialPair, LoginTokens, StorageStrategy, TokenInfo, TokenKeys,
};
use crate::error::{Result, SessionError};
use crate::storage::{CredentialStore, StoreOptions};

/// The stores a manager reads and writes
#[derive(Clone)]
pub struct CredentialStores {
    /// Fast, non-durable store for the access token
    pub ephemeral: Arc<dyn CredentialStore>,
    /// Cookie-capable durable store
    pub cookie: Arc<dyn CredentialStore>,
    /// Legacy durable key-value store
    pub local: Arc<dyn CredentialStore>,
}

/// Session credential manager
pub struct SessionCredentialManager {
    stores: CredentialStores,
    keys: TokenKeys,
    /// Durable store that receives new refresh tokens
    strategy: StorageStrategy,
    /// Attributes for the refresh cookie
    cookie_options: StoreOptions,
    /// Writers take this exclusively so a snapshot never sees half a write
    gate: RwLock<()>,
}

impl SessionCredentialManager {
    /// Create a new credential manager
    pub fn new(
        stores: CredentialStores,
        keys: TokenKeys,
        strategy: StorageStrategy,
        cookie_options: StoreOptions,
    ) -> Self {
        Self {
            stores,
            keys,
            strategy,
            cookie_options,
            gate: RwLock::new(()),
        }
    }

    pub fn strategy(&self) -> StorageStrategy {
        self.strategy
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    pub fn stores(&self) -> &CredentialStores {
        &self.stores
    }

    /// Store a freshly issued token pair
    ///
    /// The two writes are independent: a failing store for one token does
    /// not stop the other from being written.
    pub async fn set_tokens(&self, access: &str, refresh: &str) {
        let _gate = self.gate.write().await;

        self.stores
            .ephemeral
            .set(&self.keys.access, access, &StoreOptions::default())
            .await;

        match self.strategy {
            StorageStrategy::Cookie => {
                self.stores
                    .cookie
                    .set(&self.keys.refresh, refresh, &self.cookie_options)
                    .await
            }
            StorageStrategy::LocalStore => {
                self.stores
                    .local
                    .set(&self.keys.refresh, refresh, &StoreOptions::default())
                    .await
            }
        }

        info!("Stored credential pair ({} strategy)", self.strategy);
    }

    /// Store the pair from a login response body
    pub async fn store_login(&self, tokens: &LoginTokens) {
        self.set_tokens(&tokens.access, &tokens.refresh).await;
    }

    /// Replace only the access token (after a refresh round-trip)
    pub async fn set_access_token(&self, access: &str) {
        let _gate = self.gate.write().await;
        self.stores
            .ephemeral
            .set(&self.keys.access, access, &StoreOptions::default())
            .await;
        debug!("Rotated access token");
    }

    /// Current access token
    ///
    /// Legacy sessions kept the access token in the local store, so that is
    /// consulted when the ephemeral store is empty.
    pub async fn get_access_token(&self) -> Option<String> {
        let _gate = self.gate.read().await;
        self.read_access().await
    }

    /// Current access token, or [`SessionError::MissingCredential`]
    pub async fn require_access_token(&self) -> Result<String> {
        self.get_access_token()
            .await
            .ok_or(SessionError::MissingCredential)
    }

    /// Current refresh token: cookie jar first, then local store
    pub async fn get_refresh_token(&self) -> Option<String> {
        let _gate = self.gate.read().await;
        let (cookie, local) = self.read_refresh_sources().await;
        cookie.or(local)
    }

    /// Which store holds the authoritative refresh token
    pub async fn get_auth_method(&self) -> AuthMethod {
        let _gate = self.gate.read().await;
        let (cookie, local) = self.read_refresh_sources().await;
        AuthMethod::from_presence(cookie.is_some(), local.is_some())
    }

    /// Whether the cookie jar and the local store hold a refresh token,
    /// read under one lock
    pub async fn get_refresh_presence(&self) -> (bool, bool) {
        let _gate = self.gate.read().await;
        let (cookie, local) = self.read_refresh_sources().await;
        (cookie.is_some(), local.is_some())
    }

    /// Whether any token is present (validity is not checked)
    pub async fn is_authenticated(&self) -> bool {
        self.get_token_info().await.is_authenticated()
    }

    /// Consistent snapshot of what is stored
    pub async fn get_token_info(&self) -> TokenInfo {
        let _gate = self.gate.read().await;
        let has_access = self.read_access().await.is_some();
        let (cookie, local) = self.read_refresh_sources().await;

        TokenInfo {
            has_access,
            has_refresh: cookie.is_some() || local.is_some(),
            auth_method: AuthMethod::from_presence(cookie.is_some(), local.is_some()),
        }
    }

    /// Current pair, read under one lock
    pub async fn get_credentials(&self) -> CredentialPair {
        let _gate = self.gate.read().await;
        let access = self.read_access().await;
        let (cookie, local) = self.read_refresh_sources().await;
        CredentialPair::new(access, cookie.or(local))
    }

    /// `Authorization` header value for outbound API calls
    pub async fn authorization_header(&self) -> Option<String> {
        self.get_access_token()
            .await
            .map(|token| format!("Bearer {}", token))
    }

    /// Remove both tokens from every store
    ///
    /// Clearing only the authoritative store would let a stale value in the
    /// other one resurface on the next read.
    pub async fn clear_tokens(&self) {
        let _gate = self.gate.write().await;

        self.stores.ephemeral.remove(&self.keys.access).await;
        self.stores.local.remove(&self.keys.access).await;
        self.stores.cookie.remove(&self.keys.refresh).await;
        self.stores.local.remove(&self.keys.refresh).await;

        info!("Cleared credentials from all stores");
    }

    async fn read_access(&self) -> Option<String> {
        match self.stores.ephemeral.get(&self.keys.access).await {
            Some(token) => Some(token),
            None => self.stores.local.get(&self.keys.access).await,
        }
    }

    async fn read_refresh_sources(&self) -> (Option<String>, Option<String>) {
        let cookie = self.stores.cookie.get(&self.keys.refresh).await;
        let local = self.stores.local.get(&self.keys.refresh).await;
        (cookie, local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CookieJar, LocalStore};

    struct Fixture {
        manager: SessionCredentialManager,
        ephemeral: Arc<LocalStore>,
        cookie: Arc<CookieJar>,
        local: Arc<LocalStore>,
    }

    fn fixture(strategy: StorageStrategy) -> Fixture {
        fixture_with(LocalStore::in_memory(), strategy)
    }

    fn fixture_with(ephemeral: LocalStore, strategy: StorageStrategy) -> Fixture {
        fixture_from(
            ephemeral,
            CookieJar::in_memory(true),
            LocalStore::in_memory(),
            strategy,
            StoreOptions::default().max_age(3600),
        )
    }

    fn fixture_from(
        ephemeral: LocalStore,
        cookie: CookieJar,
        local: LocalStore,
        strategy: StorageStrategy,
        cookie_options: StoreOptions,
    ) -> Fixture {
        let ephemeral = Arc::new(ephemeral);
        let cookie = Arc::new(cookie);
        let local = Arc::new(local);

        let stores = CredentialStores {
            ephemeral: ephemeral.clone(),
            cookie: cookie.clone(),
            local: local.clone(),
        };
        let manager = SessionCredentialManager::new(
            stores,
            TokenKeys::default(),
            strategy,
            cookie_options,
        );

        Fixture {
            manager,
            ephemeral,
            cookie,
            local,
        }
    }

    async fn put_cookie(f: &Fixture, value: &str) {
        f.cookie
            .set("carelink_refresh", value, &StoreOptions::default())
            .await;
    }

    async fn put_local(f: &Fixture, value: &str) {
        f.local
            .set("carelink_refresh", value, &StoreOptions::default())
            .await;
    }

    #[tokio::test]
    async fn test_cookie_wins_over_local() {
        let pairs = [("c1", "l1"), ("cookie", "newer-local"), ("x", "y")];

        for (cookie_value, local_value) in pairs {
            let f = fixture(StorageStrategy::Cookie);
            put_cookie(&f, cookie_value).await;
            put_local(&f, local_value).await;

            assert_eq!(
                f.manager.get_refresh_token().await,
                Some(cookie_value.to_string())
            );
        }
    }

    #[tokio::test]
    async fn test_cookie_wins_even_when_local_written_later() {
        let f = fixture(StorageStrategy::Cookie);
        put_cookie(&f, "from-cookie").await;
        put_local(&f, "written-after").await;

        assert_eq!(
            f.manager.get_refresh_token().await,
            Some("from-cookie".to_string())
        );
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::Cookie);
    }

    #[tokio::test]
    async fn test_falls_back_to_local() {
        let f = fixture(StorageStrategy::Cookie);
        put_local(&f, "old_token").await;

        assert_eq!(
            f.manager.get_refresh_token().await,
            Some("old_token".to_string())
        );
    }

    #[tokio::test]
    async fn test_clear_is_total() {
        for strategy in [StorageStrategy::Cookie, StorageStrategy::LocalStore] {
            let f = fixture(strategy);
            f.manager.set_tokens("A", "R").await;
            // Stale copies in the non-authoritative stores
            put_cookie(&f, "stale-cookie").await;
            put_local(&f, "stale-local").await;
            f.local
                .set("carelink_access", "stale-access", &StoreOptions::default())
                .await;

            f.manager.clear_tokens().await;

            assert_eq!(f.manager.get_access_token().await, None);
            assert_eq!(f.manager.get_refresh_token().await, None);
            assert_eq!(f.manager.get_auth_method().await, AuthMethod::None);
            assert!(!f.manager.is_authenticated().await);
        }
    }

    #[tokio::test]
    async fn test_auth_method_is_deterministic() {
        let f = fixture(StorageStrategy::Cookie);
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::None);

        put_local(&f, "l").await;
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::LocalStore);

        put_cookie(&f, "c").await;
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::Cookie);

        f.local.remove("carelink_refresh").await;
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::Cookie);

        f.cookie.remove("carelink_refresh").await;
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::None);
    }

    #[tokio::test]
    async fn test_legacy_strategy_writes_local_store() {
        let f = fixture(StorageStrategy::LocalStore);

        f.manager.set_tokens("acc1", "ref1").await;

        assert_eq!(f.manager.get_access_token().await, Some("acc1".to_string()));
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::LocalStore);
        assert_eq!(f.cookie.get("carelink_refresh").await, None);

        // A later cookie write takes over
        put_cookie(&f, "ref1-cookie").await;
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::Cookie);
    }

    #[tokio::test]
    async fn test_cookie_strategy_writes_cookie_jar() {
        let f = fixture(StorageStrategy::Cookie);

        f.manager.set_tokens("acc1", "ref1").await;

        assert_eq!(f.cookie.get("carelink_refresh").await, Some("ref1".to_string()));
        assert_eq!(f.local.get("carelink_refresh").await, None);
        assert_eq!(f.manager.get_auth_method().await, AuthMethod::Cookie);
        assert_eq!(f.ephemeral.get("carelink_access").await, Some("acc1".to_string()));
    }

    #[tokio::test]
    async fn test_external_cookie_overrides_local() {
        let f = fixture(StorageStrategy::LocalStore);
        f.manager.set_tokens("acc1", "ref1").await;

        f.cookie
            .accept_set_cookie("carelink_refresh=ref2; Path=/; Secure; SameSite=Strict")
            .await
            .unwrap();

        assert_eq!(f.manager.get_refresh_token().await, Some("ref2".to_string()));
    }

    #[tokio::test]
    async fn test_failed_access_write_does_not_block_refresh() {
        let f = fixture_with(LocalStore::disabled("blocked"), StorageStrategy::Cookie);

        f.manager.set_tokens("acc", "ref").await;

        assert_eq!(f.manager.get_access_token().await, None);
        assert_eq!(f.manager.get_refresh_token().await, Some("ref".to_string()));
        assert!(f.manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_failed_refresh_write_does_not_block_access() {
        let f = fixture_from(
            LocalStore::in_memory(),
            CookieJar::disabled("cookies blocked"),
            LocalStore::in_memory(),
            StorageStrategy::Cookie,
            StoreOptions::default(),
        );
        f.manager.set_tokens("acc", "ref").await;
        assert_eq!(f.manager.get_access_token().await, Some("acc".to_string()));
        assert_eq!(f.manager.get_refresh_token().await, None);

        let f = fixture_from(
            LocalStore::in_memory(),
            CookieJar::in_memory(true),
            LocalStore::disabled("storage blocked"),
            StorageStrategy::LocalStore,
            StoreOptions::default(),
        );
        f.manager.set_tokens("acc", "ref").await;
        assert_eq!(f.manager.get_access_token().await, Some("acc".to_string()));
        assert_eq!(f.manager.get_refresh_token().await, None);
        assert!(f.manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_unbounded_cookie_lifetime_is_capped() {
        let f = fixture_from(
            LocalStore::in_memory(),
            CookieJar::in_memory(true),
            LocalStore::in_memory(),
            StorageStrategy::Cookie,
            StoreOptions::default().max_age(10_000_000_000_000),
        );

        f.manager.set_tokens("a", "r").await;

        assert_eq!(f.manager.get_refresh_token().await, Some("r".to_string()));
        assert!(f.cookie.records().await[0].expires_at.is_some());
    }

    #[tokio::test]
    async fn test_require_access_token() {
        let f = fixture(StorageStrategy::Cookie);
        assert!(matches!(
            f.manager.require_access_token().await,
            Err(SessionError::MissingCredential)
        ));

        f.manager.set_access_token("acc").await;
        assert_eq!(f.manager.require_access_token().await.unwrap(), "acc");
    }

    #[tokio::test]
    async fn test_reads_have_no_side_effects() {
        let f = fixture(StorageStrategy::Cookie);
        put_cookie(&f, "c").await;
        put_local(&f, "l").await;

        for _ in 0..3 {
            f.manager.get_refresh_token().await;
            f.manager.get_auth_method().await;
            f.manager.get_token_info().await;
        }

        assert_eq!(f.cookie.get("carelink_refresh").await, Some("c".to_string()));
        assert_eq!(f.local.get("carelink_refresh").await, Some("l".to_string()));
    }

    #[tokio::test]
    async fn test_token_info() {
        let f = fixture(StorageStrategy::LocalStore);
        assert_eq!(
            f.manager.get_token_info().await,
            TokenInfo {
                has_access: false,
                has_refresh: false,
                auth_method: AuthMethod::None,
            }
        );

        f.manager.set_tokens("a", "r").await;
        assert_eq!(
            f.manager.get_token_info().await,
            TokenInfo {
                has_access: true,
                has_refresh: true,
                auth_method: AuthMethod::LocalStore,
            }
        );
    }

    #[tokio::test]
    async fn test_refresh_alone_is_authenticated() {
        let f = fixture(StorageStrategy::Cookie);
        put_cookie(&f, "r").await;

        assert_eq!(f.manager.get_access_token().await, None);
        assert!(f.manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_legacy_access_token_in_local_store() {
        let f = fixture(StorageStrategy::LocalStore);
        f.local
            .set("carelink_access", "legacy-acc", &StoreOptions::default())
            .await;

        assert_eq!(
            f.manager.get_access_token().await,
            Some("legacy-acc".to_string())
        );

        f.manager.set_access_token("fresh-acc").await;
        assert_eq!(
            f.manager.get_access_token().await,
            Some("fresh-acc".to_string())
        );
    }

    #[tokio::test]
    async fn test_authorization_header_and_credentials() {
        let f = fixture(StorageStrategy::Cookie);
        assert_eq!(f.manager.authorization_header().await, None);

        let login: LoginTokens =
            serde_json::from_str(r#"{"access": "a1", "refresh": "r1"}"#).unwrap();
        f.manager.store_login(&login).await;

        assert_eq!(
            f.manager.authorization_header().await,
            Some("Bearer a1".to_string())
        );
        let pair = f.manager.get_credentials().await;
        assert_eq!(pair.access_token(), Some("a1"));
        assert_eq!(pair.refresh_token(), Some("r1"));
    }
}
