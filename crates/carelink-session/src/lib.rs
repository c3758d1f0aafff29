//! # carelink-session
//!
//! Credential handling for CareLink sessions:
//! - Cookie jar and local store adapters behind one storage trait
//! - Access/refresh token manager with fixed cookie-over-local precedence
//! - Migration coordinator for the local-store to cookie transition
//! - Settings and an explicit session bootstrap

pub mod credential;
pub mod error;
pub mod migration;
pub mod session;
pub mod settings;
pub mod storage;

pub use credential::{
    AuthMethod, CredentialPair, CredentialStores, LoginTokens, SessionCredentialManager,
    StorageStrategy, TokenInfo, TokenKeys,
};
pub use error::{Result, SessionError};
pub use migration::{MigrationCoordinator, MigrationInfo};
pub use session::AuthSession;
pub use settings::{
    default_storage_dir, BackendSettings, CookieSettings, Settings, SettingsManager,
};
pub use storage::{
    CookieJar, CredentialStore, EventBus, LocalStore, SameSite, StorageChange, StorageEvent,
    StorageRecord, StoreOptions, MAX_COOKIE_AGE_SECS,
};
