//! Credential store adapters
//!
//! Two underlying mechanisms sit behind the same [`CredentialStore`] trait:
//! 1. Cookie jar (records with path, expiry, SameSite and Secure attributes)
//! 2. Local store (plain key-value map; ephemeral in memory or durable on disk)
//!
//! Both degrade to "absent" when their backing storage is unavailable.

mod backing;
mod cookie_jar;
mod events;
mod local_store;
mod record;
mod traits;

pub use cookie_jar::CookieJar;
pub use events::{EventBus, StorageChange, StorageEvent};
pub use local_store::LocalStore;
pub use record::{SameSite, StorageRecord, StoreOptions, MAX_COOKIE_AGE_SECS};
pub use traits::CredentialStore;
