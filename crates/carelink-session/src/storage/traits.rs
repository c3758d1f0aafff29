//! Storage trait definitions

use async_trait::async_trait;

use super::StoreOptions;

/// Uniform get/set/remove over a single storage mechanism.
///
/// None of these operations fail from the caller's point of view. An
/// unavailable or broken backend reads as empty and ignores writes, so callers
/// treat "no credential" and "storage unavailable" the same way.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Store `value` under `name`, replacing any previous value
    async fn set(&self, name: &str, value: &str, options: &StoreOptions);

    /// Read the value stored under `name`
    ///
    /// Reads never modify the store.
    async fn get(&self, name: &str) -> Option<String>;

    /// Remove `name`; removing an absent key is a no-op
    async fn remove(&self, name: &str);

    /// Check if a live value exists under `name`
    async fn exists(&self, name: &str) -> bool {
        self.get(name).await.is_some()
    }

    /// Whether the backing storage accepts reads and writes at all
    fn is_available(&self) -> bool;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
