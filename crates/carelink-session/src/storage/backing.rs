//! Backing maps shared by the cookie jar and the local store
//!
//! A file-backed map is re-read on every access. Nothing is cached between
//! calls, so a value written by another process is visible on the next read.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Result, SessionError};

const FILE_VERSION: u32 = 1;

/// On-disk format
#[derive(Debug, Deserialize)]
struct StoreFile<V> {
    #[allow(dead_code)]
    version: u32,
    entries: HashMap<String, V>,
}

#[derive(Serialize)]
struct StoreFileRef<'a, V> {
    version: u32,
    entries: &'a HashMap<String, V>,
}

pub(crate) enum Backing<V> {
    /// Lives as long as the process
    Memory(RwLock<HashMap<String, V>>),
    /// JSON file; the lock only orders access within this process
    File { path: PathBuf, lock: RwLock<()> },
    /// Blocked by policy or unusable; every access fails
    Disabled(String),
}

impl<V> Backing<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync,
{
    pub fn memory() -> Self {
        Self::Memory(RwLock::new(HashMap::new()))
    }

    pub fn file(path: PathBuf) -> Self {
        Self::File {
            path,
            lock: RwLock::new(()),
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::Disabled(reason.into())
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, Self::Disabled(_))
    }

    /// Run `f` against a consistent view of the entries
    pub async fn read<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&HashMap<String, V>) -> R + Send,
        R: Send,
    {
        match self {
            Self::Memory(map) => {
                let map = map.read().await;
                Ok(f(&map))
            }
            Self::File { path, lock } => {
                let _guard = lock.read().await;
                let entries = load_entries(path).await?;
                Ok(f(&entries))
            }
            Self::Disabled(reason) => Err(SessionError::StorageUnavailable(reason.clone())),
        }
    }

    /// Run `f` against the entries and persist whatever it changed
    pub async fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut HashMap<String, V>) -> R + Send,
        R: Send,
    {
        match self {
            Self::Memory(map) => {
                let mut map = map.write().await;
                Ok(f(&mut map))
            }
            Self::File { path, lock } => {
                let _guard = lock.write().await;
                let mut entries = load_entries(path).await?;
                let result = f(&mut entries);
                save_entries(path, &entries).await?;
                Ok(result)
            }
            Self::Disabled(reason) => Err(SessionError::StorageUnavailable(reason.clone())),
        }
    }
}

async fn load_entries<V: DeserializeOwned>(path: &Path) -> Result<HashMap<String, V>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };

    let file: StoreFile<V> = serde_json::from_str(&contents)?;
    Ok(file.entries)
}

async fn save_entries<V: Serialize>(path: &Path, entries: &HashMap<String, V>) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let contents = serde_json::to_string_pretty(&StoreFileRef {
        version: FILE_VERSION,
        entries,
    })?;

    // Write atomically using a temp file
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, &contents).await?;
    tokio::fs::rename(&temp_path, path).await?;

    debug!("Saved {} entries to {:?}", entries.len(), path);
    Ok(())
}
