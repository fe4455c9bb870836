//! Synced key-value storage and the typed shortcut cache on top of it.
//!
//! Storage holds arbitrary JSON values keyed by string. [`ShortcutCache`] maps
//! [`DomainKey`]s to [`ShortcutsDocument`]s and swallows storage failures: a
//! failed read is "nothing cached", a failed write is logged and forgotten.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config;
use crate::domain::DomainKey;
use crate::shortcuts::ShortcutsDocument;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("storage write failed: {0}")]
    Write(String),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Key-value storage synced by the host.
#[async_trait]
pub trait SyncStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// In-memory storage
// ---------------------------------------------------------------------------

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Value>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SyncStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File storage
// ---------------------------------------------------------------------------

/// Storage backed by a single JSON object file.
///
/// Writes rewrite the whole file atomically. Writers in this process are
/// serialised; writers in other processes are not coordinated. File I/O runs
/// on the blocking pool.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_map(path: &Path) -> Result<Map<String, Value>, StorageError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e.into()),
    };
    if content.trim().is_empty() {
        return Ok(Map::new());
    }
    Ok(serde_json::from_str(&content)?)
}

fn write_entry(path: &Path, key: String, value: Value) -> Result<(), StorageError> {
    let mut items = match read_map(path) {
        Ok(items) => items,
        Err(StorageError::Corrupt(e)) => {
            tracing::warn!("Resetting corrupt storage {}: {e}", path.display());
            Map::new()
        }
        Err(e) => return Err(e),
    };
    items.insert(key, value);
    config::save_json_file(path, &items).map_err(StorageError::Write)
}

#[async_trait]
impl SyncStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = Arc::clone(&self.path);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || -> Result<Option<Value>, StorageError> {
            Ok(read_map(&path)?.remove(&key))
        })
        .await?
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let path = Arc::clone(&self.path);
        let write_lock = Arc::clone(&self.write_lock);
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let _guard = write_lock.lock();
            write_entry(&path, key, value)
        })
        .await?
    }
}

// ---------------------------------------------------------------------------
// Typed cache
// ---------------------------------------------------------------------------

/// Shortcut documents keyed by [`DomainKey`].
#[derive(Clone)]
pub struct ShortcutCache {
    storage: Arc<dyn SyncStorage>,
}

impl ShortcutCache {
    pub fn new(storage: Arc<dyn SyncStorage>) -> Self {
        Self { storage }
    }

    /// Cached document, or `None` when absent, unreadable or not a document.
    pub async fn get(&self, key: &DomainKey) -> Option<ShortcutsDocument> {
        let value = match self.storage.get(key.as_str()).await {
            Ok(Some(v)) => v,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, "cache read failed: {e}");
                return None;
            }
        };
        match serde_json::from_value(value) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::debug!(key = %key, "ignoring cached value that is not a document: {e}");
                None
            }
        }
    }

    /// Persist `doc` under `key`. Failures are logged only.
    pub async fn put(&self, key: &DomainKey, doc: &ShortcutsDocument) {
        let value = match serde_json::to_value(doc) {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(key = %key, "failed to serialise shortcuts: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.set(key.as_str(), value).await {
            tracing::warn!(key = %key, "cache write failed: {e}");
        }
    }
}

impl std::fmt::Debug for ShortcutCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortcutCache").finish_non_exhaustive()
    }
}
