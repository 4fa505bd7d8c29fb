//! Persistent key-value storage for client state.
//!
//! The platform storage the app runs on is abstracted behind
//! [`KeyValueStore`]; the library ships a JSON-file implementation for
//! desktop-style hosts and an in-memory implementation with operation
//! counters for tests.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StorageError;

/// Durable key-value storage contract.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value durably. The caller sees the failure; nothing is
    /// retried here.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a key. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

// ============================================================================
// FILE-BACKED STORE
// ============================================================================

/// File-backed store holding all entries in a single JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles against the backing file.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn load(&self, key: &str) -> Result<HashMap<String, String>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|err| StorageError::ReadFailed {
                    key: key.to_string(),
                    reason: err.to_string(),
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(StorageError::ReadFailed {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn persist(
        &self,
        key: &str,
        entries: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let write_failed = |reason: String| StorageError::WriteFailed {
            key: key.to_string(),
            reason,
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| write_failed(err.to_string()))?;
        }
        let contents =
            serde_json::to_string_pretty(entries).map_err(|err| write_failed(err.to_string()))?;
        tokio::fs::write(&self.path, contents)
            .await
            .map_err(|err| write_failed(err.to_string()))
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.load(key).await?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(key).await.map_err(|err| match err {
            StorageError::ReadFailed { key, reason } => StorageError::WriteFailed { key, reason },
            other => other,
        })?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(key, &entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(key).await.map_err(|err| match err {
            StorageError::ReadFailed { key, reason } => StorageError::RemoveFailed { key, reason },
            other => other,
        })?;
        if entries.remove(key).is_some() {
            self.persist(key, &entries).await.map_err(|err| match err {
                StorageError::WriteFailed { key, reason } => {
                    StorageError::RemoveFailed { key, reason }
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory store with operation counters.
///
/// The counters make it usable as a spy: tests assert how many storage
/// reads an operation actually performed.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    removes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry without counting it as a write.
    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .write()
            .expect("memory store lock")
            .insert(key.to_string(), value.to_string());
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn removes(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .entries
            .read()
            .expect("memory store lock")
            .get(key)
            .cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .expect("memory store lock")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .write()
            .expect("memory store lock")
            .remove(key);
        Ok(())
    }
}
