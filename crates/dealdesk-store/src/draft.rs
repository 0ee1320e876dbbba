//! Draft storage port
//!
//! Anonymous-mode section drafts live in a flat key-value store on the
//! user's device, one namespaced key per section. The store is injected as
//! a trait so the wizard and the section adapter never touch a concrete
//! device API, and tests can substitute the in-memory implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

/// Draft storage errors.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Invalid draft key: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Flat key-value storage for serialized draft blobs.
#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Read a stored value, `None` when the key has never been written.
    async fn get(&self, key: &str) -> Result<Option<String>, DraftError>;

    /// Write (or overwrite) a value.
    async fn put(&self, key: &str, value: &str) -> Result<(), DraftError>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), DraftError>;
}

/// File-backed draft store: one file per key under a base directory.
#[derive(Clone)]
pub struct FileDraftStore {
    base_path: PathBuf,
}

impl FileDraftStore {
    /// Create the store, making the base directory when absent.
    pub async fn new(base_path: impl Into<PathBuf>) -> Result<Self, DraftError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            DraftError::WriteFailed(format!(
                "Failed to create draft directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(FileDraftStore { base_path })
    }

    /// Keys become file names directly, so path separators and traversal
    /// sequences are rejected up front.
    fn key_to_path(&self, key: &str) -> Result<PathBuf, DraftError> {
        if key.is_empty()
            || key.contains("..")
            || key.contains('/')
            || key.contains('\\')
        {
            return Err(DraftError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{key}.json")))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[async_trait]
impl DraftStore for FileDraftStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        let path = self.key_to_path(key)?;
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path).await.map_err(|e| {
            DraftError::ReadFailed(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Some(contents))
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), DraftError> {
        let path = self.key_to_path(key)?;
        fs::write(&path, value).await.map_err(|e| {
            DraftError::WriteFailed(format!("Failed to write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DraftError> {
        let path = self.key_to_path(key)?;
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path).await?;
        }
        Ok(())
    }
}

/// In-memory draft store for tests and embedded use. Counts completed
/// writes so debounce-collapse behavior can be asserted.
#[derive(Default)]
pub struct MemoryDraftStore {
    entries: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls that have reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::ReadFailed("lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), DraftError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::WriteFailed("lock poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), DraftError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DraftError::WriteFailed("lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn file_store_round_trips_values() {
        let dir = tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();

        assert_eq!(store.get("dealdesk_intake_company").await.unwrap(), None);
        store
            .put("dealdesk_intake_company", r#"{"legal_name":"Acme"}"#)
            .await
            .unwrap();
        assert_eq!(
            store.get("dealdesk_intake_company").await.unwrap().as_deref(),
            Some(r#"{"legal_name":"Acme"}"#)
        );

        store.remove("dealdesk_intake_company").await.unwrap();
        assert_eq!(store.get("dealdesk_intake_company").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_rejects_traversal_keys() {
        let dir = tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();

        for key in ["../escape", "a/b", "a\\b", ""] {
            assert!(matches!(
                store.get(key).await,
                Err(DraftError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn file_store_remove_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = FileDraftStore::new(dir.path()).await.unwrap();
        assert!(store.remove("never_written").await.is_ok());
    }

    #[tokio::test]
    async fn memory_store_counts_writes() {
        let store = MemoryDraftStore::new();
        store.put("k", "1").await.unwrap();
        store.put("k", "2").await.unwrap();
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("2"));
    }
}
