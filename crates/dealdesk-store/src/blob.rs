//! Blob storage port for uploaded documents.
//!
//! The real blob service is an external collaborator; the core only needs
//! to push a file to a destination path and mint time-limited download
//! URLs. The local-filesystem backend covers self-hosted deployments and
//! the in-memory backend backs tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Blob storage operation errors.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage abstraction for uploaded files.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store `data` at `path`, overwriting any previous object.
    async fn upload(&self, path: &str, content_type: &str, data: Bytes) -> Result<(), BlobError>;

    /// Mint a time-limited download URL for a stored object.
    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, BlobError>;

    /// Whether an object exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, BlobError>;
}

/// Local filesystem blob storage.
#[derive(Clone)]
pub struct LocalBlobStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalBlobStorage {
    /// Create the backend, making the base directory when absent.
    ///
    /// # Arguments
    /// * `base_path` - Root directory for stored files
    /// * `base_url` - Base URL the files are served from
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> Result<Self, BlobError> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await.map_err(|e| {
            BlobError::UploadFailed(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;
        Ok(LocalBlobStorage {
            base_path,
            base_url,
        })
    }

    /// Storage paths must stay inside the base directory.
    fn path_to_file(&self, path: &str) -> Result<PathBuf, BlobError> {
        if path.is_empty() || path.contains("..") || path.starts_with('/') {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.base_path.join(path))
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, path: &str, _content_type: &str, data: Bytes) -> Result<(), BlobError> {
        let file_path = self.path_to_file(path)?;
        let size = data.len();

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&file_path).await.map_err(|e| {
            BlobError::UploadFailed(format!(
                "Failed to create file {}: {}",
                file_path.display(),
                e
            ))
        })?;
        file.write_all(&data).await.map_err(|e| {
            BlobError::UploadFailed(format!(
                "Failed to write file {}: {}",
                file_path.display(),
                e
            ))
        })?;
        file.sync_all().await.map_err(|e| {
            BlobError::UploadFailed(format!("Failed to sync file {}: {}", file_path.display(), e))
        })?;

        tracing::info!(path = %path, size_bytes = size, "Blob upload successful");
        Ok(())
    }

    async fn signed_url(&self, path: &str, _expires_in: Duration) -> Result<String, BlobError> {
        let file_path = self.path_to_file(path)?;
        if !fs::try_exists(&file_path).await.unwrap_or(false) {
            return Err(BlobError::NotFound(path.to_string()));
        }
        // Local disk cannot sign; the public URL is the best available.
        Ok(self.public_url(path))
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        let file_path = self.path_to_file(path)?;
        Ok(fs::try_exists(&file_path).await.unwrap_or(false))
    }
}

/// In-memory blob storage for tests.
#[derive(Default)]
pub struct MemoryBlobStorage {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryBlobStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn upload(&self, path: &str, _content_type: &str, data: Bytes) -> Result<(), BlobError> {
        if path.is_empty() || path.contains("..") {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        self.objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.to_string(), data);
        Ok(())
    }

    async fn signed_url(&self, path: &str, expires_in: Duration) -> Result<String, BlobError> {
        let objects = self
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !objects.contains_key(path) {
            return Err(BlobError::NotFound(path.to_string()));
        }
        Ok(format!(
            "memory://{}?expires={}",
            path,
            expires_in.as_secs()
        ))
    }

    async fn exists(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn local_upload_then_signed_url() {
        let dir = tempdir().unwrap();
        let storage =
            LocalBlobStorage::new(dir.path(), "http://localhost:3000/documents".to_string())
                .await
                .unwrap();

        storage
            .upload(
                "app-1/documents/deck.pdf",
                "application/pdf",
                Bytes::from_static(b"%PDF-1.7"),
            )
            .await
            .unwrap();

        assert!(storage.exists("app-1/documents/deck.pdf").await.unwrap());
        let url = storage
            .signed_url("app-1/documents/deck.pdf", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/documents/app-1/documents/deck.pdf");
    }

    #[tokio::test]
    async fn local_rejects_traversal_paths() {
        let dir = tempdir().unwrap();
        let storage =
            LocalBlobStorage::new(dir.path(), "http://localhost:3000/documents".to_string())
                .await
                .unwrap();

        let result = storage
            .upload("../../etc/passwd", "text/plain", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(result, Err(BlobError::InvalidPath(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(BlobError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn signed_url_for_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let storage =
            LocalBlobStorage::new(dir.path(), "http://localhost:3000/documents".to_string())
                .await
                .unwrap();

        let result = storage
            .signed_url("missing.pdf", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn memory_storage_round_trips() {
        let storage = MemoryBlobStorage::new();
        storage
            .upload("a/b.pdf", "application/pdf", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert!(storage.exists("a/b.pdf").await.unwrap());
        assert_eq!(storage.object_count(), 1);
        let url = storage
            .signed_url("a/b.pdf", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(url.contains("a/b.pdf"));
    }
}
