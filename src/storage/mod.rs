//! Durable artifact storage
//!
//! Wraps Apache Arrow object_store so any conforming backend can hold the
//! downloaded artifacts. Writes are whole-object puts - a failed transfer
//! never leaves a partially written artifact behind.

use bytes::Bytes;
use object_store::{ObjectStore, local::LocalFileSystem, path::Path as StoragePath};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub size: usize,
}

/// Storage client wrapping object_store
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    base_url: String,
}

impl StorageClient {
    /// Wrap any object_store backend. `base_url` prefixes rendered
    /// artifact locations (e.g. "file:///var/artifacts").
    pub fn new(store: Arc<dyn ObjectStore>, base_url: impl Into<String>) -> Self {
        Self {
            store,
            base_url: base_url.into(),
        }
    }

    /// In-memory storage for tests and journal-less runs.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(object_store::memory::InMemory::new()),
            "mem://downpour",
        )
    }

    /// Local filesystem storage rooted at `root` (created if missing).
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let store = LocalFileSystem::new_with_prefix(root)?;
        Ok(Self::new(
            Arc::new(store),
            format!("file://{}", root.display()),
        ))
    }

    /// Rendered location for an artifact key, as reported to observers.
    pub fn location(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: Bytes) -> Result<UploadMetadata> {
        let path = StoragePath::from(key);
        let size = data.len();

        self.store
            .put(&path, data.into())
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::info!(key, size, "Uploaded artifact");

        Ok(UploadMetadata {
            key: key.to_string(),
            size,
        })
    }

    /// Download from storage
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let path = StoragePath::from(key);

        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let bytes = result.bytes().await?;

        Ok(bytes.to_vec())
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = StoragePath::from(key);

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_and_download_round_trip() {
        let storage = StorageClient::in_memory();
        let data = Bytes::from_static(b"%PDF-1.4 sample");

        let meta = storage.upload("artifacts/x/report.pdf", data.clone()).await.unwrap();
        assert_eq!(meta.size, data.len());

        let back = storage.download("artifacts/x/report.pdf").await.unwrap();
        assert_eq!(back, data.to_vec());
    }

    #[tokio::test]
    async fn test_exists() {
        let storage = StorageClient::in_memory();
        assert!(!storage.exists("artifacts/missing").await.unwrap());

        storage
            .upload("artifacts/present", Bytes::from_static(b"x"))
            .await
            .unwrap();
        assert!(storage.exists("artifacts/present").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let storage = StorageClient::in_memory();
        let err = storage.download("artifacts/missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_local_backend() {
        let temp_dir = TempDir::new().unwrap();
        let storage = StorageClient::local(temp_dir.path()).unwrap();

        storage
            .upload("artifacts/y/report.pdf", Bytes::from_static(b"data"))
            .await
            .unwrap();
        assert!(storage.exists("artifacts/y/report.pdf").await.unwrap());
        assert!(storage.location("artifacts/y/report.pdf").starts_with("file://"));
    }
}
