//! Filesystem backend for development and tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    expiry, validate_key, ArtifactStore, PresignedUrl, StorageError, StorageResult,
    StoredArtifact,
};

/// Stores each key as a file under `root`; URLs are `file://` paths.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, seg| path.join(seg)))
    }

    /// Read an artifact back.
    pub async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<StoredArtifact> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size_bytes = bytes.len() as i64;
        tokio::fs::write(&path, bytes).await?;
        Ok(StoredArtifact {
            key: key.to_string(),
            size_bytes,
        })
    }

    async fn get_url(&self, key: &str, ttl: Duration) -> StorageResult<PresignedUrl> {
        let path = self.path_for(key)?;
        let absolute = match tokio::fs::canonicalize(&path).await {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(PresignedUrl {
            url: format!("file://{}", absolute.display()),
            expires_at: expiry(ttl),
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        Ok(())
    }
}
