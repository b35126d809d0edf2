//! Key-addressable blob storage for execution logs.
//!
//! [`ArtifactStore`] is implemented by [`S3ArtifactStore`] (MinIO or any
//! S3-compatible service) and [`LocalArtifactStore`] (a directory on disk).
//! Keys are relative, `/`-separated paths such as `runs/42/output.log`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rftm_core::error::CoreError;
use rftm_core::types::{DbId, Timestamp};
use serde::Serialize;

pub mod config;
pub mod local;
pub mod s3;

pub use config::{S3Config, StorageBackend, StorageConfig};
pub use local::LocalArtifactStore;
pub use s3::S3ArtifactStore;

/// Content type of runner logs.
pub const LOG_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Storage key of the console log for a run.
pub fn log_key(run_id: DbId) -> String {
    format!("runs/{run_id}/output.log")
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub key: String,
    pub size_bytes: i64,
}

/// A time-limited download URL.
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Artifact not found: {0}")]
    NotFound(String),

    /// The backend could not be reached or rejected the request.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => {
                CoreError::Validation(format!("Invalid storage key '{key}'"))
            }
            StorageError::NotFound(key) => {
                CoreError::Internal(format!("Artifact referenced but missing: {key}"))
            }
            StorageError::Unavailable(msg) => {
                CoreError::DependencyUnavailable(format!("Object storage unavailable: {msg}"))
            }
            StorageError::Io(e) => {
                CoreError::DependencyUnavailable(format!("Object storage unavailable: {e}"))
            }
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Blob storage for run artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> StorageResult<StoredArtifact>;

    /// Mint a download URL for `key` valid for `ttl`.
    async fn get_url(&self, key: &str, ttl: Duration) -> StorageResult<PresignedUrl>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    async fn health_check(&self) -> StorageResult<()>;
}

/// Reject keys that are empty, absolute, or escape their prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

/// Build the backend selected by `config`.
///
/// Neither backend touches the network or disk here, so this never fails
/// because a dependency is down.
pub fn build_artifact_store(config: &StorageConfig) -> Arc<dyn ArtifactStore> {
    match config.backend {
        StorageBackend::S3 => Arc::new(S3ArtifactStore::new(config.s3.clone())),
        StorageBackend::Local => Arc::new(LocalArtifactStore::new(config.local_path.clone())),
    }
}

pub(crate) fn expiry(ttl: Duration) -> Timestamp {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
    chrono::Utc::now()
        .checked_add_signed(ttl)
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn log_key_layout() {
        assert_eq!(log_key(42), "runs/42/output.log");
        assert!(validate_key(&log_key(42)).is_ok());
    }

    #[test]
    fn rejects_escaping_keys() {
        for key in ["", "/abs", "a/../b", "a//b", "./a", "a\\b", "trailing/"] {
            assert_matches!(validate_key(key), Err(StorageError::InvalidKey(_)), "{key}");
        }
    }

    #[test]
    fn errors_map_to_core() {
        assert_matches!(
            CoreError::from(StorageError::Unavailable("down".into())),
            CoreError::DependencyUnavailable(_)
        );
        assert_matches!(
            CoreError::from(StorageError::InvalidKey("/x".into())),
            CoreError::Validation(_)
        );
    }
}
