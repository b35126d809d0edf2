//! S3 / MinIO backend.
//!
//! The client is built on first use so the service can start while the
//! object store is down. Building it also creates the bucket if missing; a
//! failed build is retried by the next call.

use std::time::Duration;

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::sync::OnceCell;

use crate::{
    expiry, validate_key, ArtifactStore, PresignedUrl, S3Config, StorageError, StorageResult,
    StoredArtifact,
};

/// Longest lifetime S3 accepts for a presigned URL.
const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

fn unavailable<E: std::error::Error>(err: E) -> StorageError {
    StorageError::Unavailable(DisplayErrorContext(err).to_string())
}

pub struct S3ArtifactStore {
    config: S3Config,
    client: OnceCell<Client>,
}

impl S3ArtifactStore {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn client(&self) -> StorageResult<&Client> {
        self.client
            .get_or_try_init(|| async {
                let client = self.build_client().await;
                self.ensure_bucket(&client).await?;
                tracing::info!(
                    endpoint = %self.config.endpoint_url(),
                    bucket = %self.config.bucket,
                    "Object storage client ready",
                );
                Ok(client)
            })
            .await
    }

    async fn build_client(&self) -> Client {
        let credentials = Credentials::new(
            self.config.access_key.clone(),
            self.config.secret_key.clone(),
            None,
            None,
            "rftm-static",
        );
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(self.config.region.clone()))
            .endpoint_url(self.config.endpoint_url())
            .credentials_provider(credentials)
            .load()
            .await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();
        Client::from_conf(s3_config)
    }

    async fn ensure_bucket(&self, client: &Client) -> StorageResult<()> {
        let bucket = &self.config.bucket;
        if client.head_bucket().bucket(bucket).send().await.is_ok() {
            return Ok(());
        }

        match client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                tracing::info!(bucket = %bucket, "Created object storage bucket");
                Ok(())
            }
            Err(err) => {
                let exists = err.as_service_error().is_some_and(|e| {
                    e.is_bucket_already_owned_by_you() || e.is_bucket_already_exists()
                });
                if exists {
                    Ok(())
                } else {
                    Err(unavailable(err))
                }
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StoredArtifact> {
        validate_key(key)?;
        let client = self.client().await?;
        let size_bytes = bytes.len() as i64;

        client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size_bytes)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(unavailable)?;

        tracing::debug!(key = %key, size_bytes, "Uploaded artifact");
        Ok(StoredArtifact {
            key: key.to_string(),
            size_bytes,
        })
    }

    async fn get_url(&self, key: &str, ttl: Duration) -> StorageResult<PresignedUrl> {
        validate_key(key)?;
        let client = self.client().await?;
        let ttl = ttl.min(MAX_PRESIGN_TTL);
        let presigning = PresigningConfig::expires_in(ttl).map_err(unavailable)?;

        let request = client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(unavailable)?;

        Ok(PresignedUrl {
            url: request.uri().to_string(),
            expires_at: expiry(ttl),
        })
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.client()
            .await?
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.client()
            .await?
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
