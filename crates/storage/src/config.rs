use std::path::PathBuf;
use std::time::Duration;

use rftm_core::env::{parse_bool, parse_var, var_or, ConfigError};

/// Which [`ArtifactStore`](crate::ArtifactStore) backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            other => Err(format!("unknown storage backend '{other}', expected s3 or local")),
        }
    }
}

/// Connection settings for an S3-compatible bucket.
#[derive(Clone)]
pub struct S3Config {
    /// Host and port, with or without scheme (`localhost:9000`).
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Use `https` when `endpoint` carries no scheme.
    pub secure: bool,
}

impl S3Config {
    /// The endpoint as a full URL.
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://") {
            self.endpoint.clone()
        } else if self.secure {
            format!("https://{}", self.endpoint)
        } else {
            format!("http://{}", self.endpoint)
        }
    }
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Object storage configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3: S3Config,
    /// Root directory of the local backend.
    pub local_path: PathBuf,
    /// Lifetime of minted log URLs.
    pub log_url_ttl: Duration,
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default              |
    /// |----------------------|----------------------|
    /// | `STORAGE_BACKEND`    | `s3`                 |
    /// | `MINIO_ENDPOINT`     | `localhost:9000`     |
    /// | `MINIO_ACCESS_KEY`   | `minioadmin`         |
    /// | `MINIO_SECRET_KEY`   | `minioadmin`         |
    /// | `MINIO_BUCKET`       | `robot-logs`         |
    /// | `MINIO_REGION`       | `us-east-1`          |
    /// | `MINIO_SECURE`       | `false`              |
    /// | `LOCAL_STORAGE_PATH` | `./data/artifacts`   |
    /// | `LOG_URL_TTL_SECS`   | `3600`               |
    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = parse_var("STORAGE_BACKEND", StorageBackend::S3)?;
        let s3 = S3Config {
            endpoint: var_or("MINIO_ENDPOINT", "localhost:9000"),
            access_key: var_or("MINIO_ACCESS_KEY", "minioadmin"),
            secret_key: var_or("MINIO_SECRET_KEY", "minioadmin"),
            bucket: var_or("MINIO_BUCKET", "robot-logs"),
            region: var_or("MINIO_REGION", "us-east-1"),
            secure: parse_bool(&var_or("MINIO_SECURE", "false")),
        };
        let local_path = PathBuf::from(var_or("LOCAL_STORAGE_PATH", "./data/artifacts"));
        let log_url_ttl = Duration::from_secs(parse_var("LOG_URL_TTL_SECS", 3600u64)?);

        Ok(Self {
            backend,
            s3,
            local_path,
            log_url_ttl,
        })
    }

    /// Local backend rooted at `path`, used by tests and development.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Local,
            s3: S3Config {
                endpoint: "localhost:9000".into(),
                access_key: String::new(),
                secret_key: String::new(),
                bucket: "robot-logs".into(),
                region: "us-east-1".into(),
                secure: false,
            },
            local_path: path.into(),
            log_url_ttl: Duration::from_secs(3600),
        }
    }
}
