//! Bucket storage used for the raw, processed and photo datasets.

mod gcs;
mod local;

pub use gcs::GcsObjectStore;
pub use local::LocalObjectStore;

use crate::config::{ConfigError, HttpConfig, StorageBackend, StorageConfig};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("bucket name is empty")]
    EmptyBucketName,
    #[error("object gs://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("storage backend request failed: {0}")]
    Backend(String),
    #[error("storage backend returned {status} for {operation}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Plain bucket name, accepting either `bucket` or `gs://bucket/` on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let name = raw.trim().replace("gs://", "");
        let name = name.trim_matches('/');
        if name.is_empty() {
            return Err(StorageError::EmptyBucketName);
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a listing: object names plus the common prefixes produced by a
/// delimiter, both sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectListing {
    pub objects: Vec<String>,
    pub prefixes: Vec<String>,
}

impl ObjectListing {
    pub(crate) fn normalize(mut self) -> Self {
        self.objects.sort();
        self.objects.dedup();
        self.prefixes.sort();
        self.prefixes.dedup();
        self
    }
}

#[async_trait]
pub trait ObjectStore: Debug + Send + Sync {
    async fn put(
        &self,
        bucket: &BucketName,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    async fn get(&self, bucket: &BucketName, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn exists(&self, bucket: &BucketName, key: &str) -> Result<bool, StorageError>;

    async fn list(
        &self,
        bucket: &BucketName,
        prefix: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<ObjectListing, StorageError>;
}

/// Builds the configured backend. `project` is billed for GCS requests.
pub fn from_config(
    config: &StorageConfig,
    http: &HttpConfig,
    project: Option<&str>,
) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalObjectStore::new(&config.local_root))),
        StorageBackend::Gcs => {
            let token = config.access_token.clone().ok_or(ConfigError::Missing {
                setting: "a GCS access token",
                env_var: "GOOGLE_OAUTH_ACCESS_TOKEN",
            })?;
            let store = GcsObjectStore::new(
                &config.gcs_endpoint,
                token,
                project.map(str::to_string),
                http,
            )
            .map_err(|err| ConfigError::InvalidStorageEndpoint {
                value: config.gcs_endpoint.clone(),
                reason: err.to_string(),
            })?;
            Ok(Arc::new(store))
        }
    }
}
