//! Object Storage Adapter
//!
//! Stores rendered invoices in an S3-compatible bucket behind a small trait
//! so tests can keep documents in memory.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::utils::{AppError, AppResult};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store an object and return its public download URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String>;
}

/// HTTP bucket client: `PUT <endpoint>/<bucket>/<key>`, download URLs served
/// from the configured public base.
#[derive(Clone)]
pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    access_token: String,
    public_url: String,
}

impl HttpObjectStorage {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_token: impl Into<String>,
        public_url: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_token: access_token.into(),
            public_url: public_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> AppResult<String> {
        let url = format!("{}/{}/{}", self.endpoint, self.bucket, key);
        debug!(target: "storage", %key, size = bytes.len(), "Uploading object");
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.access_token)
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Storage unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "Storage returned {} for {}",
                response.status(),
                key
            )));
        }
        Ok(format!("{}/{}/{}", self.public_url, self.bucket, key))
    }
}
