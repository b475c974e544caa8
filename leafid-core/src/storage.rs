//! Object storage for uploaded photos.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;
use zeroize::Zeroizing;

use crate::error::{LeafError, Result};

/// Folder all plant photos are stored under.
pub const OBJECT_PREFIX: &str = "plants";

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` at `path` and return its public URL.
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String>;
}

/// Build the storage key for a photo: `plants/<unix-epoch-ms>-<file name>`.
///
/// The millisecond prefix makes collisions unlikely, not impossible.
pub fn object_path(file_name: &str, at: DateTime<Utc>) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    let name = if name.trim().is_empty() {
        "image".to_string()
    } else {
        name
    };
    format!("{OBJECT_PREFIX}/{}-{name}", at.timestamp_millis())
}

#[derive(Clone)]
pub struct StorageConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub bucket: String,
    /// Wiped on drop
    pub api_key: Zeroizing<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("url", &self.url)
            .field("bucket", &self.bucket)
            .field("api_key", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Storage-API client for a hosted bucket with public read access.
pub struct HttpObjectStorage {
    client: Client,
    base_url: Url,
    bucket: String,
    api_key: Zeroizing<String>,
}

impl HttpObjectStorage {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| LeafError::Config(format!("Invalid STORAGE_URL '{}': {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(LeafError::Config(format!(
                "STORAGE_URL '{}' is not a base URL",
                config.url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LeafError::Config(format!("Failed to create storage client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            bucket: config.bucket,
            api_key: config.api_key,
        })
    }

    fn object_url(&self, public: bool, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["storage", "v1", "object"]);
            if public {
                segments.push("public");
            }
            segments.push(&self.bucket).extend(path.split('/'));
        }
        url
    }

    pub fn public_url(&self, path: &str) -> String {
        self.object_url(true, path).to_string()
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    #[instrument(level = "debug", skip(self, data), fields(bytes = data.len()))]
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String> {
        let response = self
            .client
            .post(self.object_url(false, path))
            .header("apikey", self.api_key.as_str())
            .bearer_auth(self.api_key.as_str())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| LeafError::Storage(format!("Upload request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Upload rejected");
            return Err(LeafError::Storage(format!("Upload returned status: {status}")));
        }

        let url = self.public_url(path);
        debug!(url = %url, "Upload complete");
        Ok(url)
    }
}

impl std::fmt::Debug for HttpObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStorage")
            .field("base_url", &self.base_url.as_str())
            .field("bucket", &self.bucket)
            .finish()
    }
}
