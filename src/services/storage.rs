use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::Url;
use thiserror::Error;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    InvalidPath(String),

    #[error("Object storage not configured")]
    NotConfigured,

    #[error("Storage rejected upload ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Storage request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError>;

    fn public_url(&self, path: &str) -> Result<String, StorageError>;
}

/// Bucket-based object storage over HTTP
pub struct HttpObjectStorage {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl HttpObjectStorage {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            bucket: config.bucket.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// `<base>/object/[area/]<bucket>/<path>` with every path segment percent-encoded
    fn object_url(&self, area: Option<&str>, path: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StorageError::Transport(format!("invalid storage base URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StorageError::Transport("storage base URL cannot carry a path".to_string()))?;
            segments.pop_if_empty().push("object");
            if let Some(area) = area {
                segments.push(area);
            }
            segments.push(&self.bucket).extend(path.split('/'));
        }
        Ok(url)
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        if self.api_key.is_empty() {
            return Err(StorageError::NotConfigured);
        }

        let response = self
            .http
            .post(self.object_url(None, path)?)
            .bearer_auth(&self.api_key)
            .header("apikey", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status: status.as_u16(), message });
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(self.object_url(Some("public"), path)?.to_string())
    }
}

/// Normalize a caller-supplied object path: relative, no `..`, no empty segments.
/// `%`, `?` and `#` are refused so the stored key is exactly the reported path.
pub fn validate_object_path(path: &str) -> Result<String, StorageError> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Err(StorageError::InvalidPath("path is required".to_string()));
    }
    if trimmed.starts_with('/') || trimmed.contains('\\') {
        return Err(StorageError::InvalidPath("path must be relative".to_string()));
    }

    let segments: Vec<&str> = trimmed.split('/').collect();
    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return Err(StorageError::InvalidPath("path contains an invalid segment".to_string()));
    }
    if segments.iter().any(|s| s.chars().any(char::is_control)) {
        return Err(StorageError::InvalidPath("path contains control characters".to_string()));
    }
    if trimmed.contains(['%', '?', '#']) {
        return Err(StorageError::InvalidPath("path contains reserved URL characters".to_string()));
    }

    Ok(segments.join("/"))
}
