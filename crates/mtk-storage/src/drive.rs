//! Google Drive REST client.
//!
//! Downloads stream `files/<id>?alt=media` to disk. Uploads use a resumable
//! session: the metadata request returns a session URL in `Location`, and
//! the file content is then PUT to that URL.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures_util::StreamExt;
use gcp_auth::CustomServiceAccount;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Body, Client};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::adapters::{DriveFile, DriveStorage};
use crate::error::{StorageError, StorageResult};
use crate::token_cache::{AccessTokenSource, TokenCache, DRIVE_SCOPE};

const DEFAULT_API_BASE: &str = "https://www.googleapis.com";
const UPLOAD_MIME_TYPE: &str = "video/mp4";

/// Configuration for the Drive client.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// API root, overridable for tests
    pub api_base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connection timeout
    pub connect_timeout: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(600),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DriveConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: std::env::var("DRIVE_API_BASE_URL").unwrap_or(defaults.api_base_url),
            timeout: std::env::var("DRIVE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            connect_timeout: defaults.connect_timeout,
        }
    }
}

/// Google Drive client authenticated as a service account.
#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl DriveClient {
    /// Create a new client with an explicit token source.
    pub fn new(config: DriveConfig, tokens: Arc<dyn AccessTokenSource>) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("mtk-storage/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::config_error(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    /// Create from `GCP_SA_CREDENTIALS` (base64 service account JSON).
    ///
    /// Returns `Ok(None)` when the variable is unset.
    pub fn from_env() -> StorageResult<Option<Self>> {
        let Some(encoded) = std::env::var("GCP_SA_CREDENTIALS").ok().filter(|v| !v.is_empty()) else {
            return Ok(None);
        };
        let tokens = service_account_tokens(&encoded)?;
        Self::new(DriveConfig::from_env(), tokens).map(Some)
    }

    fn media_url(&self, file_id: &str) -> String {
        format!(
            "{}/drive/v3/files/{}?alt=media&supportsAllDrives=true",
            self.base_url,
            urlencoding::encode(file_id)
        )
    }

    fn upload_session_url(&self) -> String {
        format!(
            "{}/upload/drive/v3/files?uploadType=resumable&supportsAllDrives=true&fields=id,name,webViewLink",
            self.base_url
        )
    }

    async fn stream_to_file(response: reqwest::Response, dest: &Path) -> StorageResult<()> {
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::connection(format!("Download interrupted: {}", e)))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Build a cached token source from base64-encoded service account JSON.
pub fn service_account_tokens(encoded: &str) -> StorageResult<Arc<dyn AccessTokenSource>> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| StorageError::config_error(format!("GCP_SA_CREDENTIALS is not valid base64: {}", e)))?;
    let json = String::from_utf8(decoded)
        .map_err(|e| StorageError::config_error(format!("GCP_SA_CREDENTIALS is not UTF-8: {}", e)))?;
    let account = CustomServiceAccount::from_json(&json)
        .map_err(|e| StorageError::config_error(format!("Failed to load service account: {}", e)))?;
    Ok(Arc::new(TokenCache::new(Arc::new(account), DRIVE_SCOPE)))
}

#[async_trait]
impl DriveStorage for DriveClient {
    async fn download(&self, file_id: &str, dest: &Path) -> StorageResult<()> {
        debug!("Downloading Drive file {} to {}", file_id, dest.display());

        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(self.media_url(file_id))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| StorageError::connection(format!("Drive request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::from_status(
                status.as_u16(),
                format!("Drive file {}: {}", file_id, body.trim()),
            ));
        }

        if let Err(e) = Self::stream_to_file(response, dest).await {
            if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial download {}: {}", dest.display(), cleanup);
                }
            }
            return Err(e);
        }

        info!("Downloaded Drive file {} to {}", file_id, dest.display());
        Ok(())
    }

    async fn upload(&self, src: &Path, folder_id: &str, name: &str) -> StorageResult<DriveFile> {
        debug!("Uploading {} to Drive folder {} as {}", src.display(), folder_id, name);

        let size = tokio::fs::metadata(src)
            .await
            .map_err(|e| StorageError::invalid_request(format!("Cannot read {}: {}", src.display(), e)))?
            .len();
        let token = self.tokens.access_token().await?;

        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id],
            "mimeType": UPLOAD_MIME_TYPE,
        });

        let session = self
            .http
            .post(self.upload_session_url())
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", UPLOAD_MIME_TYPE)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&metadata)
            .send()
            .await
            .map_err(|e| StorageError::connection(format!("Failed to upload file {}: {}", name, e)))?;

        let status = session.status();
        if !status.is_success() {
            let body = session.text().await.unwrap_or_default();
            return Err(StorageError::connection(format!(
                "Failed to upload file {}: HTTP {} {}",
                name,
                status.as_u16(),
                body.trim()
            )));
        }

        let location = session
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                StorageError::connection(format!("Failed to upload file {}: no upload session returned", name))
            })?;

        let file = tokio::fs::File::open(src).await?;
        let response = self
            .http
            .put(&location)
            .bearer_auth(&token)
            .header(CONTENT_TYPE, UPLOAD_MIME_TYPE)
            .header(CONTENT_LENGTH, size)
            .body(Body::from(file))
            .send()
            .await
            .map_err(|e| StorageError::connection(format!("Failed to upload file {}: {}", name, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::connection(format!(
                "Failed to upload file {}: HTTP {} {}",
                name,
                status.as_u16(),
                body.trim()
            )));
        }

        let uploaded: DriveFile = response
            .json()
            .await
            .map_err(|e| StorageError::connection(format!("Unexpected Drive response for {}: {}", name, e)))?;

        info!("Uploaded {} to Drive as {}", src.display(), uploaded.id);
        Ok(uploaded)
    }
}
