//! S3-compatible object storage client.

use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::adapters::{ObjectStorage, UploadedObject};
use crate::error::{StorageError, StorageResult};

const DEFAULT_REGION: &str = "us-east-1";

/// Configuration for the S3 client.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible providers
    pub endpoint_url: Option<String>,
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: String,
    /// Region
    pub region: String,
}

impl S3Config {
    /// Create config from environment variables.
    ///
    /// Returns `None` when credentials are absent so the service can start
    /// without object storage.
    pub fn from_env() -> Option<Self> {
        let access_key_id = std::env::var("S3_ACCESS_KEY").ok().filter(|v| !v.is_empty())?;
        let secret_access_key = std::env::var("S3_SECRET_KEY").ok().filter(|v| !v.is_empty())?;
        Some(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|v| !v.is_empty()),
            access_key_id,
            secret_access_key,
            region: std::env::var("S3_REGION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
        })
    }
}

/// S3-compatible storage client. Buckets are chosen per call.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    endpoint_url: Option<String>,
    region: String,
}

impl S3Client {
    /// Create a new client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "mtk-s3",
        );

        let mut builder = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials);

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            endpoint_url: config.endpoint_url,
            region: config.region,
        })
    }

    /// Create from environment variables, `None` if not configured.
    pub async fn from_env() -> StorageResult<Option<Self>> {
        match S3Config::from_env() {
            Some(config) => Ok(Some(Self::new(config).await?)),
            None => Ok(None),
        }
    }

    /// Best-effort URL for an object.
    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        object_url(self.endpoint_url.as_deref(), &self.region, bucket, key)
    }
}

/// Build the URL of `bucket/key`.
///
/// Custom endpoints that already embed the bucket (virtual-hosted style)
/// get the key appended directly; other endpoints use path style.
pub fn object_url(endpoint_url: Option<&str>, region: &str, bucket: &str, key: &str) -> String {
    match endpoint_url {
        Some(endpoint) => {
            let endpoint = endpoint.trim_end_matches('/');
            if endpoint.contains(&format!("{}.s3", bucket)) {
                format!("{}/{}", endpoint, key)
            } else {
                format!("{}/{}/{}", endpoint, bucket, key)
            }
        }
        None => format!("https://{}.s3.{}.amazonaws.com/{}", bucket, region, key),
    }
}

fn classify_sdk_error<E>(err: &SdkError<E>, context: String) -> StorageError
where
    E: std::error::Error + 'static,
{
    let message = format!("{}: {}", context, DisplayErrorContext(err));
    match err.raw_response().map(|r| r.status().as_u16()) {
        Some(404) => StorageError::not_found(context),
        Some(403) => StorageError::permission_denied(message),
        Some(status) => StorageError::from_status(status, message),
        None if message.contains("NoSuchKey") => StorageError::not_found(context),
        None => StorageError::connection(message),
    }
}

#[async_trait]
impl ObjectStorage for S3Client {
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()> {
        debug!("Downloading s3://{}/{} to {}", bucket, key, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, format!("s3://{}/{}", bucket, key)))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut body = response.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let copied = async {
            while let Some(chunk) = body
                .try_next()
                .await
                .map_err(|e| StorageError::connection(format!("Failed to read s3://{}/{}: {}", bucket, key, e)))?
            {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, StorageError>(())
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                warn!("Failed to remove partial download {}: {}", dest.display(), cleanup);
            }
            return Err(e);
        }

        info!("Downloaded s3://{}/{} to {}", bucket, key, dest.display());
        Ok(())
    }

    async fn upload(
        &self,
        src: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadedObject> {
        debug!("Uploading {} to s3://{}/{}", src.display(), bucket, key);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::invalid_request(format!("Cannot read {}: {}", src.display(), e)))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                StorageError::connection(format!(
                    "Upload to s3://{}/{} failed: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        info!("Uploaded {} to s3://{}/{}", src.display(), bucket, key);
        Ok(UploadedObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            url: self.object_url(bucket, key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_aws_default() {
        assert_eq!(
            object_url(None, "eu-west-1", "media", "youtube/j1/out.mp4"),
            "https://media.s3.eu-west-1.amazonaws.com/youtube/j1/out.mp4"
        );
    }

    #[test]
    fn test_object_url_path_style_endpoint() {
        assert_eq!(
            object_url(Some("https://nyc3.digitaloceanspaces.com/"), "us-east-1", "media", "a/b.mp4"),
            "https://nyc3.digitaloceanspaces.com/media/a/b.mp4"
        );
    }

    #[test]
    fn test_object_url_virtual_hosted_endpoint() {
        assert_eq!(
            object_url(Some("https://media.s3.example.com"), "us-east-1", "media", "a/b.mp4"),
            "https://media.s3.example.com/a/b.mp4"
        );
    }
}
