//! Capability traits for the two storage kinds.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Location of an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedObject {
    pub bucket: String,
    pub key: String,
    /// Best-effort public URL
    pub url: String,
}

/// File metadata returned by Drive after an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

/// S3-compatible object store.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Download `bucket/key` to `dest`.
    async fn download(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<()>;

    /// Upload a local file to `bucket/key`.
    async fn upload(
        &self,
        src: &Path,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StorageResult<UploadedObject>;
}

/// Document store addressed by opaque file ids.
#[async_trait]
pub trait DriveStorage: Send + Sync {
    /// Download the file content to `dest`. No partial file is left on error.
    async fn download(&self, file_id: &str, dest: &Path) -> StorageResult<()>;

    /// Upload a local file into `folder_id` under `name`.
    async fn upload(&self, src: &Path, folder_id: &str, name: &str) -> StorageResult<DriveFile>;
}

/// Storage clients constructed once at startup.
///
/// A missing client means its credentials were not configured; using it
/// fails with [`StorageError::NotConfigured`].
#[derive(Clone, Default)]
pub struct StorageAdapters {
    object: Option<Arc<dyn ObjectStorage>>,
    drive: Option<Arc<dyn DriveStorage>>,
}

impl StorageAdapters {
    pub fn new(object: Option<Arc<dyn ObjectStorage>>, drive: Option<Arc<dyn DriveStorage>>) -> Self {
        Self { object, drive }
    }

    pub fn with_object(mut self, object: Arc<dyn ObjectStorage>) -> Self {
        self.object = Some(object);
        self
    }

    pub fn with_drive(mut self, drive: Arc<dyn DriveStorage>) -> Self {
        self.drive = Some(drive);
        self
    }

    pub fn object(&self) -> StorageResult<&dyn ObjectStorage> {
        self.object.as_deref().ok_or(StorageError::NotConfigured("S3"))
    }

    pub fn drive(&self) -> StorageResult<&dyn DriveStorage> {
        self.drive.as_deref().ok_or(StorageError::NotConfigured("Google Drive"))
    }

    pub fn has_object(&self) -> bool {
        self.object.is_some()
    }

    pub fn has_drive(&self) -> bool {
        self.drive.is_some()
    }
}

impl std::fmt::Debug for StorageAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageAdapters")
            .field("object", &self.has_object())
            .field("drive", &self.has_drive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_adapters() {
        let adapters = StorageAdapters::default();
        assert!(matches!(adapters.object(), Err(StorageError::NotConfigured("S3"))));
        assert!(matches!(adapters.drive(), Err(StorageError::NotConfigured(_))));
    }

    #[test]
    fn test_drive_file_wire_names() {
        let file: DriveFile = serde_json::from_str(
            r#"{"id":"abc","name":"out.mp4","webViewLink":"https://drive.google.com/file/d/abc/view"}"#,
        )
        .unwrap();
        assert_eq!(file.id, "abc");
        assert_eq!(file.web_view_link.as_deref(), Some("https://drive.google.com/file/d/abc/view"));
    }
}
