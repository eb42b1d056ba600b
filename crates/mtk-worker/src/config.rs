//! Worker configuration.

use std::path::PathBuf;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for job scratch directories
    pub work_dir: PathBuf,
    /// FFmpeg binary name or path
    pub ffmpeg_path: String,
    /// Bucket used when a request names none
    pub default_bucket: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp"),
            ffmpeg_path: "ffmpeg".to_string(),
            default_bucket: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/tmp")),
            ffmpeg_path: std::env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            default_bucket: std::env::var("S3_BUCKET_NAME").ok().filter(|b| !b.is_empty()),
        }
    }
}
