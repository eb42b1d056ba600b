//! Video assembly: download the assets, render a slideshow, upload the result.

mod pipeline;
mod plan;

pub use pipeline::{AssemblyOutput, AssemblyPipeline};
pub use plan::{plan_downloads, synthesize_command, DownloadPlan, DownloadTask};

use mtk_media::MediaError;
use mtk_models::ValidationError;
use mtk_storage::StorageError;
use thiserror::Error;

/// Assembly failure, classified by what the caller should be told.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Connection(String),

    #[error("{0}")]
    Unsupported(String),

    #[error("{0}")]
    Processing(String),

    /// Broken invariant inside the pipeline itself
    #[error("{0}")]
    Internal(String),
}

impl AssemblyError {
    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Outcome code reported for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Connection(_) => 502,
            Self::Unsupported(_) => 501,
            Self::Processing(_) | Self::Internal(_) => 500,
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_))
    }
}

impl From<ValidationError> for AssemblyError {
    fn from(e: ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<StorageError> for AssemblyError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(_) => Self::NotFound(e.to_string()),
            StorageError::InvalidRequest(_) => Self::Validation(e.to_string()),
            StorageError::ConfigError(_)
            | StorageError::NotConfigured(_)
            | StorageError::PermissionDenied(_)
            | StorageError::Connection(_)
            | StorageError::Auth(_) => Self::Connection(e.to_string()),
            StorageError::Io(_) | StorageError::Json(_) => Self::Processing(e.to_string()),
        }
    }
}

impl From<MediaError> for AssemblyError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::FfmpegFailed { message, .. } => {
                Self::Processing(format!("{}. See logs for full stderr.", message))
            }
            other => Self::Processing(other.to_string()),
        }
    }
}
