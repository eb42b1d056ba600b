//! Validated video assembly requests.
//!
//! [`AssemblyRequest::from_payload`] turns a loosely shaped
//! [`ComposePayload`] into a request where every locator resolves to exactly
//! one source kind and every image has a usable duration. Nothing downstream
//! of this module inspects the wire types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{AssetInput, ComposePayload, CompositorOptions, JobId};

const SOURCE_DRIVE: &str = "gdrive_id";
const SOURCE_OBJECT: &str = "s3_object_key";

/// Request rejected before any network or process activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing 'inputs' or 'outputs'.")]
    MissingInputsOrOutputs,

    #[error("Missing audio_input or image_sequence.")]
    MissingAssets,

    #[error("Invalid audio_input source_type/keys.")]
    InvalidAudio,

    #[error("Invalid image {0} source_type/keys.")]
    InvalidImage(usize),

    #[error("Missing duration for image {0}.")]
    MissingDuration(usize),

    #[error("Invalid duration for image {0}.")]
    InvalidDuration(usize),

    #[error("Missing bucket name for S3 download.")]
    MissingSourceBucket,

    #[error("Missing folder_id for gdrive output.")]
    MissingFolder,

    #[error("Missing bucket_name for S3 output.")]
    MissingOutputBucket,

    #[error("Unsupported output type: {0}")]
    UnsupportedOutput(String),

    #[error("Invalid output filename: {0}")]
    InvalidFilename(String),

    #[error("Output filename {0} collides with an input file name.")]
    OutputNameTaken(String),
}

/// Where a single input asset lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetLocator {
    /// Google Drive file
    Drive {
        file_id: String,
        file_name: Option<String>,
    },
    /// S3-compatible object
    Object {
        bucket: String,
        key: String,
        file_name: Option<String>,
    },
}

impl AssetLocator {
    /// Identifier used in logs.
    pub fn source_ref(&self) -> &str {
        match self {
            Self::Drive { file_id, .. } => file_id,
            Self::Object { key, .. } => key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Drive { .. } => "gdrive",
            Self::Object { .. } => "s3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAsset {
    pub locator: AssetLocator,
    /// Seconds, finite and positive
    pub duration: f64,
}

/// Where the rendered video goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputTarget {
    Drive { folder_id: String },
    Object { bucket: String, key: String },
}

/// A fully resolved assembly job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblyRequest {
    pub audio: AssetLocator,
    /// Ordered, never empty
    pub images: Vec<ImageAsset>,
    /// Bare file name of the rendered video
    pub output_filename: String,
    pub options: CompositorOptions,
    pub output: OutputTarget,
}

impl AssemblyRequest {
    /// Validate a compose payload.
    ///
    /// `default_bucket` fills in S3 locators and targets that omit a bucket.
    pub fn from_payload(
        payload: &ComposePayload,
        job_id: &JobId,
        default_bucket: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let inputs = &payload.inputs;
        let target = payload
            .outputs
            .first()
            .ok_or(ValidationError::MissingInputsOrOutputs)?;

        let output_filename = match non_empty(&inputs.output_filename) {
            Some(name) => validate_filename(name)?,
            None => default_output_filename(job_id),
        };

        let (audio_input, image_sequence) = match (&inputs.audio_input, &inputs.image_sequence) {
            (Some(audio), Some(images)) if !images.is_empty() => (audio, images),
            _ => return Err(ValidationError::MissingAssets),
        };

        let audio = resolve_locator(audio_input, default_bucket)?.ok_or(ValidationError::InvalidAudio)?;

        let mut images = Vec::with_capacity(image_sequence.len());
        for (i, image) in image_sequence.iter().enumerate() {
            let duration = image.duration.ok_or(ValidationError::MissingDuration(i))?;
            if !duration.is_finite() || duration <= 0.0 {
                return Err(ValidationError::InvalidDuration(i));
            }
            let locator =
                resolve_locator(&image.source, default_bucket)?.ok_or(ValidationError::InvalidImage(i))?;
            images.push(ImageAsset { locator, duration });
        }

        let output = match target.kind.as_deref().unwrap_or("s3") {
            "gdrive" => OutputTarget::Drive {
                folder_id: non_empty(&target.folder_id)
                    .ok_or(ValidationError::MissingFolder)?
                    .to_string(),
            },
            "s3" => {
                let bucket = non_empty(&target.bucket_name)
                    .or(default_bucket.filter(|b| !b.is_empty()))
                    .ok_or(ValidationError::MissingOutputBucket)?;
                let prefix = target
                    .object_key_prefix
                    .clone()
                    .unwrap_or_else(|| default_output_prefix(job_id));
                OutputTarget::Object {
                    bucket: bucket.to_string(),
                    key: join_key(&prefix, &output_filename),
                }
            }
            other => return Err(ValidationError::UnsupportedOutput(other.to_string())),
        };

        Ok(Self {
            audio,
            images,
            output_filename,
            options: inputs.ffmpeg_options.clone(),
            output,
        })
    }

    /// Number of assets to download, audio included.
    pub fn asset_count(&self) -> usize {
        self.images.len() + 1
    }
}

pub fn default_output_filename(job_id: &JobId) -> String {
    format!("video_assembly_{}.mp4", job_id)
}

pub fn default_output_prefix(job_id: &JobId) -> String {
    format!("youtube/{}/", job_id)
}

/// `Ok(None)` means the locator names no usable source.
fn resolve_locator(
    input: &AssetInput,
    default_bucket: Option<&str>,
) -> Result<Option<AssetLocator>, ValidationError> {
    let file_name = non_empty(&input.file_name).map(str::to_string);
    match input.source_type.as_deref() {
        Some(SOURCE_DRIVE) => Ok(non_empty(&input.file_id).map(|id| AssetLocator::Drive {
            file_id: id.to_string(),
            file_name,
        })),
        Some(SOURCE_OBJECT) => {
            let Some(key) = non_empty(&input.object_key) else {
                return Ok(None);
            };
            let bucket = non_empty(&input.bucket_name)
                .or(default_bucket.filter(|b| !b.is_empty()))
                .ok_or(ValidationError::MissingSourceBucket)?;
            Ok(Some(AssetLocator::Object {
                bucket: bucket.to_string(),
                key: key.to_string(),
                file_name,
            }))
        }
        _ => Ok(None),
    }
}

fn validate_filename(name: &str) -> Result<String, ValidationError> {
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(ValidationError::InvalidFilename(name.to_string()));
    }
    Ok(name.to_string())
}

fn join_key(prefix: &str, filename: &str) -> String {
    let key = if prefix.is_empty() || prefix.ends_with('/') || prefix.ends_with('\\') {
        format!("{}{}", prefix, filename)
    } else {
        format!("{}/{}", prefix, filename)
    };
    key.replace('\\', "/")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> ComposePayload {
        serde_json::from_value(value).unwrap()
    }

    fn job() -> JobId {
        JobId::from_string("job-1")
    }

    fn base() -> serde_json::Value {
        json!({
            "inputs": {
                "audio_input": {"source_type": "s3_object_key", "object_key": "audio/track.mp3"},
                "image_sequence": [
                    {"source_type": "gdrive_id", "file_id": "IMG0", "duration": 2},
                    {"source_type": "s3_object_key", "object_key": "img/1.png", "bucket_name": "pics", "duration": 1.5}
                ]
            },
            "outputs": [{"type": "s3"}]
        })
    }

    #[test]
    fn test_defaults_are_applied() {
        let req = AssemblyRequest::from_payload(&payload(base()), &job(), Some("media")).unwrap();

        assert_eq!(req.output_filename, "video_assembly_job-1.mp4");
        assert_eq!(
            req.audio,
            AssetLocator::Object {
                bucket: "media".into(),
                key: "audio/track.mp3".into(),
                file_name: None
            }
        );
        assert_eq!(req.images.len(), 2);
        assert_eq!(req.asset_count(), 3);
        assert_eq!(
            req.output,
            OutputTarget::Object {
                bucket: "media".into(),
                key: "youtube/job-1/video_assembly_job-1.mp4".into()
            }
        );
    }

    #[test]
    fn test_missing_duration_names_index() {
        let mut value = base();
        value["inputs"]["image_sequence"][1]
            .as_object_mut()
            .unwrap()
            .remove("duration");
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::MissingDuration(1));
        assert_eq!(err.to_string(), "Missing duration for image 1.");
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        let mut value = base();
        value["inputs"]["image_sequence"][0]["duration"] = json!(0);
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidDuration(0));
    }

    #[test]
    fn test_unknown_source_type_rejected() {
        let mut value = base();
        value["inputs"]["audio_input"] = json!({"source_type": "ftp", "file_id": "x"});
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidAudio);

        let mut value = base();
        value["inputs"]["image_sequence"][0] = json!({"source_type": "gdrive_id", "duration": 1});
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::InvalidImage(0));
    }

    #[test]
    fn test_s3_source_without_any_bucket() {
        let err = AssemblyRequest::from_payload(&payload(base()), &job(), None).unwrap_err();
        assert_eq!(err, ValidationError::MissingSourceBucket);
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut value = base();
        value["inputs"]["image_sequence"] = json!([]);
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::MissingAssets);
    }

    #[test]
    fn test_output_targets() {
        let mut value = base();
        value["outputs"] = json!([{"type": "gdrive"}]);
        let err = AssemblyRequest::from_payload(&payload(value.clone()), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::MissingFolder);

        value["outputs"] = json!([{"type": "gdrive", "folder_id": "F1"}]);
        let req = AssemblyRequest::from_payload(&payload(value.clone()), &job(), Some("media")).unwrap();
        assert_eq!(req.output, OutputTarget::Drive { folder_id: "F1".into() });

        value["outputs"] = json!([{"type": "dropbox"}]);
        let err = AssemblyRequest::from_payload(&payload(value.clone()), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::UnsupportedOutput("dropbox".into()));

        value["outputs"] = json!([]);
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert_eq!(err, ValidationError::MissingInputsOrOutputs);
    }

    #[test]
    fn test_output_key_prefix_joining() {
        let mut value = base();
        value["inputs"]["output_filename"] = json!("final.mp4");
        value["outputs"] = json!([{"type": "s3", "bucket_name": "out", "object_key_prefix": "renders\\2024"}]);
        let req = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap();
        assert_eq!(
            req.output,
            OutputTarget::Object {
                bucket: "out".into(),
                key: "renders/2024/final.mp4".into()
            }
        );
    }

    #[test]
    fn test_output_filename_with_separator_rejected() {
        let mut value = base();
        value["inputs"]["output_filename"] = json!("../escape.mp4");
        let err = AssemblyRequest::from_payload(&payload(value), &job(), Some("media")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidFilename(_)));
    }
}
