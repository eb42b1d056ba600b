//! Wire format of the `/v1/ffmpeg/compose` request body.
//!
//! These types mirror the JSON exactly and accept partial input. Semantic
//! checks happen in [`crate::assembly`].

use serde::{Deserialize, Serialize};

/// Top-level compose payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposePayload {
    /// Caller correlation id, echoed unchanged in every response. Any JSON
    /// value is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    #[serde(default)]
    pub inputs: ComposeInputs,

    #[serde(default)]
    pub outputs: Vec<OutputTargetInput>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_input: Option<AssetInput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_sequence: Option<Vec<ImageInput>>,

    #[serde(default)]
    pub ffmpeg_options: CompositorOptions,
}

impl ComposeInputs {
    /// A compose body is a video assembly when it names both an audio track
    /// and an image sequence.
    pub fn is_assembly(&self) -> bool {
        self.audio_input.is_some() && self.image_sequence.is_some()
    }
}

/// Source locator as sent by clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetInput {
    /// `gdrive_id` or `s3_object_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInput {
    #[serde(flatten)]
    pub source: AssetInput,

    /// Display time in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

/// Encoder options forwarded to the compositor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositorOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tune: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_bitrate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps_mode: Option<String>,
    /// Flags appended verbatim after the fixed arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_flags: Vec<String>,
    #[serde(default)]
    pub shortest: bool,
}

/// Destination as sent by clients. Only the first entry is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTargetInput {
    /// `gdrive` or `s3`, defaults to `s3`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_key_prefix: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_payload() {
        let payload: ComposePayload = serde_json::from_value(json!({
            "id": "req-1",
            "inputs": {
                "output_filename": "out.mp4",
                "audio_input": {"source_type": "gdrive_id", "file_id": "AUD", "file_name": "song.wav"},
                "image_sequence": [
                    {"source_type": "s3_object_key", "object_key": "img/a.png", "duration": 2.5},
                    {"source_type": "gdrive_id", "file_id": "IMG2", "duration": 3}
                ],
                "ffmpeg_options": {"video_codec": "libx264", "other_flags": ["-crf", "23"], "shortest": true}
            },
            "outputs": [{"type": "gdrive", "folder_id": "FOLDER"}]
        }))
        .unwrap();

        assert!(payload.inputs.is_assembly());
        let images = payload.inputs.image_sequence.as_ref().unwrap();
        assert_eq!(images[0].source.object_key.as_deref(), Some("img/a.png"));
        assert_eq!(images[1].duration, Some(3.0));
        assert!(payload.inputs.ffmpeg_options.shortest);
        assert_eq!(payload.outputs[0].kind.as_deref(), Some("gdrive"));
    }

    #[test]
    fn test_caller_id_keeps_its_json_type() {
        let numeric: ComposePayload = serde_json::from_value(json!({"id": 7})).unwrap();
        assert_eq!(numeric.id, Some(json!(7)));
        assert_eq!(serde_json::to_value(&numeric).unwrap()["id"], json!(7));

        let null: ComposePayload = serde_json::from_value(json!({"id": null})).unwrap();
        assert_eq!(null.id, None);
    }

    #[test]
    fn test_empty_payload_is_not_assembly() {
        let payload: ComposePayload = serde_json::from_value(json!({})).unwrap();
        assert!(!payload.inputs.is_assembly());
        assert!(payload.outputs.is_empty());
    }
}
