//! Local file naming and command synthesis for an assembly job.

use std::path::{Path, PathBuf};

use mtk_media::{build_slideshow_command, extension_of, sanitize_component, CompositorCommand, SlideshowInput};
use mtk_models::{AssemblyRequest, AssetLocator, ValidationError};

/// One asset to fetch into the work directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadTask {
    pub locator: AssetLocator,
    pub dest: PathBuf,
}

/// Downloads in execution order (audio first, then images in sequence).
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPlan {
    pub tasks: Vec<DownloadTask>,
    pub audio: PathBuf,
    pub images: Vec<SlideshowInput>,
}

/// Assign a local path inside `workdir` to every asset of `request`.
pub fn plan_downloads(request: &AssemblyRequest, workdir: &Path) -> DownloadPlan {
    let audio = workdir.join(audio_file_name(&request.audio));
    let mut tasks = Vec::with_capacity(request.asset_count());
    tasks.push(DownloadTask {
        locator: request.audio.clone(),
        dest: audio.clone(),
    });

    let mut images = Vec::with_capacity(request.images.len());
    for (i, image) in request.images.iter().enumerate() {
        let dest = workdir.join(image_file_name(i, &image.locator));
        tasks.push(DownloadTask {
            locator: image.locator.clone(),
            dest: dest.clone(),
        });
        images.push(SlideshowInput {
            path: dest,
            duration: image.duration,
        });
    }

    DownloadPlan { tasks, audio, images }
}

/// Reject an output name that would overwrite one of the downloaded inputs.
pub fn ensure_distinct_output(request: &AssemblyRequest) -> Result<(), ValidationError> {
    let output = request.output_filename.as_str();
    let mut inputs = std::iter::once(audio_file_name(&request.audio)).chain(
        request
            .images
            .iter()
            .enumerate()
            .map(|(i, image)| image_file_name(i, &image.locator)),
    );
    if inputs.any(|name| name.eq_ignore_ascii_case(output)) {
        return Err(ValidationError::OutputNameTaken(output.to_string()));
    }
    Ok(())
}

/// Build the compositor invocation for `plan`, writing to `output`.
pub fn synthesize_command(request: &AssemblyRequest, plan: &DownloadPlan, output: &Path) -> CompositorCommand {
    build_slideshow_command(&plan.images, &plan.audio, output, &request.options)
}

fn audio_file_name(locator: &AssetLocator) -> String {
    match locator {
        AssetLocator::Drive { file_id, file_name } => {
            let ext = extension_of(file_name.as_deref().unwrap_or("audio.mp3"))
                .unwrap_or_else(|| ".mp3".to_string());
            format!("audio_{}{}", sanitize_component(file_id), ext)
        }
        AssetLocator::Object { key, file_name, .. } => {
            format!("audio{}", object_extension(key, file_name.as_deref()))
        }
    }
}

fn image_file_name(index: usize, locator: &AssetLocator) -> String {
    match locator {
        AssetLocator::Drive { file_id, file_name } => {
            let ext = file_name
                .as_deref()
                .and_then(extension_of)
                .unwrap_or_else(|| ".tmp".to_string());
            format!("image_{}_{}{}", index, sanitize_component(file_id), ext)
        }
        AssetLocator::Object { key, file_name, .. } => {
            format!("image_{}{}", index, object_extension(key, file_name.as_deref()))
        }
    }
}

fn object_extension(key: &str, file_name: Option<&str>) -> String {
    file_name
        .and_then(extension_of)
        .or_else(|| extension_of(key))
        .unwrap_or_else(|| ".tmp".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mtk_models::{CompositorOptions, ImageAsset, OutputTarget};

    fn drive(id: &str, name: Option<&str>) -> AssetLocator {
        AssetLocator::Drive {
            file_id: id.to_string(),
            file_name: name.map(String::from),
        }
    }

    fn object(key: &str, name: Option<&str>) -> AssetLocator {
        AssetLocator::Object {
            bucket: "media".to_string(),
            key: key.to_string(),
            file_name: name.map(String::from),
        }
    }

    fn request(audio: AssetLocator, images: Vec<AssetLocator>) -> AssemblyRequest {
        AssemblyRequest {
            audio,
            images: images
                .into_iter()
                .map(|locator| ImageAsset { locator, duration: 2.5 })
                .collect(),
            output_filename: "out.mp4".to_string(),
            options: CompositorOptions::default(),
            output: OutputTarget::Object {
                bucket: "media".to_string(),
                key: "youtube/j/out.mp4".to_string(),
            },
        }
    }

    #[test]
    fn test_drive_names() {
        let req = request(
            drive("AUD1", Some("track.wav")),
            vec![drive("IMG/1", Some("a.jpg")), drive("IMG2", None)],
        );
        let plan = plan_downloads(&req, Path::new("/w"));

        assert_eq!(plan.audio, PathBuf::from("/w/audio_AUD1.wav"));
        assert_eq!(plan.images[0].path, PathBuf::from("/w/image_0_IMG_1.jpg"));
        assert_eq!(plan.images[1].path, PathBuf::from("/w/image_1_IMG2.tmp"));
    }

    #[test]
    fn test_drive_audio_defaults_to_mp3() {
        let plan = plan_downloads(&request(drive("A", None), vec![drive("I", None)]), Path::new("/w"));
        assert_eq!(plan.audio, PathBuf::from("/w/audio_A.mp3"));

        let plan = plan_downloads(
            &request(drive("A", Some("noext")), vec![drive("I", None)]),
            Path::new("/w"),
        );
        assert_eq!(plan.audio, PathBuf::from("/w/audio_A.mp3"));
    }

    #[test]
    fn test_object_names_use_key_extension() {
        let req = request(
            object("music/song.m4a", None),
            vec![object("img/one.png", None), object("img/raw", Some("two.jpeg")), object("img/raw", None)],
        );
        let plan = plan_downloads(&req, Path::new("/w"));

        assert_eq!(plan.audio, PathBuf::from("/w/audio.m4a"));
        let paths: Vec<_> = plan.images.iter().map(|i| i.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/w/image_0.png"),
                PathBuf::from("/w/image_1.jpeg"),
                PathBuf::from("/w/image_2.tmp"),
            ]
        );
    }

    #[test]
    fn test_task_order_is_audio_then_images() {
        let req = request(object("a.mp3", None), vec![drive("x", None), object("y.png", None)]);
        let plan = plan_downloads(&req, Path::new("/w"));

        assert_eq!(plan.tasks.len(), req.asset_count());
        assert_eq!(plan.tasks[0].locator, req.audio);
        assert_eq!(plan.tasks[1].locator, req.images[0].locator);
        assert_eq!(plan.tasks[2].locator, req.images[1].locator);
        assert!(plan.images.iter().all(|i| i.duration == 2.5));
    }

    #[test]
    fn test_output_must_not_reuse_an_input_name() {
        let mut req = request(object("a.mp3", None), vec![object("b.png", None), drive("X", Some("c.jpg"))]);
        assert!(ensure_distinct_output(&req).is_ok());

        for taken in ["audio.mp3", "image_0.png", "IMAGE_1_X.JPG"] {
            req.output_filename = taken.to_string();
            assert_eq!(
                ensure_distinct_output(&req),
                Err(ValidationError::OutputNameTaken(taken.to_string()))
            );
        }

        req.output_filename = "image_1.png".to_string();
        assert!(ensure_distinct_output(&req).is_ok());
    }

    #[test]
    fn test_synthesized_command_uses_planned_paths() {
        let req = request(object("a.mp3", None), vec![object("b.png", None)]);
        let plan = plan_downloads(&req, Path::new("/w"));
        let cmd = synthesize_command(&req, &plan, Path::new("/w/out.mp4"));

        let args = cmd.build_args();
        assert_eq!(args[..6], ["-loop", "1", "-t", "2.5", "-i", "/w/image_0.png"]);
        assert_eq!(args[6..8], ["-i", "/w/audio.mp3"]);
        assert_eq!(args.last().map(String::as_str), Some("/w/out.mp4"));
    }
}
