//! Slideshow command synthesis: looped stills concatenated over one audio track.

use std::path::{Path, PathBuf};

use mtk_models::CompositorOptions;

use crate::command::CompositorCommand;
use crate::filters::{build_concat_graph, OUTPUT_VIDEO_LABEL};

/// A downloaded still and how long it stays on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideshowInput {
    pub path: PathBuf,
    pub duration: f64,
}

/// Build the FFmpeg invocation for a slideshow.
///
/// The result depends only on the arguments, so identical inputs always
/// produce identical argument vectors. Images become inputs `0..M`, the
/// audio track is input `M`.
pub fn build_slideshow_command(
    images: &[SlideshowInput],
    audio: &Path,
    output: &Path,
    options: &CompositorOptions,
) -> CompositorCommand {
    let mut cmd = CompositorCommand::new(output);
    for image in images {
        cmd = cmd.looped_image(&image.path, image.duration);
    }
    let audio_index = images.len();

    let mut cmd = cmd
        .input(audio)
        .filter_complex(build_concat_graph(images.len()))
        .map(OUTPUT_VIDEO_LABEL)
        .map(format!("{}:a?", audio_index))
        .option("-c:v", options.video_codec.as_deref())
        .option("-tune", options.tune.as_deref())
        .option("-c:a", options.audio_codec.as_deref())
        .option("-b:a", options.audio_bitrate.as_deref())
        .option("-fps_mode", options.fps_mode.as_deref())
        .output_args(["-pix_fmt", "yuv420p"])
        .output_args(options.other_flags.iter().cloned());

    if options.shortest && !cmd.has_output_arg("-shortest") {
        cmd = cmd.output_arg("-shortest");
    }
    cmd
}
