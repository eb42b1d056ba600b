//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{MediaError, MediaResult};

/// Longest stderr excerpt kept on a failure.
const STDERR_TAIL_BYTES: usize = 8 * 1024;

/// Builder for FFmpeg commands.
///
/// Arguments are emitted in insertion order within each section:
/// inputs, filter graph, stream maps, output arguments, output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositorCommand {
    /// Output file path
    output: PathBuf,
    /// `-i` inputs with their per-input options
    input_args: Vec<String>,
    /// Number of `-i` entries in `input_args`
    input_count: usize,
    /// Filter graph
    filter_complex: Option<String>,
    /// `-map` specifiers
    maps: Vec<String>,
    /// Output arguments (after maps)
    output_args: Vec<String>,
}

impl CompositorCommand {
    /// Create a new command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            input_count: 0,
            filter_complex: None,
            maps: Vec::new(),
            output_args: Vec::new(),
        }
    }

    /// Add a still image looped for `duration` seconds.
    pub fn looped_image(mut self, path: impl AsRef<Path>, duration: f64) -> Self {
        self.input_args.extend([
            "-loop".to_string(),
            "1".to_string(),
            "-t".to_string(),
            format_seconds(duration),
        ]);
        self.input(path)
    }

    /// Add a plain input.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.input_args.push("-i".to_string());
        self.input_args.push(path.as_ref().to_string_lossy().to_string());
        self.input_count += 1;
        self
    }

    /// Set filter complex.
    pub fn filter_complex(mut self, filter: impl Into<String>) -> Self {
        self.filter_complex = Some(filter.into());
        self
    }

    /// Add a `-map` specifier.
    pub fn map(mut self, spec: impl Into<String>) -> Self {
        self.maps.push(spec.into());
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add `flag value` when `value` is present and non-empty.
    pub fn option(self, flag: &str, value: Option<&str>) -> Self {
        match value.filter(|v| !v.is_empty()) {
            Some(value) => self.output_arg(flag).output_arg(value),
            None => self,
        }
    }

    /// Whether `arg` already appears among the output arguments.
    pub fn has_output_arg(&self, arg: &str) -> bool {
        self.output_args.iter().any(|a| a == arg)
    }

    /// Number of `-i` inputs added so far.
    pub fn input_count(&self) -> usize {
        self.input_count
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments (program name excluded).
    pub fn build_args(&self) -> Vec<String> {
        let mut args = self.input_args.clone();

        if let Some(filter) = &self.filter_complex {
            args.push("-filter_complex".to_string());
            args.push(filter.clone());
        }

        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());
        args
    }

    /// Command line for logs.
    pub fn to_command_line(&self) -> String {
        format!("ffmpeg {}", self.build_args().join(" "))
    }
}

/// `f64` seconds without a trailing `.0` for whole values.
fn format_seconds(seconds: f64) -> String {
    format!("{}", seconds)
}

/// Executes compositor commands.
#[async_trait]
pub trait Compositor: Send + Sync {
    /// Run to completion. A non-zero exit is an error carrying stderr.
    async fn run(&self, cmd: &CompositorCommand) -> MediaResult<()>;
}

/// Runs FFmpeg as a subprocess.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Binary name or path
    binary: String,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn resolve(&self) -> MediaResult<PathBuf> {
        which::which(&self.binary).map_err(|_| MediaError::FfmpegNotFound(self.binary.clone()))
    }
}

#[async_trait]
impl Compositor for FfmpegRunner {
    async fn run(&self, cmd: &CompositorCommand) -> MediaResult<()> {
        let program = self.resolve()?;
        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

        let output = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            info!("FFmpeg finished: {}", cmd.output().display());
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code();
        error!(
            exit_code = ?code,
            stderr = %stderr,
            "FFmpeg failed for {}",
            cmd.output().display()
        );

        let message = match code {
            Some(code) => format!("FFmpeg failed (return code {})", code),
            None => "FFmpeg terminated by signal".to_string(),
        };
        Err(MediaError::ffmpeg_failed(message, Some(stderr_tail(&stderr)), code))
    }
}

fn stderr_tail(stderr: &str) -> String {
    if stderr.len() <= STDERR_TAIL_BYTES {
        return stderr.to_string();
    }
    let mut start = stderr.len() - STDERR_TAIL_BYTES;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    stderr[start..].to_string()
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfmpegNotFound(binary.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder_order() {
        let cmd = CompositorCommand::new("/tmp/w/out.mp4")
            .looped_image("/tmp/w/a.png", 2.5)
            .input("/tmp/w/audio.mp3")
            .filter_complex("GRAPH")
            .map("[outv]")
            .map("1:a?")
            .option("-c:v", Some("libx264"))
            .option("-tune", None)
            .option("-c:a", Some(""));

        assert_eq!(
            cmd.build_args(),
            vec![
                "-loop", "1", "-t", "2.5", "-i", "/tmp/w/a.png", "-i", "/tmp/w/audio.mp3",
                "-filter_complex", "GRAPH", "-map", "[outv]", "-map", "1:a?", "-c:v", "libx264",
                "/tmp/w/out.mp4",
            ]
        );
        assert_eq!(cmd.input_count(), 2);
    }

    #[test]
    fn test_whole_seconds_format() {
        assert_eq!(format_seconds(3.0), "3");
        assert_eq!(format_seconds(0.25), "0.25");
    }

    #[test]
    fn test_stderr_tail_keeps_end() {
        let long = "x".repeat(STDERR_TAIL_BYTES + 10) + "END";
        let tail = stderr_tail(&long);
        assert_eq!(tail.len(), STDERR_TAIL_BYTES);
        assert!(tail.ends_with("END"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let runner = FfmpegRunner::new("definitely-not-an-ffmpeg-binary");
        let cmd = CompositorCommand::new("out.mp4");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_ffmpeg_failed() {
        let runner = FfmpegRunner::new("false");
        let cmd = CompositorCommand::new("out.mp4");
        match runner.run(&cmd).await {
            Err(MediaError::FfmpegFailed {
                message,
                stderr,
                exit_code,
            }) => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(message, "FFmpeg failed (return code 1)");
                assert_eq!(stderr.as_deref(), Some(""));
            }
            other => panic!("expected FfmpegFailed, got {:?}", other),
        }
    }
}
