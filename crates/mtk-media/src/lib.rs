//! FFmpeg CLI wrapper for slideshow video assembly.
//!
//! This crate provides:
//! - Deterministic FFmpeg command building
//! - The slideshow filter graph (looped stills concatenated over audio)
//! - A `Compositor` trait with an FFmpeg subprocess implementation
//! - Job-scoped scratch directories

pub mod command;
pub mod error;
pub mod filters;
pub mod slideshow;
pub mod workdir;

pub use command::{check_ffmpeg, Compositor, CompositorCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use filters::build_concat_graph;
pub use slideshow::{build_slideshow_command, SlideshowInput};
pub use workdir::{extension_of, sanitize_component, WorkDir};
