//! Postera extracts still frames from video files and composites them, together
//! with vector/text overlays, into fixed-resolution poster images.
//!
//! The crate is built around two subsystems:
//!
//! - [`FrameCache`]: turns timestamp requests into decoded preview stills with
//!   bounded-latency seeking and a size-bounded on-disk cache.
//! - [`Compositor`]: renders a layered [`PosterScene`] (background frame,
//!   gradient or solid fill, line primitives, styled multi-line text) onto an
//!   output canvas whose resolution differs from the editing surface the
//!   coordinates were authored in.
//!
//! The external decoder (`ffmpeg`/`ffprobe`) is wrapped behind the
//! [`FrameSource`] capability trait so the core stays testable against fakes.
#![forbid(unsafe_code)]

pub mod cache;
pub mod compose;
pub mod config;
pub mod foundation;
pub mod media;

pub use cache::FrameCache;
pub use compose::{
    Background, Compositor, FontStyle, FontWeight, GradientDirection, LineElement, PosterScene,
    RenderedPoster, SelectionRect, TextAlign, TextLayer,
};
pub use config::Config;
pub use foundation::color::Rgb8;
pub use foundation::error::{PosterError, PosterResult};
pub use media::{FfmpegSource, FrameSource, VideoMetadata};
