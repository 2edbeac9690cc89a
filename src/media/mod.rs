mod ffmpeg;
mod gateway;

pub use ffmpeg::FfmpegSource;
pub use gateway::{FrameSource, VideoMetadata};
