use std::path::Path;

/// Fallback frame rate when the decoder reports nothing parseable.
pub(crate) const DEFAULT_FPS: f64 = 24.0;

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
/// Metadata reported by the decoder for one video file.
pub struct VideoMetadata {
    /// Duration in seconds.
    pub duration: f64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate, rounded to 3 decimal places.
    pub fps: f64,
    /// Estimated total frame count (`duration * fps`, floored).
    pub total_frames: u64,
    /// Codec name as reported by the decoder.
    pub codec: String,
    /// Container size in bytes.
    pub size_bytes: u64,
}

/// Capability boundary over the external frame decoder.
///
/// Every operation is blocking, bounded by a deadline, and maps all failure
/// modes (spawn error, timeout, non-zero exit, garbled output) to `None`.
/// Nothing panics or errors across this boundary, which keeps the cache and
/// compositor layers free of subprocess concerns and testable against fakes.
pub trait FrameSource: Send + Sync {
    /// Probe duration, dimensions, frame rate and codec of a video file.
    fn probe(&self, path: &Path) -> Option<VideoMetadata>;

    /// Extract one lossy-encoded frame at `timestamp` seconds.
    ///
    /// `width`, when given, scales the frame down preserving aspect ratio.
    /// `quality` is 0-100 (higher is better).
    fn extract_frame(
        &self,
        path: &Path,
        timestamp: f64,
        width: Option<u32>,
        quality: u8,
    ) -> Option<Vec<u8>>;

    /// Extract one losslessly-encoded frame at `timestamp` seconds.
    fn extract_frame_lossless(&self, path: &Path, timestamp: f64) -> Option<Vec<u8>>;
}

/// Parse a decoder frame-rate string, either rational (`"24000/1001"`) or
/// plain (`"23.976"`). Unparseable input falls back to [`DEFAULT_FPS`].
pub(crate) fn parse_fps(raw: &str) -> f64 {
    let parsed = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = match num.trim().parse() {
                Ok(v) => v,
                Err(_) => return DEFAULT_FPS,
            };
            let den: f64 = match den.trim().parse() {
                Ok(v) => v,
                Err(_) => return DEFAULT_FPS,
            };
            if den == 0.0 {
                return DEFAULT_FPS;
            }
            num / den
        }
        None => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => return DEFAULT_FPS,
        },
    };
    if !parsed.is_finite() || parsed <= 0.0 {
        return DEFAULT_FPS;
    }
    (parsed * 1000.0).round() / 1000.0
}
