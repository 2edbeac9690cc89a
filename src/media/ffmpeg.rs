use std::io::Read as _;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::media::gateway::{FrameSource, VideoMetadata, parse_fps};

/// Production [`FrameSource`] shelling out to `ffprobe`/`ffmpeg`.
///
/// We intentionally use the system binaries rather than linking FFmpeg to
/// avoid native dev header/lib requirements. Every invocation runs under a
/// deadline; an overrunning child is killed and reaped.
#[derive(Clone, Debug)]
pub struct FfmpegSource {
    preview_timeout: Duration,
    lossless_timeout: Duration,
}

impl FfmpegSource {
    pub fn new(cfg: &Config) -> Self {
        Self {
            preview_timeout: Duration::from_secs(cfg.preview_timeout_secs),
            lossless_timeout: Duration::from_secs(cfg.lossless_timeout_secs),
        }
    }

    /// Build the lossy single-frame extraction command.
    ///
    /// Seeking is two-phase: a coarse `-ss` before `-i` jumps to the nearest
    /// keyframe at `max(0, timestamp - 1s)` cheaply, then a precise `-ss`
    /// after `-i` decodes at most one second of residual, so worst-case seek
    /// latency is bounded regardless of where in the file the timestamp is.
    fn preview_command(
        path: &Path,
        timestamp: f64,
        width: Option<u32>,
        quality: u8,
    ) -> Command {
        let coarse = (timestamp - 1.0).max(0.0);
        let residual = timestamp - coarse;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-ss", &format!("{coarse:.6}")])
            .arg("-i")
            .arg(path)
            .args([
                "-ss",
                &format!("{residual:.6}"),
                "-frames:v",
                "1",
                "-q:v",
                &mjpeg_qscale(quality).to_string(),
            ]);
        if let Some(w) = width {
            cmd.args(["-vf", &format!("scale={w}:-1")]);
        }
        cmd.args(["-f", "image2pipe", "-vcodec", "mjpeg", "-y", "pipe:1"]);
        cmd
    }

    fn lossless_command(path: &Path, timestamp: f64) -> Command {
        let coarse = (timestamp - 1.0).max(0.0);
        let residual = timestamp - coarse;

        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-v", "error", "-ss", &format!("{coarse:.6}")])
            .arg("-i")
            .arg(path)
            .args([
                "-ss",
                &format!("{residual:.6}"),
                "-frames:v",
                "1",
                "-f",
                "image2pipe",
                "-vcodec",
                "png",
                "-y",
                "pipe:1",
            ]);
        cmd
    }
}

impl FrameSource for FfmpegSource {
    fn probe(&self, path: &Path) -> Option<VideoMetadata> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            codec_name: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
            size: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            #[serde(default)]
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let mut cmd = Command::new("ffprobe");
        cmd.args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path);

        let out = run_with_deadline(cmd, self.preview_timeout, "ffprobe")?;
        let parsed: ProbeOut = match serde_json::from_slice(&out) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ffprobe json parse failed");
                return None;
            }
        };

        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))?;
        let width = video.width?;
        let height = video.height?;
        let fps = parse_fps(video.r_frame_rate.as_deref().unwrap_or(""));

        let format = parsed.format.as_ref();
        let duration = format
            .and_then(|f| f.duration.as_deref())
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);
        let size_bytes = format
            .and_then(|f| f.size.as_deref())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        Some(VideoMetadata {
            duration,
            width,
            height,
            fps,
            total_frames: (duration * fps).max(0.0) as u64,
            codec: video.codec_name.clone().unwrap_or_default(),
            size_bytes,
        })
    }

    fn extract_frame(
        &self,
        path: &Path,
        timestamp: f64,
        width: Option<u32>,
        quality: u8,
    ) -> Option<Vec<u8>> {
        let cmd = Self::preview_command(path, timestamp, width, quality);
        let out = run_with_deadline(cmd, self.preview_timeout, "ffmpeg preview")?;
        if out.is_empty() { None } else { Some(out) }
    }

    fn extract_frame_lossless(&self, path: &Path, timestamp: f64) -> Option<Vec<u8>> {
        let cmd = Self::lossless_command(path, timestamp);
        let out = run_with_deadline(cmd, self.lossless_timeout, "ffmpeg lossless")?;
        if out.is_empty() { None } else { Some(out) }
    }
}

/// Map 0-100 quality to the mjpeg `-q:v` scale (1-31, lower is better).
fn mjpeg_qscale(quality: u8) -> u8 {
    let q = (100u16.saturating_sub(u16::from(quality))) / 3;
    (q as u8).clamp(1, 31)
}

/// Run a command to completion under a deadline, returning its stdout.
///
/// stdout/stderr are drained by reader threads while the caller polls
/// `try_wait`, so a chatty child can never fill a pipe and deadlock against
/// the deadline loop. On expiry the child is killed and reaped before
/// reporting failure.
fn run_with_deadline(mut cmd: Command, timeout: Duration, what: &str) -> Option<Vec<u8>> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to spawn {what}");
            return None;
        }
    };

    let mut stdout = child.stdout.take()?;
    let mut stderr = child.stderr.take()?;
    let out_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout.read_to_end(&mut buf);
        buf
    });
    let err_reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "{what} timed out, killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = out_reader.join();
                    let _ = err_reader.join();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to wait for {what}");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    };

    let stdout = out_reader.join().unwrap_or_default();
    let stderr = err_reader.join().unwrap_or_default();

    if !status.success() {
        tracing::warn!(
            status = %status,
            stderr = %String::from_utf8_lossy(&stderr).trim(),
            "{what} failed"
        );
        return None;
    }
    Some(stdout)
}
