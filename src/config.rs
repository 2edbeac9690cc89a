use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{PosterError, PosterResult};

/// Crate-wide settings for the cache, the decoder gateway and the compositor.
///
/// Services take a `&Config` at construction; there is no ambient global
/// state. The JSON form uses the same field names as the struct.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that finished posters are written into.
    pub output_dir: PathBuf,
    /// Directory holding cached preview frames.
    pub cache_dir: PathBuf,
    /// Byte budget for the preview cache; oldest entries are evicted past it.
    pub max_cache_bytes: u64,
    /// Width previews are scaled down to (height follows the aspect ratio).
    pub preview_max_width: u32,
    /// JPEG quality (0-100) for cached previews and thumbnails.
    pub thumbnail_quality: u8,
    /// Output poster width in pixels.
    pub poster_width: u32,
    /// Output poster height in pixels.
    pub poster_height: u32,
    /// Directory searched first by the font resolution chain.
    pub fonts_dir: PathBuf,
    /// Deadline for metadata probes and preview extractions.
    pub preview_timeout_secs: u64,
    /// Deadline for lossless full-quality extractions.
    pub lossless_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/output"),
            cache_dir: std::env::temp_dir().join("postera_cache"),
            max_cache_bytes: 500 * 1024 * 1024,
            preview_max_width: 640,
            thumbnail_quality: 85,
            poster_width: 1000,
            poster_height: 1500,
            fonts_dir: PathBuf::from("/app/static/fonts"),
            preview_timeout_secs: 30,
            lossless_timeout_secs: 60,
        }
    }
}

impl Config {
    pub fn from_json_file(path: &Path) -> PosterResult<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> PosterResult<()> {
        if self.poster_width == 0 || self.poster_height == 0 {
            return Err(PosterError::validation(
                "poster_width/poster_height must be > 0",
            ));
        }
        if self.preview_max_width == 0 {
            return Err(PosterError::validation("preview_max_width must be > 0"));
        }
        if self.thumbnail_quality > 100 {
            return Err(PosterError::validation(
                "thumbnail_quality must be in 0..=100",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: Config = serde_json::from_str(r#"{"poster_width": 600}"#).unwrap();
        assert_eq!(cfg.poster_width, 600);
        assert_eq!(cfg.poster_height, 1500);
        assert_eq!(cfg.thumbnail_quality, 85);
    }

    #[test]
    fn validate_rejects_zero_dims() {
        let cfg = Config {
            poster_width: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }
}
