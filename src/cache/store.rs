use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context as _;

use crate::cache::key::preview_cache_key;
use crate::config::Config;
use crate::foundation::error::PosterResult;
use crate::media::FrameSource;

const ENTRY_EXT: &str = "jpg";

/// On-disk memoization of preview-quality frames.
///
/// Entries are keyed by (path, millisecond timestamp, width, quality) and
/// written atomically (temp file + rename), so concurrent lookups of the same
/// key resolve to an idempotent overwrite and a reader can never observe a
/// partial file. Eviction is FIFO by write time: reads do not refresh an
/// entry's mtime, so a frequently re-requested old frame is just as evictable
/// as one requested once.
///
/// No failure escapes this layer; a decode error, timeout or cache I/O
/// problem all surface as a `None` ("miss") result.
pub struct FrameCache {
    dir: PathBuf,
    max_bytes: u64,
    preview_width: u32,
    preview_quality: u8,
    source: Arc<dyn FrameSource>,
}

impl FrameCache {
    /// Create the cache, making sure its directory exists.
    pub fn new(cfg: &Config, source: Arc<dyn FrameSource>) -> PosterResult<Self> {
        std::fs::create_dir_all(&cfg.cache_dir)
            .with_context(|| format!("create cache dir '{}'", cfg.cache_dir.display()))?;
        Ok(Self {
            dir: cfg.cache_dir.clone(),
            max_bytes: cfg.max_cache_bytes,
            preview_width: cfg.preview_max_width,
            preview_quality: cfg.thumbnail_quality,
            source,
        })
    }

    /// Fetch a preview frame, served from cache when possible.
    ///
    /// On a miss the decoder is invoked, the result stored, and the byte
    /// budget enforced before returning. A decoder failure returns `None`
    /// and leaves the cache unmodified.
    pub fn get_preview(
        &self,
        path: &Path,
        timestamp: f64,
        width: u32,
        quality: u8,
    ) -> Option<Vec<u8>> {
        let key = preview_cache_key(path, timestamp, width, quality);
        let entry = self.entry_path(&key);

        if let Ok(bytes) = std::fs::read(&entry) {
            tracing::debug!(%key, "preview cache hit");
            return Some(bytes);
        }

        let bytes = self
            .source
            .extract_frame(path, timestamp, Some(width), quality)?;

        if let Err(e) = self.write_entry(&entry, &bytes) {
            // A failed write degrades to an uncached response; the frame
            // itself is still good.
            tracing::warn!(%key, error = %e, "failed to write cache entry");
        } else {
            self.enforce_budget();
        }
        Some(bytes)
    }

    /// Fetch a preview frame at the configured width and quality.
    pub fn preview(&self, path: &Path, timestamp: f64) -> Option<Vec<u8>> {
        self.get_preview(path, timestamp, self.preview_width, self.preview_quality)
    }

    /// Fetch a full-quality frame, bypassing the cache entirely.
    ///
    /// Full-quality frames are large and used once per poster generation, so
    /// caching them would pressure the byte budget for no amortized benefit.
    pub fn get_full_quality(&self, path: &Path, timestamp: f64) -> Option<Vec<u8>> {
        self.source.extract_frame_lossless(path, timestamp)
    }

    /// Sample `count` evenly spaced previews over `[0, duration)`.
    ///
    /// Returns previews in ascending timestamp order, silently omitting any
    /// sample whose extraction failed.
    #[tracing::instrument(skip(self), fields(path = %path.display()))]
    pub fn get_thumbnails(&self, path: &Path, duration: f64, count: usize) -> Vec<Vec<u8>> {
        let mut thumbnails = Vec::new();
        if duration <= 0.0 || count == 0 {
            return thumbnails;
        }

        let interval = duration / count as f64;
        for i in 0..count {
            let timestamp = i as f64 * interval;
            if let Some(frame) = self.preview(path, timestamp) {
                thumbnails.push(frame);
            }
        }
        thumbnails
    }

    /// Remove every cache entry. Errors are swallowed.
    pub fn clear(&self) {
        for (path, _, _) in self.scan_entries() {
            let _ = std::fs::remove_file(path);
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ENTRY_EXT}"))
    }

    /// Atomic write: a unique temp file in the same directory, then rename.
    /// The temp name never matches the entry extension, so a half-written
    /// file is invisible to both lookups and eviction.
    fn write_entry(&self, entry: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = entry.with_extension(format!("tmp-{}", std::process::id()));
        std::fs::write(&tmp, bytes)?;
        match std::fs::rename(&tmp, entry) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(e)
            }
        }
    }

    /// Delete oldest-written entries until the directory fits the budget.
    ///
    /// Disk errors are swallowed: the cache may transiently exceed its budget
    /// but cleanup must never fail a request. A file that vanished between
    /// the scan and the delete (concurrent eviction) counts as removed.
    fn enforce_budget(&self) {
        let mut entries = self.scan_entries();
        let mut total: u64 = entries.iter().map(|(_, _, size)| size).sum();
        if total <= self.max_bytes {
            return;
        }

        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        let mut evicted = 0usize;
        for (path, _, size) in entries {
            if total <= self.max_bytes {
                break;
            }
            let _ = std::fs::remove_file(&path);
            total = total.saturating_sub(size);
            evicted += 1;
        }
        tracing::debug!(evicted, remaining_bytes = total, "cache eviction pass");
    }

    /// All current entries as (path, mtime, size), skipping temp files and
    /// anything that disappears mid-scan.
    fn scan_entries(&self) -> Vec<(PathBuf, SystemTime, u64)> {
        let Ok(read_dir) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for entry in read_dir.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            let Ok(meta) = entry.metadata() else { continue };
            let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            out.push((path, mtime, meta.len()));
        }
        out
    }
}
