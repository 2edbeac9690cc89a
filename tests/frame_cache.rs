use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use postera::{Config, FrameCache, FrameSource, VideoMetadata};

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "postera_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn test_config(cache_dir: PathBuf, budget: u64) -> Config {
    Config {
        cache_dir,
        max_cache_bytes: budget,
        ..Config::default()
    }
}

/// Deterministic in-memory frame source with call counting.
///
/// Frames are `pad` bytes of payload stamped with the request timestamp;
/// timestamps listed in `fail_at` (millisecond precision) always miss.
struct ScriptedSource {
    pad: usize,
    fail_at: Vec<u64>,
    preview_calls: AtomicUsize,
    lossless_calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(pad: usize) -> Self {
        Self {
            pad,
            fail_at: Vec::new(),
            preview_calls: AtomicUsize::new(0),
            lossless_calls: AtomicUsize::new(0),
        }
    }

    fn failing_at(mut self, timestamps: &[f64]) -> Self {
        self.fail_at = timestamps.iter().map(|t| (t * 1000.0).round() as u64).collect();
        self
    }

    fn frame_for(&self, timestamp: f64) -> Option<Vec<u8>> {
        if self.fail_at.contains(&((timestamp * 1000.0).round() as u64)) {
            return None;
        }
        let mut bytes = format!("frame@{timestamp:.3}").into_bytes();
        bytes.resize(bytes.len() + self.pad, b'.');
        Some(bytes)
    }
}

impl FrameSource for ScriptedSource {
    fn probe(&self, _path: &Path) -> Option<VideoMetadata> {
        None
    }

    fn extract_frame(
        &self,
        _path: &Path,
        timestamp: f64,
        _width: Option<u32>,
        _quality: u8,
    ) -> Option<Vec<u8>> {
        self.preview_calls.fetch_add(1, Ordering::SeqCst);
        self.frame_for(timestamp)
    }

    fn extract_frame_lossless(&self, _path: &Path, timestamp: f64) -> Option<Vec<u8>> {
        self.lossless_calls.fetch_add(1, Ordering::SeqCst);
        self.frame_for(timestamp)
    }
}

fn cache_bytes_on_disk(dir: &Path) -> u64 {
    std::fs::read_dir(dir)
        .map(|rd| {
            rd.flatten()
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("jpg"))
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

#[test]
fn repeated_previews_hit_cache_without_reinvoking_decoder() {
    let dir = temp_dir("cache_idempotent");
    let source = Arc::new(ScriptedSource::new(64));
    let cache = FrameCache::new(&test_config(dir.clone(), 1 << 20), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    let first = cache.get_preview(video, 3.25, 640, 85).unwrap();
    let second = cache.get_preview(video, 3.25, 640, 85).unwrap();

    assert_eq!(first, second);
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn sub_millisecond_timestamps_share_one_entry() {
    let dir = temp_dir("cache_ms_coalesce");
    let source = Arc::new(ScriptedSource::new(16));
    let cache = FrameCache::new(&test_config(dir.clone(), 1 << 20), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    cache.get_preview(video, 2.0001, 640, 85).unwrap();
    cache.get_preview(video, 2.00014, 640, 85).unwrap();
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), 1);

    // A difference at the 3rd decimal place is a distinct entry.
    cache.get_preview(video, 2.001, 640, 85).unwrap();
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn decoder_miss_leaves_cache_unmodified() {
    let dir = temp_dir("cache_miss");
    let source = Arc::new(ScriptedSource::new(16).failing_at(&[5.0]));
    let cache = FrameCache::new(&test_config(dir.clone(), 1 << 20), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    assert!(cache.get_preview(video, 5.0, 640, 85).is_none());
    assert_eq!(cache_bytes_on_disk(&dir), 0);

    // No negative caching: the decoder is consulted again next time.
    assert!(cache.get_preview(video, 5.0, 640, 85).is_none());
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn full_quality_always_bypasses_cache() {
    let dir = temp_dir("cache_bypass");
    let source = Arc::new(ScriptedSource::new(16));
    let cache = FrameCache::new(&test_config(dir.clone(), 1 << 20), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    cache.get_full_quality(video, 1.0).unwrap();
    cache.get_full_quality(video, 1.0).unwrap();

    assert_eq!(source.lossless_calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache_bytes_on_disk(&dir), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn eviction_drops_oldest_writes_first_and_bounds_total_size() {
    let dir = temp_dir("cache_evict");
    let source = Arc::new(ScriptedSource::new(1000));
    let entry_size = source.frame_for(0.0).unwrap().len() as u64;
    let budget = 3 * entry_size;
    let cache = FrameCache::new(&test_config(dir.clone(), budget), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    for i in 0..6 {
        cache.get_preview(video, i as f64, 640, 85).unwrap();
        assert!(
            cache_bytes_on_disk(&dir) <= budget,
            "cache exceeded budget after write {i}"
        );
        // Distinct mtimes keep the write-order eviction deterministic.
        std::thread::sleep(std::time::Duration::from_millis(15));
    }

    let calls_before = source.preview_calls.load(Ordering::SeqCst);

    // The newest entry survived...
    cache.get_preview(video, 5.0, 640, 85).unwrap();
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), calls_before);

    // ...while the oldest was evicted and needs re-extraction.
    cache.get_preview(video, 0.0, 640, 85).unwrap();
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), calls_before + 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn eviction_is_fifo_by_write_time_not_read_recency() {
    let dir = temp_dir("cache_fifo");
    let source = Arc::new(ScriptedSource::new(1000));
    let entry_size = source.frame_for(0.0).unwrap().len() as u64;
    let budget = 2 * entry_size;
    let cache = FrameCache::new(&test_config(dir.clone(), budget), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    cache.get_preview(video, 0.0, 640, 85).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(15));
    cache.get_preview(video, 1.0, 640, 85).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(15));

    // Re-reading the oldest entry does not refresh its position.
    cache.get_preview(video, 0.0, 640, 85).unwrap();
    let calls = source.preview_calls.load(Ordering::SeqCst);
    assert_eq!(calls, 2);

    // A third write forces an eviction; the re-read entry still goes first.
    cache.get_preview(video, 2.0, 640, 85).unwrap();
    cache.get_preview(video, 0.0, 640, 85).unwrap();
    assert_eq!(source.preview_calls.load(Ordering::SeqCst), calls + 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn thumbnails_sample_evenly_in_order_and_omit_failures() {
    let dir = temp_dir("cache_thumbs");
    let source = Arc::new(ScriptedSource::new(0).failing_at(&[4.0]));
    let cache = FrameCache::new(&test_config(dir.clone(), 1 << 20), source.clone()).unwrap();
    let video = Path::new("/videos/a.mp4");

    // duration 10s, 5 samples => 0, 2, 4, 6, 8; extraction fails at 4s.
    let thumbs = cache.get_thumbnails(video, 10.0, 5);
    let stamps: Vec<String> = thumbs
        .iter()
        .map(|t| String::from_utf8_lossy(t).into_owned())
        .collect();
    assert_eq!(
        stamps,
        vec!["frame@0.000", "frame@2.000", "frame@6.000", "frame@8.000"]
    );

    assert!(cache.get_thumbnails(video, 0.0, 5).is_empty());
    assert!(cache.get_thumbnails(video, 10.0, 0).is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn clear_empties_the_cache_directory() {
    let dir = temp_dir("cache_clear");
    let source = Arc::new(ScriptedSource::new(32));
    let cache = FrameCache::new(&test_config(dir.clone(), 1 << 20), source).unwrap();
    let video = Path::new("/videos/a.mp4");

    cache.get_preview(video, 1.0, 640, 85).unwrap();
    cache.get_preview(video, 2.0, 640, 85).unwrap();
    assert!(cache_bytes_on_disk(&dir) > 0);

    cache.clear();
    assert_eq!(cache_bytes_on_disk(&dir), 0);

    std::fs::remove_dir_all(&dir).ok();
}
