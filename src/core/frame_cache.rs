//! Per-file frame cache keyed by quantized timestamp
//!
//! Structure: one `FrameCache` per resolved video file, holding
//! `HashMap<bucket, CachedFrame>` behind a single mutex.
//! - bucket = floor(seconds * fps): timestamps in the same `1/fps` window share an entry
//! - writes come from decode batches on worker threads
//! - reads come from `image_for` on any thread
//!
//! Overlapping batches may write the same bucket; the last write wins. Decoding
//! is deterministic per bucket, so the values are interchangeable.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use log::{debug, trace};

use crate::entities::frame::CachedFrame;

/// Absorbs float error so `i / fps` always lands in bucket `i`
const BUCKET_EPSILON: f64 = 1e-9;

/// Quantization bucket for `seconds` at `fps`.
///
/// None for negative, non-finite or zero-fps input (never cached).
pub fn bucket_for(seconds: f64, fps: u32) -> Option<i64> {
    if fps == 0 || !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * f64::from(fps) + BUCKET_EPSILON).floor() as i64)
}

/// Cache statistics for monitoring performance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Point-in-time view of one or more caches
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStatsSnapshot {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

impl std::ops::Add for CacheStatsSnapshot {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            entries: self.entries + rhs.entries,
            bytes: self.bytes + rhs.bytes,
            hits: self.hits + rhs.hits,
            misses: self.misses + rhs.misses,
        }
    }
}

/// Decoded frames of one video file
#[derive(Debug)]
pub struct FrameCache {
    path: PathBuf,
    fps: u32,
    frames: Mutex<HashMap<i64, CachedFrame>>,
    bytes: AtomicUsize,
    stats: CacheStats,
}

impl FrameCache {
    pub fn new(path: impl Into<PathBuf>, fps: u32) -> Self {
        let path = path.into();
        debug!("FrameCache created: {} @ {} fps", path.display(), fps);
        Self {
            path,
            fps,
            frames: Mutex::new(HashMap::new()),
            bytes: AtomicUsize::new(0),
            stats: CacheStats::default(),
        }
    }

    /// Store `frame` in the bucket of `seconds`, replacing any previous entry.
    ///
    /// Returns false if `seconds` has no bucket.
    pub fn insert(&self, seconds: f64, frame: CachedFrame) -> bool {
        let Some(bucket) = bucket_for(seconds, self.fps) else {
            return false;
        };
        let size = frame.mem();

        let mut frames = self.lock();
        if let Some(old) = frames.insert(bucket, frame) {
            self.bytes.fetch_sub(old.mem(), Ordering::Relaxed);
        }
        self.bytes.fetch_add(size, Ordering::Relaxed);
        trace!("Cached {}[{}] ({} bytes)", self.path.display(), bucket, size);
        true
    }

    /// Frame in the bucket of `seconds`. Records a hit or miss.
    pub fn get(&self, seconds: f64) -> Option<CachedFrame> {
        let result = bucket_for(seconds, self.fps).and_then(|b| self.lock().get(&b).cloned());
        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        result
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let frames = self.lock();
        CacheStatsSnapshot {
            entries: frames.len(),
            bytes: self.bytes.load(Ordering::Relaxed),
            hits: self.stats.hits(),
            misses: self.stats.misses(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<i64, CachedFrame>> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}
