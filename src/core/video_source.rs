//! Video-backed image source
//!
//! **Why**: Lottie image assets can point at a video instead of a still. Playback
//! asks for the image of an asset at arbitrary times, many times per second,
//! and decoding on demand is far too slow for that.
//!
//! Flow:
//! 1. `prepare(asset)` resolves `asset.jpeg` -> `asset.mov` and queues a batch
//!    on `Workers`; the batch opens the file's `DecoderHandle` (once per file)
//!    and decodes every frame at the configured fps
//! 2. Frames land in the file's `FrameCache` as they are reported
//! 3. Once every timestamp has reported, the completion is dispatched to the
//!    `CompletionContext` (usually the host's main queue)
//! 4. `image_for(asset, t)` reads the bucket for `t`; never decodes, never waits
//!
//! **Used by**: LayerRegistry (through `ImageProvider`), CLI

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use log::{debug, info, trace, warn};

use super::completion::CompletionContext;
use super::frame_cache::{CacheStatsSnapshot, FrameCache};
use super::path_resolver::PathResolver;
use super::workers::Workers;
use crate::config::{SourceError, SourceSettings};
use crate::entities::asset::AssetDescriptor;
use crate::entities::decoder::DecoderHandle;
use crate::entities::frame::{Bitmap, FrameCodec, FrameError};
use crate::entities::traits::{ImageProvider, MediaDecoder};

/// What one prepare batch did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    /// Resolved video file, None if resolution or opening failed
    pub path: Option<PathBuf>,
    /// Timestamps in the batch
    pub requested: usize,
    /// Frames written to the cache
    pub stored: usize,
    /// Timestamps that failed to decode or encode
    pub dropped: usize,
}

/// Per-file state. The cache exists as soon as a prepare is queued; the
/// decoder is opened by the first batch that runs.
struct FileSlot {
    path: PathBuf,
    handle: OnceLock<Arc<DecoderHandle>>,
    // Serializes opening; readers of `handle` never take it
    opening: Mutex<()>,
    cache: Arc<FrameCache>,
}

impl FileSlot {
    fn new(path: &Path, fps: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            handle: OnceLock::new(),
            opening: Mutex::new(()),
            cache: Arc::new(FrameCache::new(path, fps)),
        }
    }

    /// Decoder for this file, opened on first use (at most once per slot).
    ///
    /// A failed open is not remembered; the next batch tries again.
    fn handle(&self, decoder: &dyn MediaDecoder) -> Result<Arc<DecoderHandle>, FrameError> {
        if let Some(open) = self.handle.get() {
            return Ok(Arc::clone(open));
        }
        let _opening = self.opening.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(open) = self.handle.get() {
            return Ok(Arc::clone(open));
        }
        let opened = Arc::new(DecoderHandle::open(decoder, &self.path)?);
        Ok(Arc::clone(self.handle.get_or_init(|| opened)))
    }

    fn is_open(&self) -> bool {
        self.handle.get().is_some()
    }
}

/// `ImageProvider` serving frames decoded ahead of time from video files.
pub struct VideoImageSource {
    settings: SourceSettings,
    resolver: PathResolver,
    decoder: Arc<dyn MediaDecoder>,
    workers: Arc<Workers>,
    completions: Arc<dyn CompletionContext>,
    files: Mutex<HashMap<PathBuf, Arc<FileSlot>>>,
}

impl std::fmt::Debug for VideoImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoImageSource")
            .field("settings", &self.settings)
            .field("files", &self.lock_files().len())
            .finish()
    }
}

impl VideoImageSource {
    /// Build a source on shared decode workers and completion context.
    ///
    /// Fails only on invalid settings.
    pub fn new(
        settings: SourceSettings,
        decoder: Arc<dyn MediaDecoder>,
        workers: Arc<Workers>,
        completions: Arc<dyn CompletionContext>,
    ) -> Result<Self, SourceError> {
        settings.validate()?;

        let resolver = PathResolver::new(
            settings.base_dir.clone(),
            settings.still_extensions.iter().cloned(),
            settings.video_extension.clone(),
        );
        info!(
            "VideoImageSource: {} @ {} fps, {:?}",
            settings.base_dir.display(),
            settings.fps,
            settings.encoding
        );

        Ok(Self {
            settings,
            resolver,
            decoder,
            workers,
            completions,
            files: Mutex::new(HashMap::new()),
        })
    }

    /// Build a source with its own worker pool sized by `decode_workers`.
    pub fn spawn(
        settings: SourceSettings,
        decoder: Arc<dyn MediaDecoder>,
        completions: Arc<dyn CompletionContext>,
    ) -> Result<Self, SourceError> {
        settings.validate()?;
        let workers = match settings.decode_workers {
            0 => Workers::auto()?,
            n => Workers::new(n)?,
        };
        Self::new(settings, decoder, Arc::new(workers), completions)
    }

    pub fn settings(&self) -> &SourceSettings {
        &self.settings
    }

    /// Decode every frame of `asset`'s video in the background.
    ///
    /// `completion` runs exactly once on the completion context: after all
    /// frames reported, right away when the video can't be found, or as soon
    /// as the worker fails to open it.
    /// Calling again for a prepared asset re-decodes; the cache keeps one frame
    /// per bucket either way.
    pub fn prepare<F>(&self, asset: &AssetDescriptor, completion: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let completions = Arc::clone(&self.completions);
        self.start(asset, move |_| completions.dispatch(Box::new(completion)));
    }

    /// `prepare` that waits on the calling thread and reports the batch.
    ///
    /// Bypasses the completion context, so it is safe to call from the thread
    /// that drains it.
    pub fn prepare_blocking(&self, asset: &AssetDescriptor) -> PrepareReport {
        let (tx, rx) = crossbeam_channel::bounded(1);
        self.start(asset, move |report| {
            let _ = tx.send(report);
        });
        rx.recv().unwrap_or_else(|_| {
            warn!("Decode batch for {} ended without reporting", asset.id);
            PrepareReport::default()
        })
    }

    /// Bitmap for `asset` at `seconds` (0 when None) if already decoded.
    pub fn image_for(&self, asset: &AssetDescriptor, seconds: Option<f64>) -> Option<Bitmap> {
        let path = self.resolve(asset)?;
        let cache = self.lock_files().get(&path).map(|f| Arc::clone(&f.cache))?;

        let seconds = seconds.unwrap_or(0.0);
        let frame = cache.get(seconds)?;
        match frame.decode() {
            Ok(bitmap) => Some(bitmap),
            Err(e) => {
                warn!("Cached frame of {} at {:.3}s unreadable: {}", asset.id, seconds, e);
                None
            }
        }
    }

    /// Drop the decoder and cached frames of `asset`'s file.
    ///
    /// Batches still running finish into the detached cache. Returns false if
    /// the file was never prepared.
    pub fn release(&self, asset: &AssetDescriptor) -> bool {
        let Some(path) = self.resolve(asset) else {
            return false;
        };
        let removed = self.lock_files().remove(&path).is_some();
        if removed {
            debug!("Released {}", path.display());
        }
        removed
    }

    /// Totals over every open file
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.lock_files()
            .values()
            .map(|f| f.cache.stats())
            .fold(CacheStatsSnapshot::default(), |acc, s| acc + s)
    }

    /// Files with an open decoder
    pub fn open_files(&self) -> usize {
        self.lock_files().values().filter(|f| f.is_open()).count()
    }

    fn resolve(&self, asset: &AssetDescriptor) -> Option<PathBuf> {
        self.resolver.resolve(&asset.name, asset.directory.as_deref())
    }

    /// Schedule the batch for `asset`; `on_done` runs once with the outcome.
    ///
    /// Only path resolution runs on the caller. Opening the decoder and
    /// enumerating frames happen in the worker job.
    fn start<F>(&self, asset: &AssetDescriptor, on_done: F)
    where
        F: FnOnce(PrepareReport) + Send + 'static,
    {
        let Some(path) = self.resolve(asset) else {
            on_done(PrepareReport::default());
            return;
        };

        let slot = self.slot(&path);
        let decoder = Arc::clone(&self.decoder);
        let fps = self.settings.fps;
        let codec = self.settings.encoding;
        let tolerance = self.settings.tolerance_secs;
        let asset_id = asset.id.clone();

        debug!("Queue decode: {}", path.display());
        self.workers.execute(move || {
            let report = run_batch(&slot, decoder.as_ref(), fps, tolerance, codec, &asset_id);
            on_done(report);
        });
    }

    /// Slot for `path`, created empty on first use. Never does I/O.
    fn slot(&self, path: &Path) -> Arc<FileSlot> {
        let mut files = self.lock_files();
        let slot = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(FileSlot::new(path, self.settings.fps)));
        Arc::clone(slot)
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<FileSlot>>> {
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Open the file if needed, then decode all its frames into the cache. Runs
/// on a worker thread.
fn run_batch(
    slot: &FileSlot,
    decoder: &dyn MediaDecoder,
    fps: u32,
    tolerance: f64,
    codec: FrameCodec,
    asset_id: &str,
) -> PrepareReport {
    let handle = match slot.handle(decoder) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("Cannot open {}: {}", slot.path.display(), e);
            return PrepareReport::default();
        }
    };

    let times = handle.frame_times(fps);
    if times.is_empty() {
        debug!("{} has no frames at {} fps", slot.path.display(), fps);
        return PrepareReport {
            path: Some(slot.path.clone()),
            ..Default::default()
        };
    }

    let mut stored = 0usize;
    let mut dropped = 0usize;

    handle.decode_batch(&times, tolerance, &mut |t, result| {
        match result.and_then(|bitmap| codec.encode(&bitmap)) {
            Ok(frame) => {
                if slot.cache.insert(t, frame) {
                    stored += 1;
                } else {
                    dropped += 1;
                }
            }
            Err(e) => {
                warn!("Dropped frame {:.3}s of {}: {}", t, asset_id, e);
                dropped += 1;
            }
        }
    });

    let reported = stored + dropped;
    if reported != times.len() {
        warn!(
            "Decoder reported {} of {} frames for {}",
            reported,
            times.len(),
            asset_id
        );
    }
    debug!(
        "Decoded {}: {} stored, {} dropped",
        slot.path.display(),
        stored,
        dropped
    );

    PrepareReport {
        path: Some(slot.path.clone()),
        requested: times.len(),
        stored,
        dropped,
    }
}

impl ImageProvider for VideoImageSource {
    fn image_for(&self, asset: &AssetDescriptor, seconds: Option<f64>) -> Option<Bitmap> {
        let image = VideoImageSource::image_for(self, asset, seconds);
        trace!("image_for {} @ {:?}: {}", asset.id, seconds, image.is_some());
        image
    }

    fn on_source_replaced(&self) {
        debug!("VideoImageSource now active ({} open files)", self.open_files());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::completion::{Inline, MainQueue};
    use crate::entities::synthetic::SyntheticDecoder;
    use crate::entities::traits::DecodeSession;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(10);

    fn fixture(files: &[&str]) -> TempDir {
        let tmp = tempfile::tempdir().unwrap();
        for f in files {
            let path = tmp.path().join(f);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, b"").unwrap();
        }
        tmp
    }

    fn settings(base: &Path) -> SourceSettings {
        SourceSettings {
            base_dir: base.to_path_buf(),
            encoding: FrameCodec::Raw,
            ..Default::default()
        }
    }

    fn source(
        settings: SourceSettings,
        decoder: &SyntheticDecoder,
        completions: Arc<dyn CompletionContext>,
    ) -> VideoImageSource {
        let workers = Arc::new(Workers::new(2).unwrap());
        VideoImageSource::new(settings, Arc::new(decoder.clone()), workers, completions).unwrap()
    }

    /// Prepare with an Inline context and wait for the completion
    fn prepare_and_wait(src: &VideoImageSource, asset: &AssetDescriptor) {
        let (tx, rx) = mpsc::channel();
        src.prepare(asset, move || tx.send(()).unwrap());
        rx.recv_timeout(WAIT).unwrap();
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let decoder = SyntheticDecoder::new(1.0);
        let workers = Arc::new(Workers::new(1).unwrap());
        let bad = SourceSettings { fps: 0, ..Default::default() };
        let result = VideoImageSource::new(bad, Arc::new(decoder), workers, Arc::new(Inline));
        assert!(matches!(result, Err(SourceError::InvalidFps(0))));
    }

    #[test]
    fn test_image_before_prepare_is_none_and_decodes_nothing() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(1.0);
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        assert!(src.image_for(&asset, Some(0.5)).is_none());
        assert!(src.image_for(&asset, None).is_none());
        assert_eq!(decoder.stats().opens(), 0);
        assert_eq!(decoder.stats().batches(), 0);
    }

    #[test]
    fn test_same_bucket_same_image() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(1.0);
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        prepare_and_wait(&src, &asset);

        let a = src.image_for(&asset, Some(0.1)).unwrap();
        let b = src.image_for(&asset, Some(0.11)).unwrap();
        assert_eq!(a.pixels(), b.pixels());
        // Bucket 3 at 30 fps was decoded for t = 0.1
        assert_eq!(a.pixel(0, 0), Some(SyntheticDecoder::color_at(0.1)));

        // Default time is 0
        let first = src.image_for(&asset, None).unwrap();
        assert_eq!(first.pixel(0, 0), Some(SyntheticDecoder::color_at(0.0)));
    }

    #[test]
    fn test_completion_after_all_frames_reported() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.5).with_latency(Duration::from_millis(1));
        let main = MainQueue::new();
        let src = source(settings(tmp.path()), &decoder, Arc::new(main.clone()));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        let stats = decoder.stats();
        let calls = Arc::new(AtomicUsize::new(0));
        let reported_at_completion = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&reported_at_completion);
            src.prepare(&asset, move || {
                calls.fetch_add(1, Ordering::SeqCst);
                seen.store(stats.reported() as usize, Ordering::SeqCst);
            });
        }

        assert_eq!(main.wait_and_run(WAIT), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // ceil(0.5 * 30) = 15 timestamps
        assert_eq!(reported_at_completion.load(Ordering::SeqCst), 15);
        assert_eq!(src.cache_stats().entries, 15);

        // Nothing else queued afterwards
        assert_eq!(main.wait_and_run(Duration::from_millis(50)), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_completion_runs_on_completion_context() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.2);
        let main = MainQueue::new();
        let src = source(settings(tmp.path()), &decoder, Arc::new(main.clone()));

        let ran_on = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&ran_on);
        src.prepare(&AssetDescriptor::new("a", "clip.jpeg"), move || {
            *slot.lock().unwrap() = Some(std::thread::current().id());
        });

        assert_eq!(main.wait_and_run(WAIT), 1);
        assert_eq!(*ran_on.lock().unwrap(), Some(std::thread::current().id()));
    }

    #[test]
    fn test_missing_video_completes_without_decoding() {
        let tmp = fixture(&[]);
        let decoder = SyntheticDecoder::new(1.0);
        let main = MainQueue::new();
        let src = source(settings(tmp.path()), &decoder, Arc::new(main.clone()));

        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        src.prepare(&AssetDescriptor::new("a", "missing.jpeg"), move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        // Dispatched immediately, no worker involved
        assert_eq!(main.len(), 1);
        assert_eq!(main.run_pending(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(decoder.stats().opens(), 0);
        assert_eq!(src.open_files(), 0);
    }

    #[test]
    fn test_failed_frames_dropped() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(1.0).with_failures([0.5]);
        let mut s = settings(tmp.path());
        s.fps = 10;
        let src = source(s, &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        let report = src.prepare_blocking(&asset);
        assert_eq!(report.requested, 10);
        assert_eq!(report.stored, 9);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.path, Some(tmp.path().join("clip.mov")));

        assert!(src.image_for(&asset, Some(0.55)).is_none());
        assert!(src.image_for(&asset, Some(0.45)).is_some());
        assert!(src.image_for(&asset, Some(0.65)).is_some());
    }

    #[test]
    fn test_overlapping_prepares_consistent() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.3).with_latency(Duration::from_millis(1));
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        let (tx, rx) = mpsc::channel();
        for _ in 0..2 {
            let tx = tx.clone();
            src.prepare(&asset, move || tx.send(()).unwrap());
        }
        rx.recv_timeout(WAIT).unwrap();
        rx.recv_timeout(WAIT).unwrap();

        // One decoder for the file, two batches through it
        assert_eq!(decoder.stats().opens(), 1);
        assert_eq!(decoder.stats().batches(), 2);

        assert_eq!(src.cache_stats().entries, 9);
        for i in 0..9 {
            let t = i as f64 / 30.0;
            let image = src.image_for(&asset, Some(t)).unwrap();
            assert_eq!(image.pixel(0, 0), Some(SyntheticDecoder::color_at(t)));
        }
    }

    #[test]
    fn test_directory_fallback() {
        let tmp = fixture(&["images/clip.mov"]);
        let decoder = SyntheticDecoder::new(0.1);
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg").with_directory("images");

        let report = src.prepare_blocking(&asset);
        assert_eq!(report.path, Some(tmp.path().join("images").join("clip.mov")));
        assert!(src.image_for(&asset, Some(0.0)).is_some());
    }

    #[test]
    fn test_zero_duration_completes_empty() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.0);
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        let report = src.prepare_blocking(&asset);
        assert_eq!(report.requested, 0);
        assert_eq!(decoder.stats().batches(), 0);
        assert!(src.image_for(&asset, None).is_none());
    }

    #[test]
    fn test_release_drops_file() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.1);
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        src.prepare_blocking(&asset);
        assert_eq!(src.open_files(), 1);

        assert!(src.release(&asset));
        assert!(!src.release(&asset));
        assert!(src.image_for(&asset, None).is_none());

        src.prepare_blocking(&asset);
        assert_eq!(decoder.stats().opens(), 2);
    }

    #[test]
    fn test_jpeg_cache_roundtrip_close() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.1).with_size(16, 8);
        let mut s = settings(tmp.path());
        s.encoding = FrameCodec::default();
        let src = source(s, &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        src.prepare_blocking(&asset);
        let image = src.image_for(&asset, Some(0.05)).unwrap();
        assert_eq!((image.width(), image.height()), (16, 8));

        let expected = SyntheticDecoder::color_at(1.0 / 30.0);
        let got = image.pixel(3, 3).unwrap();
        for c in 0..3 {
            assert!((got[c] as i32 - expected[c] as i32).abs() <= 3, "{:?} vs {:?}", got, expected);
        }
        assert_eq!(got[3], 255);
    }

    #[test]
    fn test_cache_stats_track_lookups() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.1);
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        src.prepare_blocking(&asset);
        src.image_for(&asset, Some(0.0));
        src.image_for(&asset, Some(5.0));

        let stats = src.cache_stats();
        assert_eq!(stats.entries, 3);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.bytes, 3 * 4 * 4 * 4);
    }

    #[test]
    fn test_batch_outlives_dropped_source() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.5).with_latency(Duration::from_millis(2));
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));

        let (tx, rx) = mpsc::channel();
        src.prepare(&AssetDescriptor::new("a", "clip.jpeg"), move || tx.send(()).unwrap());
        drop(src);

        rx.recv_timeout(WAIT).unwrap();
        assert_eq!(decoder.stats().reported(), 15);
    }

    #[test]
    fn test_spawn_sizes_own_pool() {
        let tmp = fixture(&["clip.mov"]);
        let mut s = settings(tmp.path());
        s.decode_workers = 1;
        let src = VideoImageSource::spawn(s, Arc::new(SyntheticDecoder::new(0.1)), Arc::new(Inline))
            .unwrap();
        let report = src.prepare_blocking(&AssetDescriptor::new("a", "clip.jpeg"));
        assert_eq!(report.stored, 3);
    }

    /// Decoder whose `open` stalls on `slow.mov` and fails on `broken.mov`
    struct GatedOpen {
        inner: SyntheticDecoder,
        delay: Duration,
    }

    impl MediaDecoder for GatedOpen {
        fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, FrameError> {
            match path.file_name().and_then(|n| n.to_str()) {
                Some("slow.mov") => std::thread::sleep(self.delay),
                Some("broken.mov") => return Err(FrameError::LoadError("corrupt header".into())),
                _ => {}
            }
            self.inner.open(path)
        }
    }

    fn gated_source(base: &Path, delay: Duration) -> VideoImageSource {
        let decoder = GatedOpen { inner: SyntheticDecoder::new(0.2), delay };
        VideoImageSource::new(
            settings(base),
            Arc::new(decoder),
            Arc::new(Workers::new(2).unwrap()),
            Arc::new(Inline),
        )
        .unwrap()
    }

    #[test]
    fn test_slow_open_blocks_neither_prepare_nor_lookups() {
        let tmp = fixture(&["fast.mov", "slow.mov"]);
        let src = gated_source(tmp.path(), Duration::from_millis(800));
        let fast = AssetDescriptor::new("fast", "fast.jpeg");
        let slow = AssetDescriptor::new("slow", "slow.jpeg");
        src.prepare_blocking(&fast);

        let (tx, rx) = mpsc::channel();
        let started = std::time::Instant::now();
        src.prepare(&slow, move || tx.send(()).unwrap());
        assert!(started.elapsed() < Duration::from_millis(200), "prepare waited on open");

        // Opening slow.mov is in progress on a worker
        let started = std::time::Instant::now();
        assert!(src.image_for(&fast, Some(0.0)).is_some());
        assert!(src.image_for(&slow, Some(0.0)).is_none());
        assert_eq!(src.open_files(), 1);
        assert!(started.elapsed() < Duration::from_millis(200), "lookup waited on open");

        rx.recv_timeout(WAIT).unwrap();
        assert!(src.image_for(&slow, Some(0.0)).is_some());
        assert_eq!(src.open_files(), 2);
    }

    #[test]
    fn test_open_failure_completes_and_retries() {
        let tmp = fixture(&["broken.mov"]);
        let src = gated_source(tmp.path(), Duration::ZERO);
        let asset = AssetDescriptor::new("b", "broken.jpeg");

        let (tx, rx) = mpsc::channel();
        src.prepare(&asset, move || tx.send(()).unwrap());
        rx.recv_timeout(WAIT).unwrap();
        assert!(rx.try_recv().is_err());

        let report = src.prepare_blocking(&asset);
        assert_eq!(report, PrepareReport::default());
        assert_eq!(src.open_files(), 0);
        assert!(src.image_for(&asset, None).is_none());
    }

    #[test]
    fn test_frames_keyed_by_reported_time() {
        let tmp = fixture(&["clip.mov"]);
        let decoder = SyntheticDecoder::new(0.5).reversed();
        let src = source(settings(tmp.path()), &decoder, Arc::new(Inline));
        let asset = AssetDescriptor::new("a", "clip.jpeg");

        let report = src.prepare_blocking(&asset);
        assert_eq!(report.stored, 15);

        // Results arrived last-to-first; each bucket still holds its own time
        for i in 0..15 {
            let t = i as f64 / 30.0;
            let image = src.image_for(&asset, Some(t)).unwrap();
            assert_eq!(image.pixel(0, 0), Some(SyntheticDecoder::color_at(t)), "bucket {}", i);
        }
    }
}
