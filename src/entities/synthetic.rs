//! Procedural decoder - deterministic frames without a media library
//!
//! Every frame is a solid color derived from its timestamp (milliseconds packed
//! into R/G/B), so a cached frame can be traced back to the time it was decoded
//! for. Counters record how the decode capability was driven, which makes it
//! the instrumented stand-in for tests and the CLI `--synthetic` mode.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use log::trace;

use super::frame::{Bitmap, FrameError};
use super::traits::{DecodeSession, MediaDecoder};

/// Counters shared by a decoder and all sessions it opened
#[derive(Debug, Default)]
pub struct DecoderStats {
    opens: AtomicU64,
    batches: AtomicU64,
    reported: AtomicU64,
    failed: AtomicU64,
}

impl DecoderStats {
    /// Sessions opened
    pub fn opens(&self) -> u64 {
        self.opens.load(Ordering::SeqCst)
    }

    /// `generate` calls
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// Per-timestamp results delivered (success or failure)
    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::SeqCst)
    }

    /// Per-timestamp failures delivered
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
struct Params {
    duration: f64,
    width: u32,
    height: u32,
    fail_at: Vec<f64>,
    latency: Duration,
    reverse: bool,
}

/// Decoder producing solid-color frames encoding their timestamp.
#[derive(Debug, Clone)]
pub struct SyntheticDecoder {
    params: Params,
    stats: Arc<DecoderStats>,
}

impl SyntheticDecoder {
    /// Decoder whose every file lasts `duration` seconds.
    pub fn new(duration: f64) -> Self {
        Self {
            params: Params {
                duration,
                width: 4,
                height: 4,
                fail_at: Vec::new(),
                latency: Duration::ZERO,
                reverse: false,
            },
            stats: Arc::new(DecoderStats::default()),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.params.width = width;
        self.params.height = height;
        self
    }

    /// Report a failure for these timestamps instead of a frame.
    pub fn with_failures(mut self, times: impl IntoIterator<Item = f64>) -> Self {
        self.params.fail_at = times.into_iter().collect();
        self
    }

    /// Sleep this long before delivering each frame.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.params.latency = latency;
        self
    }

    /// Deliver results in reverse request order.
    pub fn reversed(mut self) -> Self {
        self.params.reverse = true;
        self
    }

    pub fn stats(&self) -> Arc<DecoderStats> {
        Arc::clone(&self.stats)
    }

    /// Color of the frame generated for `seconds`
    pub fn color_at(seconds: f64) -> [u8; 4] {
        let ms = (seconds * 1000.0).round().max(0.0) as u32;
        [(ms >> 8) as u8, ms as u8, (ms >> 16) as u8, 255]
    }
}

impl MediaDecoder for SyntheticDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, FrameError> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        trace!("Synthetic session opened: {}", path.display());
        Ok(Box::new(SyntheticSession {
            params: self.params.clone(),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct SyntheticSession {
    params: Params,
    stats: Arc<DecoderStats>,
}

impl DecodeSession for SyntheticSession {
    fn duration_secs(&self) -> f64 {
        self.params.duration
    }

    fn generate(
        &mut self,
        times: &[f64],
        tolerance: f64,
        sink: &mut dyn FnMut(f64, Result<Bitmap, FrameError>),
    ) {
        self.stats.batches.fetch_add(1, Ordering::SeqCst);

        let mut order: Vec<f64> = times.to_vec();
        if self.params.reverse {
            order.reverse();
        }

        for t in order {
            if !self.params.latency.is_zero() {
                thread::sleep(self.params.latency);
            }

            let failed = self.params.fail_at.iter().any(|f| (f - t).abs() < 1e-6);
            let result = if failed {
                Err(FrameError::Decode {
                    seconds: t,
                    reason: "synthetic failure".to_string(),
                })
            } else if t < 0.0 || t > self.params.duration + tolerance {
                Err(FrameError::Decode {
                    seconds: t,
                    reason: "past end of stream".to_string(),
                })
            } else {
                Ok(Bitmap::solid(
                    self.params.width,
                    self.params.height,
                    SyntheticDecoder::color_at(t),
                ))
            };

            if result.is_err() {
                self.stats.failed.fetch_add(1, Ordering::SeqCst);
            }
            self.stats.reported.fetch_add(1, Ordering::SeqCst);
            sink(t, result);
        }
    }
}
