//! Decoder handle - one open decode session per resolved video file
//!
//! **Why**: Opening a container and probing its streams is the expensive part of
//! decoding; the handle keeps that work to once per file for the lifetime of the
//! video source.
//!
//! **Used by**: VideoImageSource (creates, one per path), decode batches on
//! worker threads (share via Arc, outlive the source if still in flight)

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::debug;

use super::frame::{Bitmap, FrameError};
use super::traits::{DecodeSession, MediaDecoder};

/// Guards against float drift when `duration * fps` lands just above an integer
const FRAME_EPSILON: f64 = 1e-9;

/// Live decode session bound to one file
pub struct DecoderHandle {
    path: PathBuf,
    duration: f64,
    session: Mutex<Box<dyn DecodeSession>>,
}

impl std::fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("path", &self.path)
            .field("duration", &self.duration)
            .finish()
    }
}

impl DecoderHandle {
    /// Open a session on `path` through the media decode capability.
    pub fn open(decoder: &dyn MediaDecoder, path: &Path) -> Result<Self, FrameError> {
        let session = decoder.open(path)?;
        let duration = session.duration_secs();
        debug!("Decoder opened: {} ({:.3}s)", path.display(), duration);

        Ok(Self {
            path: path.to_path_buf(),
            duration,
            session: Mutex::new(session),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration
    }

    /// Timestamps covering the whole file at `fps`: `i / fps` for
    /// `i in 0..ceil(duration * fps)`.
    pub fn frame_times(&self, fps: u32) -> Vec<f64> {
        frame_times(self.duration, fps)
    }

    /// Decode `times` as one batch. `sink` sees every requested time exactly once.
    ///
    /// Overlapping batches on the same handle run one after another.
    pub fn decode_batch(
        &self,
        times: &[f64],
        tolerance: f64,
        sink: &mut dyn FnMut(f64, Result<Bitmap, FrameError>),
    ) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.generate(times, tolerance, sink);
    }
}

/// See [`DecoderHandle::frame_times`]
pub fn frame_times(duration: f64, fps: u32) -> Vec<f64> {
    if fps == 0 || !duration.is_finite() || duration <= 0.0 {
        return Vec::new();
    }
    let fps = f64::from(fps);
    let count = (duration * fps - FRAME_EPSILON).ceil().max(0.0) as usize;
    (0..count).map(|i| i as f64 / fps).collect()
}
