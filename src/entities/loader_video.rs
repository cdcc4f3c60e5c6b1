//! Video decoder - FFmpeg-based frame generation (feature `ffmpeg`)
//!
//! One forward pass per batch: requested times are sorted, packets are decoded
//! in order, and each requested time receives the frame on screen at that time
//! (last frame with `pts <= t + tolerance`). Times past the last frame fail.
//!
//! The demuxer stays open for the life of the session; later batches seek
//! back to the start instead of reopening and re-probing the file.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Once;

use log::{debug, warn};
use playa_ffmpeg as ffmpeg;

use super::frame::{Bitmap, FrameError};
use super::traits::{DecodeSession, MediaDecoder};

static FFMPEG_INIT: Once = Once::new();

fn init_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            warn!("FFmpeg init failed: {}", e);
        }
        // Silence FFmpeg's own stderr output, we log through `log`
        unsafe {
            ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_QUIET);
        }
    });
}

/// Media decode capability backed by FFmpeg
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegDecoder;

impl MediaDecoder for FfmpegDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, FrameError> {
        init_ffmpeg();
        Ok(Box::new(FfmpegSession::open(path)?))
    }
}

fn open_input(path: &Path) -> Result<ffmpeg::format::context::Input, FrameError> {
    ffmpeg::format::input(path).map_err(|e| FrameError::LoadError(format!("Failed to open video: {}", e)))
}

/// Demuxer opened once per file; every batch rewinds it to the start
struct OpenInput(ffmpeg::format::context::Input);

// The session only runs behind its handle's mutex, one batch at a time
unsafe impl Send for OpenInput {}

struct FfmpegSession {
    path: PathBuf,
    input: OpenInput,
    stream_idx: usize,
    /// Seconds per pts tick
    tb: f64,
    duration: f64,
    batches: usize,
}

impl FfmpegSession {
    fn open(path: &Path) -> Result<Self, FrameError> {
        let ictx = open_input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| FrameError::LoadError("No video stream found".to_string()))?;
        let stream_idx = stream.index();
        let time_base = stream.time_base();
        let tb = time_base.numerator() as f64 / time_base.denominator() as f64;
        let stream_secs = stream.duration() as f64 * tb;

        // Some containers leave the stream duration unset, fall back to the container's
        let duration = if stream.duration() > 0 && stream_secs.is_finite() {
            stream_secs
        } else {
            ictx.duration().max(0) as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        };

        debug!("Opened {}: stream {}, {:.3}s", path.display(), stream_idx, duration);
        Ok(Self {
            path: path.to_path_buf(),
            input: OpenInput(ictx),
            stream_idx,
            tb,
            duration,
            batches: 0,
        })
    }

    /// Put the demuxer back at the first packet, reopening the file if seeking fails
    fn rewind(&mut self) -> Result<(), FrameError> {
        let seek_ret = unsafe {
            ffmpeg::ffi::av_seek_frame(
                self.input.0.as_mut_ptr(),
                self.stream_idx as i32,
                0,
                ffmpeg::ffi::AVSEEK_FLAG_BACKWARD,
            )
        };
        if seek_ret < 0 {
            warn!("Video seek failed (ret={}), reopening {}", seek_ret, self.path.display());
            self.input = OpenInput(open_input(&self.path)?);
        }
        Ok(())
    }
}

impl DecodeSession for FfmpegSession {
    fn duration_secs(&self) -> f64 {
        self.duration
    }

    fn generate(
        &mut self,
        times: &[f64],
        tolerance: f64,
        sink: &mut dyn FnMut(f64, Result<Bitmap, FrameError>),
    ) {
        let mut pending: Vec<f64> = times.to_vec();
        pending.sort_by(|a, b| a.total_cmp(b));
        let mut pending: VecDeque<f64> = pending.into();

        if let Err(e) = self.decode_pass(&mut pending, tolerance, sink) {
            warn!("Video decode aborted for {}: {}", self.path.display(), e);
        }

        // Whatever is left never got a frame
        for t in pending {
            sink(
                t,
                Err(FrameError::Decode {
                    seconds: t,
                    reason: "no frame at requested time".to_string(),
                }),
            );
        }
    }
}

impl FfmpegSession {
    fn decode_pass(
        &mut self,
        pending: &mut VecDeque<f64>,
        tolerance: f64,
        sink: &mut dyn FnMut(f64, Result<Bitmap, FrameError>),
    ) -> Result<(), FrameError> {
        if self.batches > 0 {
            self.rewind()?;
        }
        self.batches += 1;

        let stream_idx = self.stream_idx;
        let tb = self.tb;
        let duration = self.duration;
        let ictx = &mut self.input.0;

        let stream = ictx
            .stream(stream_idx)
            .ok_or_else(|| FrameError::LoadError("Video stream disappeared".to_string()))?;
        let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| FrameError::LoadError(format!("Failed to create decoder context: {}", e)))?;
        let mut decoder = decoder_ctx
            .decoder()
            .video()
            .map_err(|e| FrameError::LoadError(format!("Failed to create video decoder: {}", e)))?;

        let width = decoder.width();
        let height = decoder.height();
        let mut scaler = ffmpeg::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg::format::Pixel::RGBA,
            width,
            height,
            ffmpeg::software::scaling::Flags::BILINEAR,
        )
        .map_err(|e| FrameError::LoadError(format!("Failed to create scaler: {}", e)))?;

        let mut to_bitmap = |frame: &ffmpeg::util::frame::video::Video| -> Result<Bitmap, FrameError> {
            let mut rgba = ffmpeg::util::frame::video::Video::empty();
            scaler
                .run(frame, &mut rgba)
                .map_err(|e| FrameError::LoadError(format!("Failed to scale frame: {}", e)))?;

            let data = rgba.data(0);
            let stride = rgba.stride(0);
            let row_bytes = width as usize * 4;
            let mut out = vec![0u8; row_bytes * height as usize];
            for y in 0..height as usize {
                out[y * row_bytes..(y + 1) * row_bytes]
                    .copy_from_slice(&data[y * stride..y * stride + row_bytes]);
            }
            Bitmap::from_rgba8(width, height, out)
        };

        // Frame currently "on screen" while walking the stream
        let mut shown: Option<(f64, ffmpeg::util::frame::video::Video)> = None;
        let mut frames = 0usize;

        let mut on_frame = |decoded: ffmpeg::util::frame::video::Video,
                            pending: &mut VecDeque<f64>,
                            shown: &mut Option<(f64, ffmpeg::util::frame::video::Video)>|
         -> Result<(), FrameError> {
            let pts = decoded.timestamp().or(decoded.pts()).unwrap_or(0) as f64 * tb;
            // Every pending time before this frame's presentation belongs to the previous frame
            while let Some(&t) = pending.front() {
                if pts <= t + tolerance {
                    break;
                }
                pending.pop_front();
                match shown.as_ref() {
                    Some((_, prev)) => sink(t, to_bitmap(prev)),
                    None => sink(t, to_bitmap(&decoded)),
                }
            }
            *shown = Some((pts, decoded));
            Ok(())
        };

        for (stream, packet) in ictx.packets() {
            if pending.is_empty() {
                break;
            }
            if stream.index() != stream_idx {
                continue;
            }
            decoder
                .send_packet(&packet)
                .map_err(|e| FrameError::LoadError(format!("Failed to send packet: {}", e)))?;

            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                frames += 1;
                on_frame(decoded.clone(), pending, &mut shown)?;
            }
        }

        if !pending.is_empty() {
            decoder.send_eof().ok();
            let mut decoded = ffmpeg::util::frame::video::Video::empty();
            while decoder.receive_frame(&mut decoded).is_ok() {
                frames += 1;
                on_frame(decoded.clone(), pending, &mut shown)?;
            }
        }

        // Tail: the last frame stays on screen until the end of the stream
        if let Some((_, last)) = shown.as_ref() {
            while let Some(&t) = pending.front() {
                if t > duration + tolerance {
                    break;
                }
                pending.pop_front();
                sink(t, to_bitmap(last));
            }
        }

        debug!(
            "Decoded {} frames from {} ({} times unresolved, batch {})",
            frames,
            self.path.display(),
            pending.len(),
            self.batches
        );
        Ok(())
    }
}
