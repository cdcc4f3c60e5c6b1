//! Abstract traits at the seams between the cache and its collaborators.
//!
//! The animation engine sees `ImageProvider` and `ImageLayer`; the video source
//! sees `MediaDecoder` and `DecodeSession`. Implementations live in `core/`
//! (video source), `entities/layer.rs` (slots) and the decoder modules.

use std::path::Path;
use std::sync::Arc;

use super::asset::AssetDescriptor;
use super::frame::{Bitmap, FrameError};

/// Capability a layer registry queries for the bitmap of an asset at a time.
pub trait ImageProvider: Send + Sync {
    /// Bitmap for `asset` at `seconds` (source default when None).
    ///
    /// Must not block on decoding. None means "no image available", whether
    /// not ready yet or permanently missing.
    fn image_for(&self, asset: &AssetDescriptor, seconds: Option<f64>) -> Option<Bitmap>;

    /// Called once when this provider becomes the active source of a registry,
    /// right before the registry refreshes its layers.
    fn on_source_replaced(&self) {}
}

/// Composition layer that displays one image asset.
pub trait ImageLayer: Send + Sync {
    /// Asset id this layer references
    fn asset_id(&self) -> &str;

    /// Push the image to draw on the next paint (None = blank).
    fn set_image(&self, image: Option<Bitmap>);
}

/// Media decode capability: opens decode sessions on video files.
pub trait MediaDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, FrameError>;
}

/// Open decode session bound to one file.
pub trait DecodeSession: Send {
    /// Total duration of the video stream in seconds
    fn duration_secs(&self) -> f64;

    /// Decode a frame for each requested time.
    ///
    /// `sink` receives `(requested_time, result)` exactly once per entry of
    /// `times`, in any order. `tolerance` is the accepted distance in seconds
    /// between the requested time and the presented frame.
    fn generate(
        &mut self,
        times: &[f64],
        tolerance: f64,
        sink: &mut dyn FnMut(f64, Result<Bitmap, FrameError>),
    );
}

/// Blanket impl: Arc<T> implements traits if T does
impl<T: ImageProvider + ?Sized> ImageProvider for Arc<T> {
    fn image_for(&self, asset: &AssetDescriptor, seconds: Option<f64>) -> Option<Bitmap> {
        (**self).image_for(asset, seconds)
    }

    fn on_source_replaced(&self) {
        (**self).on_source_replaced()
    }
}

impl<T: MediaDecoder + ?Sized> MediaDecoder for Arc<T> {
    fn open(&self, path: &Path) -> Result<Box<dyn DecodeSession>, FrameError> {
        (**self).open(path)
    }
}

impl<T: ImageLayer + ?Sized> ImageLayer for Arc<T> {
    fn asset_id(&self) -> &str {
        (**self).asset_id()
    }

    fn set_image(&self, image: Option<Bitmap>) {
        (**self).set_image(image)
    }
}
