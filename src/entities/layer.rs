//! Image slot - the layer-side end of the image pipeline
//!
//! Holds the latest bitmap pushed by a `LayerRegistry`; the renderer reads it
//! on its next paint. Pushes may come from any thread.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::frame::Bitmap;
use super::traits::ImageLayer;

/// Image layer backed by a mutex-guarded bitmap slot
#[derive(Debug)]
pub struct ImageSlot {
    asset_id: String,
    image: Mutex<Option<Bitmap>>,
    pushes: AtomicU64,
}

impl ImageSlot {
    pub fn new(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            image: Mutex::new(None),
            pushes: AtomicU64::new(0),
        }
    }

    /// Current image (None = blank)
    pub fn image(&self) -> Option<Bitmap> {
        self.image.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of times an image (or blank) was pushed onto this slot
    pub fn push_count(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }
}

impl ImageLayer for ImageSlot {
    fn asset_id(&self) -> &str {
        &self.asset_id
    }

    fn set_image(&self, image: Option<Bitmap>) {
        *self.image.lock().unwrap_or_else(|e| e.into_inner()) = image;
        self.pushes.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_starts_blank() {
        let slot = ImageSlot::new("image_0");
        assert_eq!(slot.asset_id(), "image_0");
        assert!(slot.image().is_none());
        assert_eq!(slot.push_count(), 0);
    }

    #[test]
    fn test_set_image_counts_blank_pushes() {
        let slot = ImageSlot::new("a");
        slot.set_image(Some(Bitmap::solid(1, 1, [1, 2, 3, 255])));
        assert_eq!(slot.image().unwrap().pixel(0, 0), Some([1, 2, 3, 255]));

        slot.set_image(None);
        assert!(slot.image().is_none());
        assert_eq!(slot.push_count(), 2);
    }
}
