//! Decoded bitmaps and their compressed cache representation
//!
//! **Why**: A fully decoded video at 30 fps is far too large to keep as raw RGBA.
//! Frames are encoded once when the decode batch delivers them and decoded again
//! on lookup, trading CPU at `image_for` time for a bounded memory footprint.
//!
//! **Used by**: FrameCache (storage), VideoImageSource (lookup), decoders (output)
//!
//! # Codecs
//!
//! - `FrameCodec::Raw`: no compression, lookup is a refcount bump
//! - `FrameCodec::Png`: lossless, alpha preserved
//! - `FrameCodec::Jpeg`: lossy, alpha dropped (video frames are opaque)

use std::io::Cursor;
use std::sync::Arc;

use image::{ExtendedColorType, ImageEncoder, ImageFormat, RgbaImage};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;

/// Decoded RGBA8 image, row-major, tightly packed.
///
/// Cheap to clone: the pixel buffer is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Arc<Vec<u8>>,
}

impl Bitmap {
    /// Wrap an RGBA8 buffer. Fails if the length does not match `width * height * 4`.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(FrameError::InvalidBuffer {
                expected,
                got: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels: Arc::new(pixels),
        })
    }

    /// Single-color bitmap.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut pixels = vec![0u8; width as usize * height as usize * 4];
        for px in pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels: Arc::new(pixels),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA of the pixel at (x, y), or None when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[off..off + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Memory held by the pixel buffer in bytes
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }

    fn to_rgba_image(&self) -> Result<RgbaImage, FrameError> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.as_ref().clone()).ok_or(
            FrameError::InvalidBuffer {
                expected: self.width as usize * self.height as usize * 4,
                got: self.pixels.len(),
            },
        )
    }
}

/// Storage format for cached frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum FrameCodec {
    Raw,
    Png,
    Jpeg { quality: u8 },
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::Jpeg { quality: 100 }
    }
}

impl FrameCodec {
    /// Compress a decoded bitmap into its cache form.
    pub fn encode(&self, bitmap: &Bitmap) -> Result<CachedFrame, FrameError> {
        let data = match *self {
            FrameCodec::Raw => Arc::clone(&bitmap.pixels),
            FrameCodec::Png => {
                let mut buf = Vec::new();
                PngEncoder::new(&mut buf)
                    .write_image(
                        bitmap.pixels(),
                        bitmap.width,
                        bitmap.height,
                        ExtendedColorType::Rgba8,
                    )
                    .map_err(|e| FrameError::Codec(format!("PNG encode failed: {}", e)))?;
                Arc::new(buf)
            }
            FrameCodec::Jpeg { quality } => {
                let rgb = image::DynamicImage::ImageRgba8(bitmap.to_rgba_image()?).to_rgb8();
                let mut buf = Vec::new();
                JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(|e| FrameError::Codec(format!("JPEG encode failed: {}", e)))?;
                Arc::new(buf)
            }
        };

        Ok(CachedFrame {
            codec: *self,
            width: bitmap.width,
            height: bitmap.height,
            data,
        })
    }
}

/// Encoded frame as stored in the cache. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFrame {
    codec: FrameCodec,
    width: u32,
    height: u32,
    data: Arc<Vec<u8>>,
}

impl CachedFrame {
    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size of the encoded payload in bytes
    pub fn mem(&self) -> usize {
        self.data.len()
    }

    /// Expand back into a bitmap.
    pub fn decode(&self) -> Result<Bitmap, FrameError> {
        let format = match self.codec {
            FrameCodec::Raw => {
                return Ok(Bitmap {
                    width: self.width,
                    height: self.height,
                    pixels: Arc::clone(&self.data),
                });
            }
            FrameCodec::Png => ImageFormat::Png,
            FrameCodec::Jpeg { .. } => ImageFormat::Jpeg,
        };

        let img = image::load_from_memory_with_format(&self.data, format)
            .map_err(|e| FrameError::Codec(format!("{:?} decode failed: {}", format, e)))?
            .to_rgba8();
        let (width, height) = img.dimensions();
        Bitmap::from_rgba8(width, height, img.into_raw())
    }
}

/// Frame decoding and encoding errors
#[derive(Debug)]
pub enum FrameError {
    LoadError(String),
    Decode { seconds: f64, reason: String },
    Codec(String),
    InvalidBuffer { expected: usize, got: usize },
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::LoadError(e) => write!(f, "Load error: {}", e),
            FrameError::Decode { seconds, reason } => {
                write!(f, "Decode error at {:.3}s: {}", seconds, reason)
            }
            FrameError::Codec(e) => write!(f, "Codec error: {}", e),
            FrameError::InvalidBuffer { expected, got } => {
                write!(f, "Invalid pixel buffer: expected {} bytes, got {}", expected, got)
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Encode a bitmap to PNG bytes (used by the CLI to write frames to disk)
pub fn png_bytes(bitmap: &Bitmap) -> Result<Vec<u8>, FrameError> {
    let mut buf = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(bitmap.to_rgba_image()?)
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| FrameError::Codec(format!("PNG encode failed: {}", e)))?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> Bitmap {
        let mut px = Vec::with_capacity((w * h * 4) as usize);
        for y in 0..h {
            for x in 0..w {
                px.extend_from_slice(&[(x * 16) as u8, (y * 16) as u8, 128, 200]);
            }
        }
        Bitmap::from_rgba8(w, h, px).unwrap()
    }

    #[test]
    fn test_from_rgba8_rejects_wrong_length() {
        let err = Bitmap::from_rgba8(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, FrameError::InvalidBuffer { expected: 16, got: 15 }));
    }

    #[test]
    fn test_raw_shares_buffer() {
        let bmp = gradient(4, 4);
        let cached = FrameCodec::Raw.encode(&bmp).unwrap();
        assert_eq!(cached.mem(), 64);
        assert_eq!(cached.decode().unwrap(), bmp);
    }

    #[test]
    fn test_png_is_lossless_with_alpha() {
        let bmp = gradient(8, 8);
        let cached = FrameCodec::Png.encode(&bmp).unwrap();
        assert_eq!(cached.dimensions(), (8, 8));
        assert_eq!(cached.decode().unwrap(), bmp);
    }

    #[test]
    fn test_jpeg_drops_alpha_keeps_size() {
        let bmp = Bitmap::solid(16, 16, [200, 40, 40, 255]);
        let cached = FrameCodec::Jpeg { quality: 100 }.encode(&bmp).unwrap();
        let back = cached.decode().unwrap();
        assert_eq!((back.width(), back.height()), (16, 16));

        let px = back.pixel(8, 8).unwrap();
        assert_eq!(px[3], 255);
        assert!((px[0] as i32 - 200).abs() <= 4);
        assert!((px[1] as i32 - 40).abs() <= 4);
    }

    #[test]
    fn test_png_bytes_roundtrip_dimensions() {
        let bytes = png_bytes(&gradient(3, 5)).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (3, 5));
    }
}
