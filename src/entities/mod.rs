//! Entities module - data types and the traits at the pipeline's seams
//!
//! Assets and layers on the animation side, bitmaps and decoders on the video
//! side. Nothing here schedules work; see `core` for that.

pub mod asset;
pub mod decoder;
pub mod frame;
pub mod layer;
#[cfg(feature = "ffmpeg")]
pub mod loader_video;
pub mod synthetic;
pub mod traits;

pub use asset::{AssetCatalog, AssetDescriptor};
pub use decoder::DecoderHandle;
pub use frame::{Bitmap, CachedFrame, FrameCodec, FrameError};
pub use layer::ImageSlot;
#[cfg(feature = "ffmpeg")]
pub use loader_video::FfmpegDecoder;
pub use synthetic::SyntheticDecoder;
pub use traits::{DecodeSession, ImageLayer, ImageProvider, MediaDecoder};
