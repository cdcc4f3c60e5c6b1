//! flipbook - video-backed image provider for vector animation playback
//!
//! Re-exports the modules used by the binary and by hosts embedding the cache.

// Core engine (workers, completions, caches, sources)
pub mod core;

pub mod cli;
pub mod config;
pub mod entities;
pub mod paths;

// Re-export commonly used types from core
pub use crate::core::completion::{Completion, CompletionContext, Inline, MainQueue};
pub use crate::core::frame_cache::{CacheStatsSnapshot, FrameCache};
pub use crate::core::layer_registry::LayerRegistry;
pub use crate::core::video_source::{PrepareReport, VideoImageSource};
pub use crate::core::workers::Workers;

pub use config::{SourceError, SourceSettings};

// Re-export entities
pub use entities::{
    AssetCatalog, AssetDescriptor, Bitmap, CachedFrame, FrameCodec, FrameError, ImageLayer,
    ImageProvider, ImageSlot, MediaDecoder, SyntheticDecoder,
};
