//! Core engine modules - decode workers, completions, caches, sources
//!
//! These modules form the playback-time image pipeline, independent of any
//! renderer.

pub mod completion;
pub mod frame_cache;
pub mod layer_registry;
pub mod path_resolver;
pub mod video_source;
pub mod workers;

// Re-exports for convenience
pub use completion::{CompletionContext, Inline, MainQueue};
pub use frame_cache::{CacheStats, FrameCache};
pub use layer_registry::LayerRegistry;
pub use path_resolver::PathResolver;
pub use video_source::VideoImageSource;
pub use workers::Workers;
