//! Layer registry - binds image layers to the active image source
//!
//! **Why**: A composition has many layers that draw image assets, and the
//! source of those images can change at runtime (stills -> video, or a
//! reloaded source). The registry owns that binding so layers never talk to a
//! source directly.
//!
//! Flow: layer -> asset id -> `AssetCatalog` -> descriptor -> `ImageProvider`
//! -> bitmap (or blank) -> `ImageLayer::set_image`.
//!
//! **Used by**: the host render loop (`refresh(Some(t))` per tick), prepare
//! completions (`refresh` once frames are ready)

use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::entities::asset::AssetCatalog;
use crate::entities::traits::{ImageLayer, ImageProvider};

/// Registry of image layers and the provider feeding them.
pub struct LayerRegistry {
    catalog: Arc<AssetCatalog>,
    source: Mutex<Arc<dyn ImageProvider>>,
    layers: Mutex<Vec<Arc<dyn ImageLayer>>>,
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("assets", &self.catalog.len())
            .field("bound", &self.bound_count())
            .finish()
    }
}

impl LayerRegistry {
    /// Registry over `catalog`, fed by `source`.
    pub fn new(catalog: impl Into<Arc<AssetCatalog>>, source: Arc<dyn ImageProvider>) -> Self {
        let catalog = catalog.into();
        debug!("LayerRegistry created ({} assets)", catalog.len());
        Self {
            catalog,
            source: Mutex::new(source),
            layers: Mutex::new(Vec::new()),
        }
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Register layers whose asset id is in the catalog; others are skipped.
    ///
    /// Returns how many were bound. Binding does not push an image.
    pub fn bind(&self, layers: impl IntoIterator<Item = Arc<dyn ImageLayer>>) -> usize {
        let mut bound = self.lock_layers();
        let mut added = 0;
        for layer in layers {
            if self.catalog.contains(layer.asset_id()) {
                bound.push(layer);
                added += 1;
            } else {
                debug!("Layer skipped, unknown asset: {}", layer.asset_id());
            }
        }
        trace!("Bound {} layers ({} total)", added, bound.len());
        added
    }

    /// Replace the active source, then refresh every layer once (no time).
    pub fn set_image_source(&self, source: Arc<dyn ImageProvider>) {
        *self.source.lock().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&source);
        source.on_source_replaced();
        debug!("Image source replaced");
        self.refresh(None);
    }

    /// Push the current image of every bound layer (`at_seconds` None lets
    /// the source pick its default time).
    pub fn refresh(&self, at_seconds: Option<f64>) {
        // Snapshot so providers and layers run without our locks held
        let source = self.image_source();
        let layers: Vec<Arc<dyn ImageLayer>> = self.lock_layers().clone();

        for layer in &layers {
            let image = self
                .catalog
                .get(layer.asset_id())
                .and_then(|asset| source.image_for(asset, at_seconds));
            layer.set_image(image);
        }
        trace!("Refreshed {} layers at {:?}", layers.len(), at_seconds);
    }

    pub fn bound_count(&self) -> usize {
        self.lock_layers().len()
    }

    /// Active source
    pub fn image_source(&self) -> Arc<dyn ImageProvider> {
        Arc::clone(&self.source.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn lock_layers(&self) -> std::sync::MutexGuard<'_, Vec<Arc<dyn ImageLayer>>> {
        self.layers.lock().unwrap_or_else(|e| e.into_inner())
    }
}
