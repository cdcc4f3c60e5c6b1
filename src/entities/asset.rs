//! Asset descriptors and the read-only catalog that maps ids to them.
//!
//! The catalog doubles as the manifest for still and video-backed assets:
//! a descriptor exported as `frame.jpeg` is resolved to `frame.mov` by the
//! video source (see `core::path_resolver`).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// One image or video-backed asset referenced by animation layers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetDescriptor {
    pub id: String,
    /// File name as exported (e.g. `img_0.jpeg`)
    pub name: String,
    /// Optional subdirectory relative to the source's base directory
    #[serde(default)]
    pub directory: Option<String>,
}

impl AssetDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            directory: None,
        }
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }
}

/// Immutable `id -> descriptor` map, built once per composition.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: HashMap<String, AssetDescriptor>,
}

// Lottie JSON: image assets carry `p` (file) and optional `u` (directory);
// precomp assets carry `layers` instead and are skipped.
#[derive(Deserialize)]
struct LottieAsset {
    id: String,
    #[serde(default)]
    p: Option<String>,
    #[serde(default)]
    u: Option<String>,
}

#[derive(Deserialize)]
struct LottieDocument {
    #[serde(default)]
    assets: Vec<LottieAsset>,
}

impl AssetCatalog {
    /// Build from descriptors. Later duplicates replace earlier ones.
    pub fn new(descriptors: impl IntoIterator<Item = AssetDescriptor>) -> Self {
        let mut assets = HashMap::new();
        for desc in descriptors {
            if let Some(prev) = assets.insert(desc.id.clone(), desc) {
                warn!("Duplicate asset id '{}' in catalog, keeping last", prev.id);
            }
        }
        Self { assets }
    }

    /// Parse the `assets` array of a Lottie animation document.
    ///
    /// Embedded (`data:`) images and precompositions have no file to resolve
    /// and are left out.
    pub fn from_lottie_json(json: &str) -> Result<Self> {
        let doc: LottieDocument =
            serde_json::from_str(json).context("Failed to parse animation JSON")?;

        let descriptors = doc.assets.into_iter().filter_map(|a| {
            let name = a.p?;
            if name.starts_with("data:") {
                debug!("Skipping embedded asset '{}'", a.id);
                return None;
            }
            let directory = a.u.filter(|u| !u.is_empty());
            Some(AssetDescriptor {
                id: a.id,
                name,
                directory,
            })
        });

        let catalog = Self::new(descriptors);
        debug!("Asset catalog loaded: {} image assets", catalog.len());
        Ok(catalog)
    }

    /// Read and parse a Lottie animation file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read animation: {}", path.display()))?;
        Self::from_lottie_json(&json)
            .with_context(|| format!("Invalid animation: {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<&AssetDescriptor> {
        self.assets.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.assets.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lottie_assets_parse() {
        let json = r#"{
            "v": "5.5.2", "fr": 30, "ip": 0, "op": 90, "w": 512, "h": 512,
            "assets": [
                {"id": "image_0", "w": 512, "h": 512, "u": "images/", "p": "img_0.jpeg", "e": 0},
                {"id": "image_1", "w": 64, "h": 64, "u": "", "p": "img_1.jpeg"},
                {"id": "inline", "w": 1, "h": 1, "p": "data:image/png;base64,AAAA", "e": 1},
                {"id": "comp_0", "layers": []}
            ],
            "layers": []
        }"#;

        let catalog = AssetCatalog::from_lottie_json(json).unwrap();
        assert_eq!(catalog.len(), 2);

        let a = catalog.get("image_0").unwrap();
        assert_eq!(a.name, "img_0.jpeg");
        assert_eq!(a.directory.as_deref(), Some("images/"));

        // Empty `u` collapses to no directory
        assert_eq!(catalog.get("image_1").unwrap().directory, None);
        assert!(!catalog.contains("inline"));
        assert!(!catalog.contains("comp_0"));
    }

    #[test]
    fn test_duplicate_ids_keep_last() {
        let catalog = AssetCatalog::new([
            AssetDescriptor::new("a", "first.jpeg"),
            AssetDescriptor::new("a", "second.jpeg"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("a").unwrap().name, "second.jpeg");
    }

    #[test]
    fn test_missing_assets_array_is_empty() {
        let catalog = AssetCatalog::from_lottie_json(r#"{"layers": []}"#).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_invalid_json_errors() {
        assert!(AssetCatalog::from_lottie_json("{not json").is_err());
    }
}
