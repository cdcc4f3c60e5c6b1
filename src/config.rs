//! Video source settings
//!
//! Loaded from `flipbook.json` (see `paths`), every field optional. CLI flags are
//! applied on top by the binary. `validate()` is the gate `VideoImageSource::new`
//! runs before building anything.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::entities::frame::FrameCodec;
use crate::paths::{PathConfig, SETTINGS_FILE, config_file};

/// Configuration for a video-backed image source
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Decode rate and cache quantization (frames per second)
    pub fps: u32,
    /// Root all asset names are resolved against
    pub base_dir: PathBuf,
    /// Accepted distance between requested and presented frame, seconds
    pub tolerance_secs: f64,
    /// Extensions replaced by `video_extension` during resolution
    pub still_extensions: Vec<String>,
    pub video_extension: String,
    /// How frames are stored in the cache
    pub encoding: FrameCodec,
    /// Decode threads, 0 = auto
    pub decode_workers: usize,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            base_dir: PathBuf::from("."),
            tolerance_secs: 0.0,
            still_extensions: vec!["jpeg".to_string(), "jpg".to_string()],
            video_extension: "mov".to_string(),
            encoding: FrameCodec::default(),
            decode_workers: 0,
        }
    }
}

impl SourceSettings {
    /// Check values a source cannot run with.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.fps == 0 {
            return Err(SourceError::InvalidFps(self.fps));
        }
        if !self.tolerance_secs.is_finite() || self.tolerance_secs < 0.0 {
            return Err(SourceError::InvalidTolerance(self.tolerance_secs));
        }
        if self.video_extension.trim_start_matches('.').is_empty() {
            return Err(SourceError::InvalidExtension(self.video_extension.clone()));
        }
        if let FrameCodec::Jpeg { quality } = self.encoding
            && !(1..=100).contains(&quality)
        {
            return Err(SourceError::InvalidQuality(quality));
        }
        Ok(())
    }

    /// Parse settings from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        debug!("Settings loaded from {}", path.display());
        Ok(settings)
    }

    /// Load `flipbook.json` from the configured directory, defaults if absent.
    pub fn load_or_default(paths: &PathConfig) -> Result<Self> {
        let path = config_file(SETTINGS_FILE, paths);
        if path.is_file() {
            Self::load(&path)
        } else {
            info!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}

/// Source construction error
#[derive(Debug)]
pub enum SourceError {
    InvalidFps(u32),
    InvalidTolerance(f64),
    InvalidExtension(String),
    InvalidQuality(u8),
    Workers(std::io::Error),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::InvalidFps(fps) => write!(f, "fps must be positive, got {}", fps),
            SourceError::InvalidTolerance(t) => {
                write!(f, "tolerance must be finite and non-negative, got {}", t)
            }
            SourceError::InvalidExtension(ext) => write!(f, "invalid video extension: {:?}", ext),
            SourceError::InvalidQuality(q) => write!(f, "JPEG quality must be 1-100, got {}", q),
            SourceError::Workers(e) => write!(f, "failed to start decode workers: {}", e),
        }
    }
}

impl std::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SourceError::Workers(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Workers(e)
    }
}
