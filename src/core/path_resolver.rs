//! Asset name -> video file resolution
//!
//! Assets are authored against still images (`logo.jpeg`); the source plays the
//! matching video (`logo.mov`) instead. Search order:
//! 1. `base/name`
//! 2. `base/directory/name` (skipped when directory is absent or empty)
//!
//! Both found and missing results are memoized, so the filesystem is hit once per
//! `(name, directory)` for the lifetime of the resolver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::{debug, trace, warn};

type MemoKey = (String, Option<String>);

/// Memoizing resolver from `(name, directory)` to an existing video file
#[derive(Debug)]
pub struct PathResolver {
    base_dir: PathBuf,
    still_extensions: Vec<String>,
    video_extension: String,
    memo: Mutex<HashMap<MemoKey, Option<PathBuf>>>,
}

impl PathResolver {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        still_extensions: impl IntoIterator<Item = impl Into<String>>,
        video_extension: impl Into<String>,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            still_extensions: still_extensions
                .into_iter()
                .map(|e| Into::<String>::into(e).trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            video_extension: Into::<String>::into(video_extension)
                .trim_start_matches('.')
                .to_string(),
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Swap a still-image extension for the video extension.
    ///
    /// Names with any other extension (or none) are returned unchanged.
    pub fn video_name(&self, name: &str) -> String {
        let path = Path::new(name);
        let is_still = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| self.still_extensions.iter().any(|s| s.eq_ignore_ascii_case(e)))
            .unwrap_or(false);

        if is_still {
            path.with_extension(&self.video_extension)
                .to_string_lossy()
                .into_owned()
        } else {
            name.to_string()
        }
    }

    /// Existing video file for `name`, looked up under the base directory.
    pub fn resolve(&self, name: &str, directory: Option<&str>) -> Option<PathBuf> {
        let key = (name.to_string(), directory.map(str::to_string));
        if let Some(hit) = self.lock().get(&key) {
            trace!("Resolve memo hit: {} -> {:?}", name, hit);
            return hit.clone();
        }

        let resolved = self.search(name, directory);
        match &resolved {
            Some(path) => debug!("Resolved {} -> {}", name, path.display()),
            None => warn!(
                "No video for asset {} (dir {:?}) under {}",
                name,
                directory,
                self.base_dir.display()
            ),
        }

        self.lock().insert(key, resolved.clone());
        resolved
    }

    /// Memoized entries (found or not)
    pub fn memo_len(&self) -> usize {
        self.lock().len()
    }

    fn search(&self, name: &str, directory: Option<&str>) -> Option<PathBuf> {
        let file = self.video_name(name);

        let direct = self.base_dir.join(&file);
        if direct.is_file() {
            return Some(direct);
        }

        let dir = directory.filter(|d| !d.is_empty())?;
        let nested = self.base_dir.join(dir).join(&file);
        nested.is_file().then_some(nested)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MemoKey, Option<PathBuf>>> {
        self.memo.lock().unwrap_or_else(|e| e.into_inner())
    }
}
