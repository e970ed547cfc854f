//! The header cache shared by compilation sessions.
//!
//! The cache holds an ordered list of search directories and a map from
//! virtual header path to file contents. Once [`HeaderCache::set_valid`] is
//! called it is frozen: discovery is skipped and the stored paths and files
//! are re-injected verbatim into every later compile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use crate::error::HeaderError;

/// A header cache shared between sessions.
///
/// Holding the lock across discovery serializes first-use population.
pub type SharedHeaderCache = Arc<Mutex<HeaderCache>>;

static GLOBAL_CACHE: OnceLock<SharedHeaderCache> = OnceLock::new();

/// Whether a search directory holds system or user headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SearchKind {
    /// Passed as `-isystem`; warnings inside are suppressed.
    System,
    /// Passed as `-I`.
    User,
}

/// One header search directory. Earlier entries take precedence.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeaderSearchEntry {
    /// The directory searched for headers.
    pub path: PathBuf,
    /// How the directory is handed to the frontend.
    pub kind: SearchKind,
}

/// Discovered header search paths and in-memory header contents.
#[derive(Debug, Default)]
pub struct HeaderCache {
    include_paths: Vec<HeaderSearchEntry>,
    header_map: BTreeMap<PathBuf, Arc<[u8]>>,
    valid: bool,
    scan_count: usize,
    overlay: Option<tempfile::TempDir>,
}

impl HeaderCache {
    /// Creates an empty, not yet valid cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the process-wide cache used by sessions that are not given one.
    pub fn global() -> SharedHeaderCache {
        GLOBAL_CACHE
            .get_or_init(|| Arc::new(Mutex::new(HeaderCache::new())))
            .clone()
    }

    /// Creates an independent cache for callers that need isolation.
    pub fn isolated() -> SharedHeaderCache {
        Arc::new(Mutex::new(HeaderCache::new()))
    }

    /// Registers a system header search directory. Repeated paths are ignored.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) {
        self.add_entry(path, SearchKind::System);
    }

    /// Registers a search directory with an explicit kind.
    ///
    /// A path already present keeps its original position and kind.
    pub fn add_entry(&mut self, path: impl Into<PathBuf>, kind: SearchKind) {
        let path = path.into();
        if self.include_paths.iter().any(|e| e.path == path) {
            return;
        }
        self.include_paths.push(HeaderSearchEntry { path, kind });
    }

    /// Registers an in-memory file under a virtual path.
    ///
    /// Ignored once the cache is valid; cached files are read-only from then on.
    pub fn add_file(&mut self, virtual_path: impl Into<PathBuf>, content: impl Into<Arc<[u8]>>) {
        if self.valid {
            tracing::warn!("header cache is frozen; ignoring late file");
            return;
        }
        self.header_map.insert(virtual_path.into(), content.into());
    }

    /// Returns `true` once population has completed.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Marks the cache as populated. There is no way to clear the latch.
    pub fn set_valid(&mut self) {
        self.valid = true;
    }

    /// Returns the search directories in precedence order.
    pub fn include_paths(&self) -> &[HeaderSearchEntry] {
        &self.include_paths
    }

    /// Returns the cached files keyed by virtual path.
    pub fn header_map(&self) -> &BTreeMap<PathBuf, Arc<[u8]>> {
        &self.header_map
    }

    /// Returns how many filesystem scans have populated this cache.
    pub fn scan_count(&self) -> usize {
        self.scan_count
    }

    pub(crate) fn record_scan(&mut self) {
        self.scan_count += 1;
    }

    /// Writes the cached files into a scratch directory the frontend can read.
    ///
    /// A virtual path `/usr/include/stdio.h` lands at
    /// `<root>/usr/include/stdio.h`. The overlay is written once and reused
    /// for the lifetime of the cache. Returns `None` when no files are cached.
    pub fn overlay_root(&mut self) -> Result<Option<&Path>, HeaderError> {
        if !self.valid {
            return Err(HeaderError::NotValid);
        }
        if self.header_map.is_empty() {
            return Ok(None);
        }
        if self.overlay.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("kernjit-headers-")
                .tempdir()
                .map_err(|e| HeaderError::Io {
                    path: std::env::temp_dir(),
                    source: e,
                })?;
            for (virtual_path, content) in &self.header_map {
                let target = dir.path().join(relative_to_root(virtual_path));
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| HeaderError::Io {
                        path: parent.to_path_buf(),
                        source: e,
                    })?;
                }
                std::fs::write(&target, content).map_err(|e| HeaderError::Io {
                    path: target.clone(),
                    source: e,
                })?;
            }
            tracing::debug!(
                root = %dir.path().display(),
                files = self.header_map.len(),
                "materialized header overlay"
            );
            self.overlay = Some(dir);
        }
        Ok(self.overlay.as_ref().map(|d| d.path()))
    }

    /// Maps a search directory to its location inside the overlay, if one exists.
    pub fn overlay_path(&self, path: &Path) -> Option<PathBuf> {
        self.overlay
            .as_ref()
            .map(|d| d.path().join(relative_to_root(path)))
    }
}

/// Strips the root so an absolute path can be joined under another directory.
fn relative_to_root(path: &Path) -> &Path {
    path.strip_prefix("/").unwrap_or(path)
}
