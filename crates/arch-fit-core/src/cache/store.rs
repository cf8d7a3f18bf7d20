//! Persistent per-file validation cache.

use super::entry::CacheEntry;
use crate::constraints::matching::slash_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const FORMAT_VERSION: u32 = 1;

/// Errors reading or writing the cache file.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error on the cache file.
    #[error("Cache I/O failed for {path}: {source}")]
    Io {
        /// Cache file path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Serialization error.
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    fingerprint: String,
    entries: BTreeMap<String, CacheEntry>,
}

/// Hit/miss counters and size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Stored entries.
    pub entries: usize,
    /// Successful `is_valid` checks.
    pub hits: usize,
    /// Failed `is_valid` checks.
    pub misses: usize,
}

/// JSON-backed store of [`CacheEntry`] keyed by `/`-separated relative path.
///
/// The file records a fingerprint of the registry and configuration; loading
/// with a different fingerprint starts from an empty cache. The whole file is
/// read on load and written on [`save`](Self::save).
#[derive(Debug)]
pub struct ValidationCache {
    path: PathBuf,
    fingerprint: String,
    entries: BTreeMap<String, CacheEntry>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ValidationCache {
    /// Creates an empty cache that will be saved to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fingerprint: fingerprint.into(),
            entries: BTreeMap::new(),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Loads the cache file at `path`.
    ///
    /// A missing file, an unreadable document or a fingerprint mismatch all
    /// yield an empty cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(
        path: impl Into<PathBuf>,
        fingerprint: impl Into<String>,
    ) -> Result<Self, CacheError> {
        let mut cache = Self::new(path, fingerprint);
        let content = match std::fs::read_to_string(&cache.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(cache),
            Err(e) => {
                return Err(CacheError::Io {
                    path: cache.path,
                    source: e,
                })
            }
        };
        match serde_json::from_str::<CacheFile>(&content) {
            Ok(file) if file.version == FORMAT_VERSION && file.fingerprint == cache.fingerprint => {
                tracing::debug!(
                    path = %cache.path.display(),
                    entries = file.entries.len(),
                    "Loaded validation cache"
                );
                cache.entries = file.entries;
            }
            Ok(_) => {
                tracing::info!(
                    path = %cache.path.display(),
                    "Registry or configuration changed, discarding cache"
                );
            }
            Err(e) => {
                tracing::warn!(
                    path = %cache.path.display(),
                    error = %e,
                    "Ignoring unreadable cache"
                );
            }
        }
        Ok(cache)
    }

    fn key(path: &Path) -> String {
        slash_path(path)
    }

    /// Returns true if an entry exists for `path` with the same checksum.
    pub fn is_valid(&self, path: &Path, checksum: &str) -> bool {
        let valid = self
            .entries
            .get(&Self::key(path))
            .is_some_and(|e| e.checksum == checksum);
        let counter = if valid { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        valid
    }

    /// Returns the entry for `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&CacheEntry> {
        self.entries.get(&Self::key(path))
    }

    /// Stores or replaces the entry for `path`.
    pub fn set(&mut self, path: &Path, entry: CacheEntry) {
        self.entries.insert(Self::key(path), entry);
    }

    /// Removes the entry for `path`.
    pub fn remove(&mut self, path: &Path) -> Option<CacheEntry> {
        self.entries.remove(&Self::key(path))
    }

    /// Drops entries whose key fails `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|k, _| keep(k));
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Current statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Path of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the cache file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self) -> Result<(), CacheError> {
        let io = |e| CacheError::Io {
            path: self.path.clone(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io)?;
        }
        let file = CacheFile {
            version: FORMAT_VERSION,
            fingerprint: self.fingerprint.clone(),
            entries: self.entries.clone(),
        };
        let json = serde_json::to_string(&file)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io)?;
        std::fs::rename(&tmp, &self.path).map_err(io)?;
        tracing::debug!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "Saved validation cache"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationResult;

    fn entry(checksum: &str) -> CacheEntry {
        CacheEntry::new(checksum, ValidationResult::new("src/a.ts", Some("core".into())))
    }

    #[test]
    fn validity_tracks_checksum_and_stats() {
        let mut cache = ValidationCache::new("unused.json", "fp");
        let path = Path::new("src/a.ts");
        assert!(!cache.is_valid(path, "abc"));
        cache.set(path, entry("abc"));
        assert!(cache.is_valid(path, "abc"));
        assert!(!cache.is_valid(path, "def"));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 2
            }
        );
        assert_eq!(cache.get(path).and_then(CacheEntry::arch_id), Some("core"));
    }

    #[test]
    fn save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".arch/cache/validation.json");
        let mut cache = ValidationCache::new(&path, "fp");
        cache.set(Path::new("src/a.ts"), entry("abc"));
        cache.save().unwrap();

        let reloaded = ValidationCache::load(&path, "fp").unwrap();
        assert_eq!(reloaded.get(Path::new("src/a.ts")), cache.get(Path::new("src/a.ts")));
    }

    #[test]
    fn fingerprint_change_discards_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let mut cache = ValidationCache::new(&path, "v1");
        cache.set(Path::new("src/a.ts"), entry("abc"));
        cache.save().unwrap();

        let reloaded = ValidationCache::load(&path, "v2").unwrap();
        assert_eq!(reloaded.stats().entries, 0);
    }

    #[test]
    fn corrupt_or_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        assert_eq!(ValidationCache::load(&path, "fp").unwrap().stats().entries, 0);
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(ValidationCache::load(&path, "fp").unwrap().stats().entries, 0);
    }
}
