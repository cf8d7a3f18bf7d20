//! Shared file-content cache.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Map of absolute path to file content, filled once per run and shared by
/// the graph builder, the engine and plan validation.
#[derive(Debug, Default)]
pub struct ContentCache {
    files: RwLock<HashMap<PathBuf, Arc<str>>>,
}

impl ContentCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores content for `path`, replacing any previous value.
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Arc<str>>) {
        self.files.write().insert(path.into(), content.into());
    }

    /// Returns the cached content of `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<Arc<str>> {
        self.files.read().get(path).cloned()
    }

    /// Returns the cached content, reading and caching the file on a miss.
    ///
    /// # Errors
    ///
    /// Returns the IO error if the file has to be read and cannot be.
    pub fn get_or_read(&self, path: &Path) -> std::io::Result<Arc<str>> {
        if let Some(content) = self.get(path) {
            return Ok(content);
        }
        let content: Arc<str> = std::fs::read_to_string(path)?.into();
        self.insert(path, Arc::clone(&content));
        Ok(content)
    }

    /// Returns true if `path` is cached.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.files.read().contains_key(path)
    }

    /// Number of cached files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }

    /// Snapshot of every cached entry.
    #[must_use]
    pub fn entries(&self) -> Vec<(PathBuf, Arc<str>)> {
        self.files
            .read()
            .iter()
            .map(|(p, c)| (p.clone(), Arc::clone(c)))
            .collect()
    }

    /// Drops every cached file.
    pub fn clear(&self) {
        self.files.write().clear();
    }
}
