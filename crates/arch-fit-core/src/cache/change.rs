//! Checksum-based change detection against the cache.

use super::checksum::checksum;
use super::store::ValidationCache;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Files partitioned by comparison with the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Cached with a different checksum.
    pub changed: Vec<PathBuf>,
    /// Cached with the same checksum.
    pub unchanged: Vec<PathBuf>,
    /// Not cached.
    pub new: Vec<PathBuf>,
    /// Current checksum of every inspected file.
    pub checksums: HashMap<PathBuf, String>,
}

impl ChangeSet {
    /// Changed and new files.
    pub fn dirty(&self) -> impl Iterator<Item = &PathBuf> {
        self.changed.iter().chain(&self.new)
    }

    /// Current checksum of `path`.
    #[must_use]
    pub fn checksum_of(&self, path: &Path) -> Option<&str> {
        self.checksums.get(path).map(String::as_str)
    }
}

/// Compares current file contents with the checksums stored in a cache.
#[derive(Debug, Clone, Copy)]
pub struct ChangeDetector<'a> {
    cache: &'a ValidationCache,
}

impl<'a> ChangeDetector<'a> {
    /// Creates a detector over `cache`.
    #[must_use]
    pub fn new(cache: &'a ValidationCache) -> Self {
        Self { cache }
    }

    /// Partitions `files` (relative path, content) into changed, unchanged and new.
    pub fn detect_changes<'f>(
        &self,
        files: impl IntoIterator<Item = (&'f Path, &'f str)>,
    ) -> ChangeSet {
        let mut set = ChangeSet::default();
        for (path, content) in files {
            let sum = checksum(content);
            match self.cache.get(path) {
                None => set.new.push(path.to_path_buf()),
                Some(_) if self.cache.is_valid(path, &sum) => {
                    set.unchanged.push(path.to_path_buf());
                }
                Some(_) => set.changed.push(path.to_path_buf()),
            }
            set.checksums.insert(path.to_path_buf(), sum);
        }
        tracing::debug!(
            changed = set.changed.len(),
            unchanged = set.unchanged.len(),
            new = set.new.len(),
            "Detected changes"
        );
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheEntry;
    use crate::types::ValidationResult;

    #[test]
    fn partitions_by_checksum() {
        let mut cache = ValidationCache::new("unused.json", "fp");
        for (path, content) in [("src/a.ts", "a"), ("src/b.ts", "b")] {
            cache.set(
                Path::new(path),
                CacheEntry::new(checksum(content), ValidationResult::new(path, None)),
            );
        }
        let detector = ChangeDetector::new(&cache);
        let set = detector.detect_changes([
            (Path::new("src/a.ts"), "a"),
            (Path::new("src/b.ts"), "b changed"),
            (Path::new("src/c.ts"), "c"),
        ]);
        assert_eq!(set.unchanged, vec![PathBuf::from("src/a.ts")]);
        assert_eq!(set.changed, vec![PathBuf::from("src/b.ts")]);
        assert_eq!(set.new, vec![PathBuf::from("src/c.ts")]);
        assert_eq!(set.dirty().count(), 2);
        assert_eq!(set.checksum_of(Path::new("src/c.ts")), Some(checksum("c").as_str()));
    }
}
