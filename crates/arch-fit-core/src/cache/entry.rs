//! Cache entry type.

use crate::types::{ValidationResult, ValidationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A cached validation result for one file.
///
/// Entries are replaced wholesale after each fresh validation, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Checksum of the content the result was computed from.
    pub checksum: String,
    /// When the entry was written.
    pub cached_at: DateTime<Utc>,
    /// The stored result.
    pub result: ValidationResult,
    /// Raw import specifiers, reused to rebuild the graph without parsing.
    #[serde(default)]
    pub imports: Vec<CachedImport>,
}

/// One import specifier as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedImport {
    /// Module specifier.
    pub module: String,
    /// Line of the import statement.
    pub line: usize,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time.
    #[must_use]
    pub fn new(checksum: impl Into<String>, result: ValidationResult) -> Self {
        Self {
            checksum: checksum.into(),
            cached_at: Utc::now(),
            result,
            imports: Vec::new(),
        }
    }

    /// Attaches the file's import specifiers.
    #[must_use]
    pub fn with_imports(mut self, imports: impl IntoIterator<Item = (String, usize)>) -> Self {
        self.imports = imports
            .into_iter()
            .map(|(module, line)| CachedImport { module, line })
            .collect();
        self
    }

    /// Import specifiers as `(module, line)` pairs.
    #[must_use]
    pub fn import_pairs(&self) -> Vec<(String, usize)> {
        self.imports
            .iter()
            .map(|i| (i.module.clone(), i.line))
            .collect()
    }

    /// Architecture of the cached result.
    #[must_use]
    pub fn arch_id(&self) -> Option<&str> {
        self.result.arch_id.as_deref()
    }

    /// Status of the cached result.
    #[must_use]
    pub fn status(&self) -> ValidationStatus {
        self.result.status
    }

    /// Number of overrides present when the entry was written.
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.result.override_count
    }
}
