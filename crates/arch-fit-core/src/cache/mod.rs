//! Checksum cache and incremental change detection.
//!
//! Results are keyed by relative path and validated by a SHA-256 of the file
//! content, so touching a file without editing it is still a cache hit.

mod change;
mod checksum;
mod entry;
mod store;

pub use change::{ChangeDetector, ChangeSet};
pub use checksum::{checksum, combined_checksum};
pub use entry::{CacheEntry, CachedImport};
pub use store::{CacheError, CacheStats, ValidationCache};
