//! Content checksums.

use sha2::{Digest, Sha256};

/// SHA-256 of `content`, hex encoded.
#[must_use]
pub fn checksum(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// SHA-256 over several parts, each terminated by a NUL byte so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
#[must_use]
pub fn combined_checksum<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
