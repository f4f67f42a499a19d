//! Content hashing and run-scoped deduplication.
//!
//! Every emitted chunk is identified by the first 16 hex characters of the
//! SHA-256 digest of its exact text. Within one ingestion run, a chunk whose
//! hash was already seen is dropped. Two different texts that share a
//! 64-bit prefix are treated as duplicates; at ≈ 2⁻⁶⁴ this is accepted.

use std::collections::HashSet;

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const HASH_HEX_LEN: usize = 16;

/// Hash chunk text into a fixed 16-hex-char identifier.
///
/// Computed over the exact UTF-8 bytes, line terminators included, so
/// `"a\n"` and `"a\r\n"` hash differently.
///
/// ```rust
/// use codepilot_core::dedup::content_hash;
///
/// let h = content_hash("def hello():\n    pass");
/// assert_eq!(h.len(), 16);
/// assert_eq!(h, content_hash("def hello():\n    pass"));
/// ```
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(HASH_HEX_LEN);
    hex
}

/// Hash set for a single ingestion run.
///
/// Created at the start of a run and dropped with it; never shared
/// across runs.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash`. Returns `false` if it was already present.
    pub fn insert(&mut self, hash: &str) -> bool {
        if self.seen.contains(hash) {
            return false;
        }
        self.seen.insert(hash.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
