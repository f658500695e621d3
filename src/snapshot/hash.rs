//! Content hashing for snapshots.
//!
//! Rendered snapshots are deterministic, so a SHA256 of the rendered text is
//! a fingerprint of the database content. It is used to skip rewriting an
//! unchanged snapshot and to compare a database with its snapshot.

use sha2::{Digest, Sha256};

/// Compute the SHA256 hash of rendered snapshot text, as lowercase hex.
#[must_use]
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Check if content has changed relative to a stored hash.
///
/// Returns `true` if there is no stored hash or the hashes differ.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}
