//! Content-addressed cache key generation.

use crate::url::canonicalize;
use sha2::{Digest, Sha256};

/// Compute the cache key for an item identity.
///
/// The URL goes through the same canonicalization used before fetching, so
/// trivially different spellings of the same address share a key. A URL that
/// does not canonicalize is hashed as trimmed text.
pub fn key_for(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_url(url).as_bytes());
    hex::encode(hasher.finalize())
}

fn canonical_url(url: &str) -> String {
    match canonicalize(url) {
        Ok(parsed) => parsed.to_string(),
        Err(_) => url.trim().to_string(),
    }
}
