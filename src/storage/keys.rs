//! Stable storage keys
//!
//! Keys are derived from SHA-256 so they are identical across processes and
//! restarts.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Hex characters of the URL digest kept in raw-document keys
const RAW_KEY_HASH_LEN: usize = 16;

/// Hex-encoded SHA-256 of a string
pub fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

/// Object key for a raw document: `{prefix}{unix_seconds}_{url_hash}.html`
///
/// Two captures of the same URL within the same second map to the same key
/// and the later upload overwrites the earlier one.
pub fn raw_document_key(prefix: &str, source_url: &str, captured_at: DateTime<Utc>) -> String {
    let digest = sha256_hex(source_url);
    format!(
        "{}{}_{}.html",
        prefix,
        captured_at.timestamp(),
        &digest[..RAW_KEY_HASH_LEN]
    )
}

/// Document identifier for a record identity (SKU or source URL)
pub fn document_key(identity: &str) -> String {
    sha256_hex(identity)
}
