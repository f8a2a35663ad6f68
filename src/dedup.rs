//! Content-addressed message deduplication
//!
//! Computes the digest used for at-most-once storage of inbound messages.
//! Two messages from the same sender whose texts differ only in case,
//! whitespace, or punctuation hash identically, so repeated forwards of the
//! same listing collapse to a single stored row per tenant.

use sha2::{Digest, Sha256};

/// Normalize message text for hashing: lowercase, strip everything that is
/// not alphanumeric, collapse whitespace runs.
fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    let mut last_was_space = true;

    for c in lowered.chars() {
        if c.is_alphanumeric() {
            normalized.push(c);
            last_was_space = false;
        } else if !last_was_space {
            normalized.push(' ');
            last_was_space = true;
        }
    }

    normalized.trim_end().to_string()
}

/// Compute the content hash over normalized text + sender.
pub fn content_hash(sender: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize(text).as_bytes());
    hasher.update(b"|");
    hasher.update(sender.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}
