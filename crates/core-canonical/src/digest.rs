//! SHA-256 digest engine
//!
//! Pure functions: identical input bytes always yield the identical
//! 64-character lowercase hex digest, with no dependency on wall-clock
//! time, process state, or environment.

use sha2::{Digest, Sha256};

/// Number of hex characters in a full SHA-256 digest.
pub const DIGEST_LEN: usize = 64;

/// Default display truncation length.
pub const SHORT_LEN: usize = 16;

/// Compute the SHA-256 digest of `bytes` as lowercase hex.
pub fn compute(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Truncate a digest for human display.
///
/// Display only; truncated digests must never be used for equality
/// comparisons.
pub fn short(digest: &str, n: usize) -> &str {
    let end = digest
        .char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(digest.len());
    &digest[..end]
}

/// Check whether a string has the shape of a full digest: exactly 64
/// lowercase hex characters.
pub fn is_valid(digest: &str) -> bool {
    digest.len() == DIGEST_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
