//! Content Hashing
//!
//! SHA-256 digests used for:
//! - Block linkage (`previous_hash`)
//! - Commit-reveal commitments
//! - Audit reports

use sha2::{Sha256, Digest};

/// Hash output type (256 bits / 32 bytes)
pub type Digest32 = [u8; 32];

/// Length of a digest rendered as lowercase hex.
pub const HEX_DIGEST_LEN: usize = 64;

/// Compute a simple hash of arbitrary data.
pub fn hash_bytes(data: &[u8]) -> Digest32 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data`, rendered as lowercase hex.
///
/// This is the form every hash takes on the wire and inside frames.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// Short hex prefix of a digest for log lines.
pub fn short(hex_digest: &str) -> &str {
    hex_digest.get(..12).unwrap_or(hex_digest)
}

/// Check that `value` looks like a hex-encoded SHA-256 digest.
pub fn is_hex_digest(value: &str) -> bool {
    value.len() == HEX_DIGEST_LEN && value.bytes().all(|b| b.is_ascii_hexdigit())
}
