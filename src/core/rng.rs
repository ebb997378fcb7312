//! Secure Randomness and Fair Start
//!
//! Each party contributes 256 random bits through a commit-reveal exchange.
//! The first player is derived from both contributions, so neither side can
//! choose it after seeing the other's value.

use std::fmt;

use rand_core::{OsRng, RngCore};

use super::hash::sha256_hex;
use super::party::Party;

/// Length of a commit-reveal contribution in bytes.
pub const SEED_LEN: usize = 32;

/// Fill a fresh buffer from the OS random source.
pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    OsRng.fill_bytes(&mut buf);
    buf
}

/// One party's secret contribution to the fair-start exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedSecret {
    bytes: [u8; SEED_LEN],
}

impl SeedSecret {
    /// Draw a new secret from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Wrap known bytes.
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self { bytes }
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.bytes
    }

    /// Commitment published before the reveal: SHA-256 of the raw bytes, hex.
    pub fn commitment(&self) -> String {
        sha256_hex(&self.bytes)
    }

    /// Revealed form: the bytes as lowercase hex.
    pub fn reveal(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for SeedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeedSecret({})", self.commitment())
    }
}

/// Parse a revealed seed and check it against the earlier commitment.
///
/// Returns `None` when the reveal is malformed or does not hash to `commit`.
pub fn open_commitment(commit: &str, reveal_hex: &str) -> Option<[u8; SEED_LEN]> {
    let bytes = hex::decode(reveal_hex).ok()?;
    let bytes: [u8; SEED_LEN] = bytes.as_slice().try_into().ok()?;
    if sha256_hex(&bytes) != commit.to_ascii_lowercase() {
        return None;
    }
    Some(bytes)
}

/// Derive which party moves first from both contributions.
///
/// Parity of the XOR of every byte of both inputs. Symmetric in its
/// arguments, and flipping any single input bit flips the result.
pub fn derive_first_player(mine: &[u8; SEED_LEN], peers: &[u8; SEED_LEN]) -> Party {
    let folded = mine
        .iter()
        .zip(peers.iter())
        .fold(0u8, |acc, (a, b)| acc ^ a ^ b);

    if folded.count_ones() % 2 == 0 {
        Party::Host
    } else {
        Party::Guest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_bytes_len() {
        assert_eq!(random_bytes(16).len(), 16);
        assert_ne!(random_bytes(32), random_bytes(32));
    }

    #[test]
    fn test_commit_reveal() {
        let secret = SeedSecret::generate();
        let opened = open_commitment(&secret.commitment(), &secret.reveal());
        assert_eq!(opened, Some(*secret.as_bytes()));
    }

    #[test]
    fn test_reveal_must_match_commit() {
        let committed = SeedSecret::from_bytes([1; SEED_LEN]);
        let other = SeedSecret::from_bytes([2; SEED_LEN]);
        assert_eq!(open_commitment(&committed.commitment(), &other.reveal()), None);
    }

    #[test]
    fn test_malformed_reveal() {
        let secret = SeedSecret::from_bytes([3; SEED_LEN]);
        assert_eq!(open_commitment(&secret.commitment(), "xyz"), None);
        assert_eq!(open_commitment(&secret.commitment(), "abcd"), None);
    }

    #[test]
    fn test_first_player_symmetric() {
        let a = [0x5a; SEED_LEN];
        let mut b = [0u8; SEED_LEN];
        b[31] = 1;
        assert_eq!(derive_first_player(&a, &b), derive_first_player(&b, &a));
    }

    #[test]
    fn test_first_player_uses_last_byte() {
        let zero = [0u8; SEED_LEN];
        let mut tail = [0u8; SEED_LEN];
        tail[SEED_LEN - 1] = 0x80;

        assert_eq!(derive_first_player(&zero, &zero), Party::Host);
        assert_eq!(derive_first_player(&zero, &tail), Party::Guest);
    }

    #[test]
    fn test_first_player_parity_rule() {
        // 0x03 has two set bits, 0x07 has three.
        let mut a = [0u8; SEED_LEN];
        a[0] = 0x03;
        assert_eq!(derive_first_player(&a, &[0; SEED_LEN]), Party::Host);
        a[0] = 0x07;
        assert_eq!(derive_first_player(&a, &[0; SEED_LEN]), Party::Guest);
    }
}
