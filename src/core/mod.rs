//! Core primitives.
//!
//! Pure functions with no session state: hashing, canonical encoding,
//! signing keys, randomness and the fair-start rule. Everything the chain
//! and handshake layers prove rests on these.

pub mod canonical;
pub mod hash;
pub mod keys;
pub mod party;
pub mod rng;

// Re-export core types
pub use canonical::{canonical_bytes, canonical_json};
pub use hash::{hash_bytes, sha256_hex, Digest32};
pub use keys::{KeyError, KeyPair, PublicKey};
pub use party::Party;
pub use rng::{derive_first_player, open_commitment, random_bytes, SeedSecret, SEED_LEN};
