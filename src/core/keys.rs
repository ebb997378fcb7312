//! Signing Keys
//!
//! Ed25519 key pairs for block signatures. The private half never leaves the
//! party that generated it; the public half travels as base64 text in the
//! `pubkey` handshake message.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::{
    Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand_core::OsRng;
use thiserror::Error;

/// Failure to import a peer's exported public key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Not valid base64.
    #[error("public key is not valid base64")]
    Encoding,

    /// Decoded to the wrong number of bytes.
    #[error("public key must be {expected} bytes, got {got}")]
    Length {
        /// Required length.
        expected: usize,
        /// Decoded length.
        got: usize,
    },

    /// Bytes are not a valid curve point.
    #[error("public key is not a valid Ed25519 point")]
    InvalidPoint,
}

/// A party's own signing key pair.
pub struct KeyPair {
    signing: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key pair from the OS random source.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Rebuild a key pair from a 32-byte secret.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    /// Public half.
    pub fn public(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key())
    }

    /// Public half in transportable text form.
    pub fn export_public(&self) -> String {
        self.public().export()
    }

    /// Sign a message, returning the signature as lowercase hex.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.export_public())
            .finish_non_exhaustive()
    }
}

/// A verifying key, either our own or one imported from the peer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    /// Import a key exported with [`PublicKey::export`].
    pub fn import(text: &str) -> Result<Self, KeyError> {
        let bytes = STANDARD.decode(text.trim()).map_err(|_| KeyError::Encoding)?;
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            bytes.as_slice().try_into().map_err(|_| KeyError::Length {
                expected: PUBLIC_KEY_LENGTH,
                got: bytes.len(),
            })?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|_| KeyError::InvalidPoint)
    }

    /// Standard base64 of the 32 key bytes.
    pub fn export(&self) -> String {
        STANDARD.encode(self.0.as_bytes())
    }

    /// Verify a hex signature over `message`.
    ///
    /// Malformed hex or a wrong-length signature is simply invalid.
    pub fn verify_hex(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(bytes) = <[u8; SIGNATURE_LENGTH]>::try_from(bytes.as_slice()) else {
            return false;
        };
        let signature = Signature::from_bytes(&bytes);
        self.0.verify(message, &signature).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.export())
    }
}
