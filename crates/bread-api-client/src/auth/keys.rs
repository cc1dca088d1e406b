/*
[INPUT]:  Digests to sign and optional secret key bytes
[OUTPUT]: Compact secp256k1 signatures and base58-encoded public keys
[POS]:    Auth layer - cryptographic signing for request authentication
[UPDATE]: When changing signing algorithm or key format
*/

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use crate::http::{BreadError, Result};

/// Length of a compact (recoverable) signature: header byte + r + s
pub const COMPACT_SIGNATURE_LEN: usize = 65;

/// Header offset for a recoverable signature over a compressed public key
const COMPACT_HEADER_COMPRESSED: u8 = 27 + 4;

/// `SHA256(SHA256(data))`
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Wallet-derived authentication key pair
#[derive(Clone)]
pub struct AuthKeyPair {
    signing_key: SigningKey,
}

impl AuthKeyPair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Create a key pair from existing secret key bytes (32 bytes)
    pub fn from_secret_key(bytes: &[u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)
            .map_err(|e| BreadError::Crypto(format!("Invalid secp256k1 secret key: {e}")))?;
        Ok(Self { signing_key })
    }

    /// Compressed SEC1 public key (33 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    /// Get the public key in base58 encoding (sent as `pubKey`)
    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    /// Get the raw secret key bytes
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.signing_key.to_bytes());
        bytes
    }

    /// Deterministic (RFC 6979) recoverable signature over a 32-byte digest.
    ///
    /// Layout: `[27 + 4 + recovery_id, r(32), s(32)]`.
    pub fn compact_sign(&self, digest: &[u8; 32]) -> Result<[u8; COMPACT_SIGNATURE_LEN]> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| BreadError::Crypto(format!("Failed to sign digest: {e}")))?;

        let mut compact = [0u8; COMPACT_SIGNATURE_LEN];
        compact[0] = COMPACT_HEADER_COMPRESSED + recovery_id.to_byte();
        compact[1..].copy_from_slice(&signature.to_bytes());
        Ok(compact)
    }

    /// Check that `compact` recovers to this key pair's public key
    pub fn verify_compact(&self, digest: &[u8; 32], compact: &[u8; COMPACT_SIGNATURE_LEN]) -> bool {
        let Some(recovery_id) = compact[0]
            .checked_sub(COMPACT_HEADER_COMPRESSED)
            .and_then(RecoveryId::from_byte)
        else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&compact[1..]) else {
            return false;
        };

        VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map(|recovered| &recovered == self.signing_key.verifying_key())
            .unwrap_or(false)
    }
}

impl fmt::Debug for AuthKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthKeyPair")
            .field("public_key", &self.public_key_base58())
            .finish_non_exhaustive()
    }
}
