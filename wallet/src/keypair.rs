//! secp256k1 private keys and the addresses they control

use alloy_primitives::Address;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::SecretKey;
use sha3::{Digest, Keccak256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid key length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// Raw 32-byte secp256k1 scalar.
///
/// The bytes are wiped when the value is dropped and never appear in
/// `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    /// Build from raw bytes, rejecting zero and values above the curve order.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeypairError> {
        if bytes.len() != 32 {
            return Err(KeypairError::InvalidLength(bytes.len()));
        }
        SecretKey::from_slice(bytes).map_err(|_| KeypairError::InvalidPrivateKey)?;

        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Parse a hex string, with or without a `0x` prefix.
    pub fn from_hex(hex_key: &str) -> Result<Self, KeypairError> {
        let trimmed = hex_key.trim().trim_start_matches("0x");
        let bytes = zeroize::Zeroizing::new(
            hex::decode(trimmed).map_err(|_| KeypairError::InvalidPrivateKey)?,
        );
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Uncompressed SEC1 public key (65 bytes, `0x04` prefix).
    pub fn public_key_uncompressed(&self) -> Result<[u8; 65], KeypairError> {
        let secret = SecretKey::from_slice(&self.0).map_err(|_| KeypairError::InvalidPrivateKey)?;
        let point = secret.public_key().to_encoded_point(false);

        let mut out = [0u8; 65];
        out.copy_from_slice(point.as_bytes());
        Ok(out)
    }

    /// Address controlled by this key.
    pub fn address(&self) -> Result<Address, KeypairError> {
        let public_key = self.public_key_uncompressed()?;
        Ok(address_from_public_key(&public_key))
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PrivateKey").field(&"[REDACTED]").finish()
    }
}

/// Last 20 bytes of keccak256 over the 64-byte public point (prefix dropped).
pub fn address_from_public_key(uncompressed: &[u8; 65]) -> Address {
    let mut hasher = Keccak256::new();
    hasher.update(&uncompressed[1..]);
    let hash = hasher.finalize();
    Address::from_slice(&hash[12..])
}
