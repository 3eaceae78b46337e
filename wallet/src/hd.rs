//! Hierarchical deterministic key derivation (BIP-32 over secp256k1)
//!
//! One mnemonic maps to exactly one account: the key at
//! [`DERIVATION_PATH`]. The path is part of the public contract because
//! recovering funds from a phrase depends on deriving the same key again.
//! Supporting more accounts later means taking the path as a parameter at
//! the call sites, which [`derive`] already accepts.

use crate::keypair::{KeypairError, PrivateKey};
use crate::mnemonic::Seed;
use alloy_primitives::Address;
use bip32::{DerivationPath, XPrv};
use thiserror::Error;

/// BIP-44 path for the first Ethereum account: coin type 60, account 0,
/// external chain, address index 0.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("Invalid derivation path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Key derivation failed at {step}: {reason}")]
    InvalidChildKey { step: String, reason: String },

    #[error("Derived key unusable: {0}")]
    Key(#[from] KeypairError),
}

/// Key and address produced by one derivation.
#[derive(Debug)]
pub struct DerivedAccount {
    pub private_key: PrivateKey,
    pub address: Address,
}

/// Derive the account at [`DERIVATION_PATH`].
pub fn derive_account(seed: &Seed) -> Result<DerivedAccount, DerivationError> {
    derive(seed, DERIVATION_PATH)
}

/// Build the master key from `seed` and apply each index of `path` in order.
pub fn derive(seed: &Seed, path: &str) -> Result<DerivedAccount, DerivationError> {
    let path: DerivationPath = path.parse().map_err(|e: bip32::Error| DerivationError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })?;

    let mut key = XPrv::new(seed.as_bytes()).map_err(|e| DerivationError::InvalidChildKey {
        step: "m".to_string(),
        reason: e.to_string(),
    })?;

    for child in path.iter() {
        key = key
            .derive_child(child)
            .map_err(|e| DerivationError::InvalidChildKey {
                step: child.to_string(),
                reason: e.to_string(),
            })?;
    }

    let private_key = PrivateKey::from_bytes(&key.private_key().to_bytes())?;
    let address = private_key.address()?;

    Ok(DerivedAccount {
        private_key,
        address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::seed_from_mnemonic;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_known_vector_address() {
        let seed = seed_from_mnemonic(ABANDON, "").unwrap();
        let account = derive_account(&seed).unwrap();

        assert_eq!(
            account.address.to_checksum(None),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
        assert_eq!(
            hex::encode(account.private_key.as_bytes()),
            "1ab42cc412b618bdea3a599e3c9bae199ebf030895b039e9db1e30dafb12b727"
        );
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = seed_from_mnemonic(ABANDON, "").unwrap();
        let a = derive_account(&seed).unwrap();
        let b = derive_account(&seed).unwrap();
        assert_eq!(a.address, b.address);
        assert_eq!(a.private_key, b.private_key);
    }

    #[test]
    fn test_other_index_gives_other_account() {
        let seed = seed_from_mnemonic(ABANDON, "").unwrap();
        let first = derive_account(&seed).unwrap();
        let second = derive(&seed, "m/44'/60'/0'/0/1").unwrap();
        assert_ne!(first.address, second.address);
    }

    #[test]
    fn test_invalid_path() {
        let seed = seed_from_mnemonic(ABANDON, "").unwrap();
        assert!(matches!(
            derive(&seed, "44/60/x"),
            Err(DerivationError::InvalidPath { .. })
        ));
    }
}
