//! Transaction building and signing
//!
//! Transactions use the legacy envelope with EIP-155 replay protection: the
//! chain id is part of the signing hash and of the encoded `v` value, so a
//! transaction signed for one network is invalid on any other.

use crate::keypair::PrivateKey;
use alloy_consensus::{SignableTransaction, TxLegacy};
use alloy_primitives::{keccak256, Address, Bytes, Signature, TxKind, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use thiserror::Error;

/// Gas limit for a native transfer carrying [`NATIVE_TRANSFER_MEMO`].
pub const NATIVE_TRANSFER_GAS_LIMIT: u64 = 30_000;

/// Payload attached to every native transfer.
pub const NATIVE_TRANSFER_MEMO: &[u8] = b"Transfer";

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Signing failed: {0}")]
    Signing(String),
}

/// A transaction ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
}

impl UnsignedTransaction {
    /// A native-currency transfer with the fixed gas limit and memo.
    pub fn native_transfer(
        chain_id: u64,
        nonce: u64,
        gas_price: u128,
        to: Address,
        value: U256,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            gas_price,
            gas_limit: NATIVE_TRANSFER_GAS_LIMIT,
            to: TxKind::Call(to),
            value,
            input: Bytes::from_static(NATIVE_TRANSFER_MEMO),
        }
    }

    /// A contract call carrying ABI-encoded `input`.
    pub fn contract_call(
        chain_id: u64,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        contract: Address,
        input: Bytes,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Call(contract),
            value: U256::ZERO,
            input,
        }
    }

    /// A contract creation whose input is bytecode followed by constructor args.
    pub fn contract_creation(
        chain_id: u64,
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        init_code: Bytes,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            gas_price,
            gas_limit,
            to: TxKind::Create,
            value: U256::ZERO,
            input: init_code,
        }
    }

    fn to_legacy(&self) -> TxLegacy {
        TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            input: self.input.clone(),
        }
    }

    /// Hash the signer commits to (includes the chain id).
    pub fn signature_hash(&self) -> B256 {
        self.to_legacy().signature_hash()
    }

    /// Sign with `key` and produce the raw encoding for submission.
    pub fn sign(&self, key: &PrivateKey) -> Result<SignedTransaction, TransactionError> {
        let signer = PrivateKeySigner::from_slice(key.as_bytes())
            .map_err(|e| TransactionError::Signing(e.to_string()))?;

        let tx = self.to_legacy();
        let signature = signer
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| TransactionError::Signing(e.to_string()))?;
        let signed = tx.into_signed(signature);

        let mut raw = Vec::new();
        signed.rlp_encode(&mut raw);
        let hash = keccak256(&raw);

        log::debug!(
            "Signed transaction {} (nonce {}, chain {})",
            hash,
            self.nonce,
            self.chain_id
        );

        Ok(SignedTransaction {
            raw: Bytes::from(raw),
            hash,
            signature,
        })
    }
}

/// Signed, encoded transaction.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    pub signature: Signature,
}
