//! ethkeep wallet core
//!
//! Key custody and signing for Ethereum-style accounts:
//! - BIP-39 mnemonics (24 words) and seeds
//! - BIP-32/44 derivation along one fixed path
//! - Encrypted key vault (Argon2id + AES-256-GCM, one file per address)
//! - EIP-155 signed native transfers with exact unit conversion
//! - Token contract calls over a fixed ABI
//!
//! Node access goes through the [`rpc::Connector`] trait, so everything
//! above the transport can run against an in-memory node.

pub mod address;
pub mod config;
pub mod hd;
pub mod keypair;
pub mod mnemonic;
pub mod rpc;
pub mod token;
pub mod transaction;
pub mod units;
pub mod vault;
pub mod wallet;

pub use address::{parse_address, AddressError};
pub use alloy_primitives::{Address, B256, U256};
pub use config::NodeConfig;
pub use hd::{derive_account, DerivationError, DERIVATION_PATH};
pub use keypair::{KeypairError, PrivateKey};
pub use mnemonic::{generate_mnemonic, seed_from_mnemonic, validate_mnemonic, MnemonicError, MnemonicPhrase};
pub use rpc::{Connector, HttpConnector, LedgerClient, RpcError};
pub use token::{constructor_args, Deployment, SignerContext, TokenClient, DEFAULT_TOKEN_SYMBOL};
pub use transaction::{SignedTransaction, TransactionError, UnsignedTransaction};
pub use units::{NativeAmount, UnitsError};
pub use vault::{Account, KdfParams, KeyVault, VaultError};
pub use wallet::{create_account, delete_account, import_account, list_accounts, NewAccount, Wallet, WalletError};
