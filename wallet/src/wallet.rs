use crate::address::{parse_address, AddressError};
use crate::config::NodeConfig;
use crate::hd::{derive_account, DerivationError};
use crate::keypair::{KeypairError, PrivateKey};
use crate::mnemonic::{generate_mnemonic, MnemonicError, MnemonicPhrase};
use crate::rpc::{Connector, HttpConnector, LedgerClient, RpcError};
use crate::token::TokenClient;
use crate::transaction::{TransactionError, UnsignedTransaction};
use crate::units::{NativeAmount, UnitsError};
use crate::vault::{Account, KeyVault, VaultError};
use alloy_primitives::{Address, B256};
use std::collections::BTreeSet;
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("Mnemonic error: {0}")]
    Mnemonic(#[from] MnemonicError),

    #[error("Derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("Keypair error: {0}")]
    Keypair(#[from] KeypairError),

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Address error: {0}")]
    Address(#[from] AddressError),

    #[error("Amount error: {0}")]
    Amount(#[from] UnitsError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Network error: {0}")]
    Network(#[from] RpcError),

    #[error("Transaction rejected by node ({code}): {message}")]
    TransactionRejected { code: i64, message: String },

    #[error("Contract call failed: {0}")]
    ContractCall(String),
}

/// A freshly created account and the phrase that recovers it.
///
/// The phrase is not stored anywhere; the caller must show it to the user.
#[derive(Debug)]
pub struct NewAccount {
    pub account: Account,
    pub mnemonic: MnemonicPhrase,
}

/// Generate a mnemonic, derive its account and store the key in `vault`.
pub fn create_account(vault: &KeyVault, passphrase: &str) -> Result<NewAccount, WalletError> {
    let mnemonic = generate_mnemonic()?;
    let seed = mnemonic.to_seed("")?;
    let derived = derive_account(&seed)?;
    let account = vault.store(passphrase, &derived.private_key)?;

    log::info!("Created account {}", account.address);
    Ok(NewAccount { account, mnemonic })
}

/// Recover the account for `words` and store its key in `vault`.
pub fn import_account(
    vault: &KeyVault,
    words: &str,
    passphrase: &str,
) -> Result<Account, WalletError> {
    let mnemonic = MnemonicPhrase::from_phrase(words)?;
    let seed = mnemonic.to_seed("")?;
    let derived = derive_account(&seed)?;
    let account = vault.store(passphrase, &derived.private_key)?;

    log::info!("Imported account {}", account.address);
    Ok(account)
}

pub fn list_accounts(vault: &KeyVault) -> Result<BTreeSet<Address>, WalletError> {
    Ok(vault.list()?)
}

/// Remove an account after proving the passphrase. Missing accounts are ignored.
pub fn delete_account(
    vault: &KeyVault,
    passphrase: &str,
    address: &Address,
) -> Result<(), WalletError> {
    vault.delete(passphrase, address)?;
    Ok(())
}

/// One vault account, the passphrase presented for it and the node to use.
///
/// No decrypted key is held: every signing operation unlocks the vault
/// entry again and drops the key once the transaction is signed.
pub struct Wallet<C = HttpConnector> {
    address: Address,
    vault: KeyVault,
    passphrase: Zeroizing<String>,
    node: NodeConfig,
    connector: C,
}

impl Wallet<HttpConnector> {
    /// Bind to an existing vault account.
    pub fn load(
        vault: KeyVault,
        address: Address,
        passphrase: &str,
        node: NodeConfig,
    ) -> Result<Self, WalletError> {
        if !vault.contains(&address) {
            return Err(VaultError::AddressNotFound(address.to_checksum(None)).into());
        }

        Ok(Self {
            address,
            vault,
            passphrase: Zeroizing::new(passphrase.to_string()),
            node,
            connector: HttpConnector::default(),
        })
    }
}

impl<C: Connector> Wallet<C> {
    /// Replace the way node connections are opened.
    pub fn with_connector<D: Connector>(self, connector: D) -> Wallet<D> {
        Wallet {
            address: self.address,
            vault: self.vault,
            passphrase: self.passphrase,
            node: self.node,
            connector,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn node(&self) -> &NodeConfig {
        &self.node
    }

    /// Decrypt the signing key. The caller drops it right after signing.
    pub fn unlock_for_signing(&self) -> Result<PrivateKey, WalletError> {
        Ok(self.vault.unlock(&self.passphrase, &self.address)?)
    }

    /// Open a connection to the configured node. It closes when dropped.
    pub fn connect(&self) -> Result<C::Connection, WalletError> {
        Ok(self.connector.connect(&self.node.url)?)
    }

    /// Send `amount` (in display units, e.g. "1.5") to `to`.
    ///
    /// Inputs are validated before the node is contacted. Errors reported
    /// by the node on submission are returned as
    /// [`WalletError::TransactionRejected`] with the node's message.
    pub fn transfer_native(&self, to: &str, amount: &str) -> Result<B256, WalletError> {
        let to = parse_address(to)?;
        let amount = NativeAmount::from_display(amount)?;

        let connection = self.connect()?;
        let chain_id = connection.get_chain_id()?;
        let nonce = connection.get_nonce(self.address)?;
        let gas_price = connection.suggest_gas_price()?;

        let tx = UnsignedTransaction::native_transfer(chain_id, nonce, gas_price, to, amount.wei());
        let signed = {
            let key = self.unlock_for_signing()?;
            tx.sign(&key)?
        };

        let hash = submit(&connection, &signed.raw)?;
        log::info!(
            "Submitted transfer of {} from {} to {}: {}",
            amount,
            self.address,
            to,
            hash
        );
        Ok(hash)
    }

    /// Balance of this account in display units.
    pub fn balance(&self) -> Result<NativeAmount, WalletError> {
        let connection = self.connect()?;
        let wei = connection.get_balance(self.address)?;
        Ok(NativeAmount::from_wei(wei))
    }

    /// Contract operations signed by this account.
    pub fn token(&self) -> TokenClient<'_, C> {
        TokenClient::new(self)
    }
}

/// Submit a signed transaction, reporting node refusals as rejections.
pub(crate) fn submit<L: LedgerClient>(connection: &L, raw: &[u8]) -> Result<B256, WalletError> {
    connection.submit_transaction(raw).map_err(|e| match e {
        RpcError::Node { code, message } => WalletError::TransactionRejected { code, message },
        other => WalletError::Network(other),
    })
}
