//! Token contract client
//!
//! Calls into a single fixed fungible-token ABI. Mutating calls (`deploy`,
//! `mint`, `transfer`) are signed by the wallet's account through a
//! [`SignerContext`]; `balanceOf` only needs a connection. Token amounts are
//! raw integers, any decimal scaling is the contract's business.

use crate::keypair::PrivateKey;
use crate::rpc::{CallRequest, Connector, LedgerClient, RpcError};
use crate::transaction::UnsignedTransaction;
use crate::wallet::{submit, Wallet, WalletError};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};

/// Constructor argument passed when deploying the token.
pub const DEFAULT_TOKEN_SYMBOL: &str = "Mytoken";

sol! {
    /// Fungible token with owner-controlled minting.
    interface IMyToken {
        function mint(address to, uint256 value) external;
        function transfer(address to, uint256 value) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
        function symbol() external view returns (string);
        function totalSupply() external view returns (uint256);
    }
}

/// ABI-encoded constructor arguments `(string symbol)`.
pub fn constructor_args(symbol: &str) -> Bytes {
    Bytes::from((symbol.to_string(),).abi_encode_params())
}

/// Result of a contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub contract_address: Address,
    pub tx_hash: B256,
}

/// Unlocked key, open connection and chain id for one contract call.
///
/// Consumed by the call it authorizes, which drops the key and closes the
/// connection.
pub struct SignerContext<L: LedgerClient> {
    connection: L,
    key: PrivateKey,
    from: Address,
    chain_id: u64,
    gas_limit: Option<u64>,
}

impl<L: LedgerClient> SignerContext<L> {
    pub fn from(&self) -> Address {
        self.from
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign and submit a call to `to` (`None` creates a contract).
    /// Returns the transaction hash and the nonce it used.
    fn send(self, to: Option<Address>, input: Bytes) -> Result<(B256, u64), WalletError> {
        let nonce = self.connection.get_nonce(self.from)?;
        let gas_price = self.connection.suggest_gas_price()?;

        let gas_limit = match self.gas_limit {
            Some(limit) => limit,
            None => {
                let request = CallRequest {
                    from: Some(self.from),
                    to,
                    data: input.clone(),
                    value: U256::ZERO,
                };
                self.connection
                    .estimate_gas(&request)
                    .map_err(contract_error)?
            }
        };

        let tx = match to {
            Some(contract) => UnsignedTransaction::contract_call(
                self.chain_id,
                nonce,
                gas_price,
                gas_limit,
                contract,
                input,
            ),
            None => {
                UnsignedTransaction::contract_creation(self.chain_id, nonce, gas_price, gas_limit, input)
            }
        };
        let signed = tx.sign(&self.key)?;
        let hash = submit(&self.connection, &signed.raw)?;
        Ok((hash, nonce))
    }
}

/// Node refusals of a contract call are contract failures; transport
/// problems stay network errors.
fn contract_error(error: RpcError) -> WalletError {
    match error {
        RpcError::Node { message, .. } => WalletError::ContractCall(message),
        other => WalletError::Network(other),
    }
}

/// Token operations for one wallet.
pub struct TokenClient<'a, C> {
    wallet: &'a Wallet<C>,
}

impl<'a, C: Connector> TokenClient<'a, C> {
    pub(crate) fn new(wallet: &'a Wallet<C>) -> Self {
        Self { wallet }
    }

    /// Unlock the key, connect and resolve the chain id.
    pub fn authorize(&self) -> Result<SignerContext<C::Connection>, WalletError> {
        let key = self.wallet.unlock_for_signing()?;
        let connection = self.wallet.connect()?;
        let chain_id = connection.get_chain_id()?;

        Ok(SignerContext {
            connection,
            key,
            from: self.wallet.address(),
            chain_id,
            gas_limit: self.wallet.node().gas_limit,
        })
    }

    /// Deploy `bytecode` with `constructor_args` appended.
    pub fn deploy(&self, bytecode: &[u8], constructor_args: &[u8]) -> Result<Deployment, WalletError> {
        if bytecode.is_empty() {
            return Err(WalletError::ContractCall("empty contract bytecode".to_string()));
        }
        let mut init_code = Vec::with_capacity(bytecode.len() + constructor_args.len());
        init_code.extend_from_slice(bytecode);
        init_code.extend_from_slice(constructor_args);

        let signer = self.authorize()?;
        let from = signer.from();
        let (tx_hash, nonce) = signer.send(None, Bytes::from(init_code))?;
        let contract_address = from.create(nonce);

        log::info!("Deployed contract {} in {}", contract_address, tx_hash);
        Ok(Deployment {
            contract_address,
            tx_hash,
        })
    }

    /// Mint `amount` raw token units to `to`.
    pub fn mint(&self, contract: Address, to: Address, amount: U256) -> Result<B256, WalletError> {
        let input = IMyToken::mintCall { to, value: amount }.abi_encode();
        let (hash, _) = self.authorize()?.send(Some(contract), Bytes::from(input))?;
        log::info!("Submitted mint of {} to {}: {}", amount, to, hash);
        Ok(hash)
    }

    /// Transfer `amount` raw token units from this account to `to`.
    pub fn transfer_token(
        &self,
        contract: Address,
        to: Address,
        amount: U256,
    ) -> Result<B256, WalletError> {
        let input = IMyToken::transferCall { to, value: amount }.abi_encode();
        let (hash, _) = self.authorize()?.send(Some(contract), Bytes::from(input))?;
        log::info!("Submitted token transfer of {} to {}: {}", amount, to, hash);
        Ok(hash)
    }

    /// Raw token balance of `owner`. Needs no key.
    pub fn balance_of(&self, contract: Address, owner: Address) -> Result<U256, WalletError> {
        balance_of(&self.wallet.connect()?, contract, owner)
    }
}

/// Raw token balance of `owner` over an existing connection.
pub fn balance_of<L: LedgerClient>(
    connection: &L,
    contract: Address,
    owner: Address,
) -> Result<U256, WalletError> {
    let request = CallRequest {
        to: Some(contract),
        data: Bytes::from(IMyToken::balanceOfCall { owner }.abi_encode()),
        ..CallRequest::default()
    };
    let output = connection.call_contract(&request).map_err(contract_error)?;
    IMyToken::balanceOfCall::abi_decode_returns(&output)
        .map_err(|e| WalletError::ContractCall(format!("balanceOf: {}", e)))
}
