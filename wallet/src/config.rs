//! Node settings passed into [`Wallet`](crate::Wallet) constructors.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NODE_URL: &str = "http://localhost:8545";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// JSON-RPC endpoint of the ledger node.
    pub url: String,
    /// Fixed gas limit for contract calls. The node's estimate is used when unset.
    pub gas_limit: Option<u64>,
}

impl NodeConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            gas_limit: None,
        }
    }

    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NODE_URL)
    }
}
