//! Ledger node access
//!
//! [`LedgerClient`] is the set of node calls the wallet needs. A
//! [`Connector`] opens a client for one operation; the client is released
//! when the value is dropped, so every exit path of the caller closes it.
//! [`HttpConnector`] speaks JSON-RPC over HTTP.

use alloy_primitives::{Address, Bytes, B256, U256};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("Node unreachable: {0}")]
    Transport(String),

    #[error("Node error {code}: {message}")]
    Node { code: i64, message: String },

    #[error("Invalid node response: {0}")]
    InvalidResponse(String),
}

/// Arguments of `eth_call` and `eth_estimateGas`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallRequest {
    pub from: Option<Address>,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub data: Bytes,
    pub value: U256,
}

impl CallRequest {
    fn to_json(&self) -> Value {
        let mut object = serde_json::Map::new();
        if let Some(from) = self.from {
            object.insert("from".into(), json!(from));
        }
        if let Some(to) = self.to {
            object.insert("to".into(), json!(to));
        }
        object.insert("data".into(), json!(format!("0x{}", hex::encode(&self.data))));
        if !self.value.is_zero() {
            object.insert("value".into(), json!(format!("{:#x}", self.value)));
        }
        Value::Object(object)
    }
}

/// Node operations used by the wallet and token client.
pub trait LedgerClient {
    fn get_chain_id(&self) -> Result<u64, RpcError>;
    /// Next unused nonce, counting pending transactions.
    fn get_nonce(&self, address: Address) -> Result<u64, RpcError>;
    fn suggest_gas_price(&self) -> Result<u128, RpcError>;
    fn get_balance(&self, address: Address) -> Result<U256, RpcError>;
    fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError>;
    fn call_contract(&self, request: &CallRequest) -> Result<Bytes, RpcError>;
    fn submit_transaction(&self, raw: &[u8]) -> Result<B256, RpcError>;
}

/// Opens a [`LedgerClient`] for the duration of one operation.
pub trait Connector {
    type Connection: LedgerClient;

    fn connect(&self, url: &str) -> Result<Self::Connection, RpcError>;
}

/// Connector for JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    timeout: Duration,
}

impl HttpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl Connector for HttpConnector {
    type Connection = NodeConnection;

    fn connect(&self, url: &str) -> Result<NodeConnection, RpcError> {
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let mut connection = NodeConnection {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            chain_id: 0,
        };

        // Probe the endpoint so an unreachable node fails here
        let chain_id: String = connection.request("eth_chainId", json!([]))?;
        connection.chain_id = parse_quantity_u64(&chain_id)?;

        log::debug!(
            "Connected to {} (chain id {})",
            connection.url,
            connection.chain_id
        );
        Ok(connection)
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// Open JSON-RPC session with one node.
pub struct NodeConnection {
    client: Client,
    url: String,
    next_id: AtomicU64,
    chain_id: u64,
}

impl NodeConnection {
    pub fn url(&self) -> &str {
        &self.url
    }

    fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcError> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        log::debug!("-> {} {}", self.url, method);
        let response: JsonRpcResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .map_err(|e| RpcError::Transport(e.to_string()))?
            .json()
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(RpcError::Node {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{} returned no result", method)))?;
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

impl LedgerClient for NodeConnection {
    fn get_chain_id(&self) -> Result<u64, RpcError> {
        Ok(self.chain_id)
    }

    fn get_nonce(&self, address: Address) -> Result<u64, RpcError> {
        let nonce: String = self.request("eth_getTransactionCount", json!([address, "pending"]))?;
        parse_quantity_u64(&nonce)
    }

    fn suggest_gas_price(&self) -> Result<u128, RpcError> {
        let price: String = self.request("eth_gasPrice", json!([]))?;
        let digits = strip_hex_prefix(&price)?;
        u128::from_str_radix(digits, 16).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    fn get_balance(&self, address: Address) -> Result<U256, RpcError> {
        let balance: String = self.request("eth_getBalance", json!([address, "latest"]))?;
        let digits = strip_hex_prefix(&balance)?;
        U256::from_str_radix(digits, 16).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        let gas: String = self.request("eth_estimateGas", json!([request.to_json()]))?;
        parse_quantity_u64(&gas)
    }

    fn call_contract(&self, request: &CallRequest) -> Result<Bytes, RpcError> {
        let data: String = self.request("eth_call", json!([request.to_json(), "latest"]))?;
        let digits = strip_hex_prefix(&data)?;
        hex::decode(digits)
            .map(Bytes::from)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    fn submit_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        let raw_hex = format!("0x{}", hex::encode(raw));
        let hash: String = self.request("eth_sendRawTransaction", json!([raw_hex]))?;
        B256::from_str(&hash).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}

impl Drop for NodeConnection {
    fn drop(&mut self) {
        log::debug!("Closed connection to {}", self.url);
    }
}

fn strip_hex_prefix(value: &str) -> Result<&str, RpcError> {
    value
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::InvalidResponse(format!("expected hex value, got {:?}", value)))
}

fn parse_quantity_u64(value: &str) -> Result<u64, RpcError> {
    let digits = strip_hex_prefix(value)?;
    u64::from_str_radix(digits, 16).map_err(|e| RpcError::InvalidResponse(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity_u64("0x0").unwrap(), 0);
        assert_eq!(parse_quantity_u64("0x539").unwrap(), 1337);
        assert!(matches!(
            parse_quantity_u64("1337"),
            Err(RpcError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_quantity_u64("0xzz"),
            Err(RpcError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_call_request_json() {
        let request = CallRequest {
            from: Some(Address::repeat_byte(0x01)),
            to: Some(Address::repeat_byte(0x02)),
            data: Bytes::from(vec![0xab, 0xcd]),
            value: U256::ZERO,
        };
        let json = request.to_json();
        assert_eq!(json["data"], "0xabcd");
        assert_eq!(
            json["to"].as_str().unwrap().to_lowercase(),
            format!("0x{}", "02".repeat(20))
        );
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_creation_request_has_no_to() {
        let request = CallRequest {
            data: Bytes::from(vec![0x60]),
            value: U256::from(16u8),
            ..CallRequest::default()
        };
        let json = request.to_json();
        assert!(json.get("to").is_none());
        assert_eq!(json["value"], "0x10");
    }

    #[test]
    fn test_unreachable_node_is_transport_error() {
        let connector = HttpConnector::new(Duration::from_secs(2));
        let result = connector.connect("http://127.0.0.1:1");
        // an HTTP proxy answers for the refused node with a non-JSON-RPC body
        assert!(matches!(
            result,
            Err(RpcError::Transport(_)) | Err(RpcError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_mock_releases_connection_on_drop() {
        let connector = mock::MockConnector::new();
        {
            let _connection = connector.connect("mock").unwrap();
            assert_eq!(connector.state().open, 1);
        }
        assert_eq!(connector.state().open, 0);
        assert_eq!(connector.state().connects, 1);
    }
}
