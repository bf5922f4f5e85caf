//! JSON-RPC envelope and method payloads of the wallet façade.
//!
//! Every wallet method carries the caller-held identity (keys plus the serialized scan state)
//! and answers with the updated state in the same encoding, so the service itself keeps
//! nothing between calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR: i64 = -1;
pub const WALLET_RPC_ERROR_CODE_WRONG_ADDRESS: i64 = -2;
pub const WALLET_RPC_ERROR_CODE_DAEMON_IS_BUSY: i64 = -3;
pub const WALLET_RPC_ERROR_CODE_GENERIC_TRANSFER_ERROR: i64 = -4;
pub const WALLET_RPC_ERROR_CODE_WRONG_PAYMENT_ID: i64 = -5;
pub const WALLET_RPC_ERROR_CODE_TRANSFER_TYPE: i64 = -6;
pub const JSON_RPC_PARSE_ERROR: i64 = -32700;
pub const JSON_RPC_INVALID_REQUEST: i64 = -32600;
pub const JSON_RPC_METHOD_NOT_FOUND: i64 = -32601;
pub const JSON_RPC_INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(JSON_RPC_INVALID_PARAMS, message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result,
            error,
        }
    }
}

/// Keys and scan state supplied by the caller on every wallet call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletIdentity {
    pub address: String,
    /// Hex view secret key.
    pub view_key: String,
    /// Hex spend secret key. Empty for calls that never sign.
    #[serde(default)]
    pub spend_key: String,
    #[serde(default)]
    pub account_create_time: u64,
    /// Number of blocks the caller has already scanned.
    #[serde(default)]
    pub local_bc_height: u64,
    /// Hex of the serialized owned outputs.
    #[serde(default)]
    pub transfers: String,
    /// Hex of the serialized key-image index.
    #[serde(default)]
    pub key_images: String,
}

/// Updated scan state returned to the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletStateFields {
    pub account_create_time: u64,
    pub local_bc_height: u64,
    pub transfers: String,
    pub key_images: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetWalletResponse {
    pub address: String,
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBalanceResponse {
    pub balance: u64,
    pub unlocked_balance: u64,
    #[serde(flatten)]
    pub state: WalletStateFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub txs_hashes: Vec<String>,
    #[serde(flatten)]
    pub state: WalletStateFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferDestination {
    pub amount: u64,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub destinations: Vec<TransferDestination>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub mixin: usize,
    #[serde(default)]
    pub unlock_time: u64,
    #[serde(default)]
    pub payment_id: String,
    #[serde(flatten)]
    pub identity: WalletIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub tx_hash: String,
    #[serde(flatten)]
    pub state: WalletStateFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSplitResponse {
    pub tx_hash_list: Vec<String>,
    #[serde(flatten)]
    pub state: WalletStateFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTransfersRequest {
    pub transfer_type: String,
    #[serde(flatten)]
    pub identity: WalletIdentity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomingTransfer {
    pub amount: u64,
    pub spent: bool,
    pub global_index: u64,
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingTransfersResponse {
    pub transfers: Vec<IncomingTransfer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BcHeightResponse {
    pub height: u64,
}
