//! Wire types for the remote daemon's JSON endpoints.
//!
//! Blocks, transactions and keys travel as hex strings; the wallet decodes them. Every response
//! carries a `status` that is `OK` on success and `BUSY` while the daemon is still syncing.

use serde::{Deserialize, Serialize};

pub const CORE_RPC_STATUS_OK: &str = "OK";
pub const CORE_RPC_STATUS_BUSY: &str = "BUSY";

/// Request for the next batch of blocks after the common ancestor of `block_ids`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlocksRequest {
    /// Short chain history, newest first, genesis last.
    pub block_ids: Vec<String>,
    /// Explicit start height. Zero lets the daemon pick from `block_ids`.
    pub start_height: u64,
}

/// A block blob plus the blobs of its non-coinbase transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockCompleteEntry {
    pub block: String,
    #[serde(default)]
    pub txs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlocksResponse {
    pub status: String,
    #[serde(default)]
    pub start_height: u64,
    #[serde(default)]
    pub current_height: u64,
    #[serde(default)]
    pub blocks: Vec<BlockCompleteEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOutputIndicesRequest {
    pub txid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOutputIndicesResponse {
    pub status: String,
    /// Global per-amount index of each output of the transaction, in output order.
    #[serde(default)]
    pub o_indexes: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRandomOutputsRequest {
    pub amounts: Vec<u64>,
    pub outs_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutEntry {
    pub global_amount_index: u64,
    pub out_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutsForAmount {
    pub amount: u64,
    #[serde(default)]
    pub outs: Vec<OutEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetRandomOutputsResponse {
    pub status: String,
    #[serde(default)]
    pub outs: Vec<OutsForAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRawTxRequest {
    pub tx_as_hex: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRawTxResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetHeightResponse {
    pub status: String,
    #[serde(default)]
    pub height: u64,
}

/// Errors raised while talking to the daemon.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}
