//! HTTP client for the remote daemon.
//!
//! This module provides the `LedgerClient` trait the wallet consumes and its default
//! implementation over JSON POST requests. All methods are async and designed for use with Tokio.

use super::types::*;
use crate::crypto::Hash;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::debug;

/// The daemon operations the wallet depends on.
#[async_trait::async_trait]
pub trait LedgerClient: Send + Sync {
	async fn get_blocks(&self, request: &GetBlocksRequest) -> Result<GetBlocksResponse, LedgerError>;

	async fn get_output_indices(&self, txid: &Hash) -> Result<GetOutputIndicesResponse, LedgerError>;

	async fn get_random_outputs(
		&self,
		amounts: &[u64],
		outs_count: u64,
	) -> Result<GetRandomOutputsResponse, LedgerError>;

	async fn send_raw_transaction(&self, tx_as_hex: &str) -> Result<SendRawTxResponse, LedgerError>;

	async fn get_height(&self) -> Result<GetHeightResponse, LedgerError>;
}

/// JSON-over-HTTP daemon client
#[derive(Clone)]
pub struct DaemonClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the daemon, without a trailing slash.
	daemon_address: String,
}

impl DaemonClient {
	/// Create a new daemon client.
	///
	/// # Arguments
	/// * `daemon_address` - Base URL such as `http://localhost:11181`.
	/// * `timeout` - Per-request timeout.
	pub fn new(daemon_address: String, timeout: Duration) -> Result<Self, LedgerError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			daemon_address: daemon_address.trim_end_matches('/').to_string(),
		})
	}

	/// POST `body` to `path` and decode the JSON reply.
	///
	/// # Returns
	/// The decoded response, or a `LedgerError` if the request or decoding fails.
	async fn invoke<Req, Resp>(&self, path: &str, body: &Req) -> Result<Resp, LedgerError>
	where
		Req: Serialize + Sync,
		Resp: DeserializeOwned,
	{
		let url = format!("{}{}", self.daemon_address, path);
		debug!("Daemon request: {}", url);

		let response = self
			.http_client
			.post(&url)
			.header("Content-Type", "application/json")
			.json(body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(LedgerError::Transport(format!(
				"HTTP error from {}: {}",
				path,
				response.status()
			)));
		}

		let bytes = response.bytes().await?;
		Ok(serde_json::from_slice(&bytes)?)
	}
}

#[async_trait::async_trait]
impl LedgerClient for DaemonClient {
	async fn get_blocks(&self, request: &GetBlocksRequest) -> Result<GetBlocksResponse, LedgerError> {
		self.invoke("/getblocks", request).await
	}

	async fn get_output_indices(&self, txid: &Hash) -> Result<GetOutputIndicesResponse, LedgerError> {
		let request = GetOutputIndicesRequest {
			txid: txid.to_hex(),
		};
		self.invoke("/get_o_indexes", &request).await
	}

	async fn get_random_outputs(
		&self,
		amounts: &[u64],
		outs_count: u64,
	) -> Result<GetRandomOutputsResponse, LedgerError> {
		let request = GetRandomOutputsRequest {
			amounts: amounts.to_vec(),
			outs_count,
		};
		self.invoke("/getrandom_outs", &request).await
	}

	async fn send_raw_transaction(&self, tx_as_hex: &str) -> Result<SendRawTxResponse, LedgerError> {
		let request = SendRawTxRequest {
			tx_as_hex: tx_as_hex.to_string(),
		};
		self.invoke("/sendrawtransaction", &request).await
	}

	async fn get_height(&self) -> Result<GetHeightResponse, LedgerError> {
		self.invoke("/getheight", &serde_json::json!({})).await
	}
}
