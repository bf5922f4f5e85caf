//! Wallet RPC service.
//!
//! Each call rebuilds a `LightWallet` from the identity in its parameters, runs the method and
//! returns the resulting state. Nothing survives a call, so a failure simply produces an error
//! object and never a partially updated state.

use crate::config::WalletConfig;
use crate::crypto::{Hash, SecretKey};
use crate::daemon::{CORE_RPC_STATUS_BUSY, CORE_RPC_STATUS_OK, LedgerClient};
use crate::rpc::types::*;
use crate::transaction::builder::{TransactionError, extra_with_payment_id};
use crate::transaction::construct::TxDestinationEntry;
use crate::wallet::account::Account;
use crate::wallet::address::AccountAddress;
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::sync::events::LoggingEventHandler;
use crate::wallet::sync::state_persistence::WalletState;
use crate::wallet::types::WalletError;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const TRANSFER_TYPES: [&str; 3] = ["all", "available", "unavailable"];

/// Map an engine error to an RPC error, using `fallback` for anything without its own code.
fn wallet_error(e: WalletError, fallback: i64) -> RpcError {
	if e.is_busy() {
		return RpcError::new(WALLET_RPC_ERROR_CODE_DAEMON_IS_BUSY, e.to_string());
	}
	let code = match &e {
		WalletError::Address(_) => WALLET_RPC_ERROR_CODE_WRONG_ADDRESS,
		WalletError::Transaction(TransactionError::WrongPaymentId(_)) => {
			WALLET_RPC_ERROR_CODE_WRONG_PAYMENT_ID
		}
		_ => fallback,
	};
	RpcError::new(code, e.to_string())
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, RpcError> {
	let params = match params {
		Value::Null => Value::Object(Default::default()),
		other => other,
	};
	serde_json::from_value(params).map_err(|e| RpcError::invalid_params(e.to_string()))
}

fn to_result<T: Serialize>(response: T) -> Result<Value, RpcError> {
	serde_json::to_value(response)
		.map_err(|e| RpcError::new(WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR, e.to_string()))
}

/// Hex of a bincode blob. An empty string stands for the empty value.
fn decode_blob<T: DeserializeOwned + Default>(blob: &str, field: &str) -> Result<T, RpcError> {
	if blob.is_empty() {
		return Ok(T::default());
	}
	let bytes =
		hex::decode(blob).map_err(|e| RpcError::invalid_params(format!("{}: {}", field, e)))?;
	bincode::deserialize(&bytes).map_err(|e| RpcError::invalid_params(format!("{}: {}", field, e)))
}

fn encode_blob<T: Serialize + ?Sized>(value: &T) -> Result<String, RpcError> {
	bincode::serialize(value)
		.map(hex::encode)
		.map_err(|e| RpcError::new(WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR, e.to_string()))
}

fn state_fields(wallet: &LightWallet) -> Result<WalletStateFields, RpcError> {
	Ok(WalletStateFields {
		account_create_time: wallet.account().create_time(),
		local_bc_height: wallet.blockchain_height(),
		transfers: encode_blob(wallet.transfers())?,
		key_images: encode_blob(wallet.key_images())?,
	})
}

pub struct WalletRpcService {
	config: WalletConfig,
	client: Arc<dyn LedgerClient>,
}

impl WalletRpcService {
	pub fn new(config: WalletConfig, client: Arc<dyn LedgerClient>) -> Self {
		Self { config, client }
	}

	/// Handle one line of newline-delimited JSON-RPC and return the serialized response.
	pub async fn handle_line(&self, line: &str) -> String {
		let response = match serde_json::from_str::<Value>(line) {
			Ok(request) => self.handle(request).await,
			Err(e) => JsonRpcResponse::from_result(
				Value::Null,
				Err(RpcError::new(JSON_RPC_PARSE_ERROR, e.to_string())),
			),
		};
		serde_json::to_string(&response).unwrap_or_else(|e| {
			format!(
				"{{\"jsonrpc\":\"2.0\",\"id\":null,\"error\":{{\"code\":{},\"message\":\"{}\"}}}}",
				WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR, e
			)
		})
	}

	pub async fn handle(&self, request: Value) -> JsonRpcResponse {
		let request: JsonRpcRequest = match serde_json::from_value(request) {
			Ok(request) => request,
			Err(e) => {
				return JsonRpcResponse::from_result(
					Value::Null,
					Err(RpcError::new(JSON_RPC_INVALID_REQUEST, e.to_string())),
				);
			}
		};

		info!("RPC call {}", request.method);
		let result = self.dispatch(&request.method, request.params).await;
		if let Err(e) = &result {
			warn!("RPC call {} failed: {}", request.method, e);
		}
		JsonRpcResponse::from_result(request.id, result)
	}

	async fn dispatch(&self, method: &str, params: Value) -> Result<Value, RpcError> {
		match method {
			"set_wallet" => to_result(self.set_wallet(parse_params(params)?)?),
			"getbalance" => to_result(self.get_balance(parse_params(params)?)?),
			"refresh" => to_result(self.refresh(parse_params(params)?).await?),
			"transfer" => to_result(self.transfer(parse_params(params)?).await?),
			"transfer_split" => to_result(self.transfer_split(parse_params(params)?).await?),
			"incoming_transfers" => {
				to_result(self.incoming_transfers(parse_params(params)?)?)
			}
			"bc_height" => to_result(self.bc_height().await?),
			_ => Err(RpcError::new(
				JSON_RPC_METHOD_NOT_FOUND,
				format!("Method not found: {}", method),
			)),
		}
	}

	/// Rebuild the engine from caller-held keys and state.
	///
	/// The local chain is padded with unknown ids up to `local_bc_height` so that a refresh
	/// continues where the caller left off.
	fn open_wallet(
		&self,
		identity: &WalletIdentity,
		require_spend_key: bool,
	) -> Result<LightWallet, RpcError> {
		let address = AccountAddress::decode(&identity.address, &self.config.address_prefix)
			.map_err(|e| {
				RpcError::new(
					WALLET_RPC_ERROR_CODE_WRONG_ADDRESS,
					format!("WALLET_RPC_ERROR_CODE_WRONG_ADDRESS: {} ({})", identity.address, e),
				)
			})?;
		let view_key = SecretKey::from_hex(&identity.view_key)
			.map_err(|e| RpcError::invalid_params(format!("view_key: {}", e)))?;
		let spend_key = if identity.spend_key.is_empty() {
			None
		} else {
			Some(
				SecretKey::from_hex(&identity.spend_key)
					.map_err(|e| RpcError::invalid_params(format!("spend_key: {}", e)))?,
			)
		};
		if require_spend_key && spend_key.is_none() {
			return Err(RpcError::invalid_params("spend_key is required"));
		}

		let account = Account::from_keys(address, view_key, spend_key, identity.account_create_time)
			.ok_or_else(|| {
				RpcError::new(
					WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR,
					"keys do not match the address",
				)
			})?;

		let state = WalletState {
			transfers: decode_blob(&identity.transfers, "transfers")?,
			key_images: decode_blob(&identity.key_images, "key_images")?,
			..WalletState::new(address)
		};
		let mut wallet =
			LightWallet::from_parts(account, self.config.clone(), self.client.clone(), state)
				.map_err(|e| wallet_error(e, WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR))?;
		wallet.assume_scanned_up_to(identity.local_bc_height);
		wallet.register_handler(Box::new(LoggingEventHandler::new(self.config.coin_decimals)));
		debug!(
			"Opened wallet {} at height {} with {} transfers",
			identity.address,
			wallet.blockchain_height(),
			wallet.transfers().len()
		);
		Ok(wallet)
	}

	fn set_wallet(&self, identity: WalletIdentity) -> Result<SetWalletResponse, RpcError> {
		let wallet = self.open_wallet(&identity, false)?;
		let keys = wallet.account().keys();
		let address = keys
			.address
			.encode(&self.config.address_prefix)
			.map_err(|e| wallet_error(e.into(), WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR))?;
		Ok(SetWalletResponse {
			address,
			key: keys.view_secret_key.to_hex(),
		})
	}

	fn get_balance(&self, identity: WalletIdentity) -> Result<GetBalanceResponse, RpcError> {
		let wallet = self.open_wallet(&identity, false)?;
		Ok(GetBalanceResponse {
			balance: wallet.balance(),
			unlocked_balance: wallet.unlocked_balance(),
			state: state_fields(&wallet)?,
		})
	}

	async fn refresh(&self, identity: WalletIdentity) -> Result<RefreshResponse, RpcError> {
		let mut wallet = self.open_wallet(&identity, false)?;
		let summary = wallet
			.refresh_from_local_bc()
			.await
			.map_err(|e| wallet_error(e, WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR))?;
		Ok(RefreshResponse {
			txs_hashes: summary
				.received_tx_hashes
				.iter()
				.map(Hash::to_hex)
				.collect(),
			state: state_fields(&wallet)?,
		})
	}

	fn parse_destinations(
		&self,
		destinations: &[TransferDestination],
	) -> Result<Vec<TxDestinationEntry>, RpcError> {
		destinations
			.iter()
			.map(|dst| {
				AccountAddress::decode(&dst.address, &self.config.address_prefix)
					.map(|addr| TxDestinationEntry::new(dst.amount, addr))
					.map_err(|_| {
						RpcError::new(
							WALLET_RPC_ERROR_CODE_WRONG_ADDRESS,
							format!("WALLET_RPC_ERROR_CODE_WRONG_ADDRESS: {}", dst.address),
						)
					})
			})
			.collect()
	}

	/// Refresh, build and commit. Without `allow_split` the transfer must fit in one transaction.
	async fn send(
		&self,
		request: TransferRequest,
		allow_split: bool,
	) -> Result<(Vec<Hash>, WalletStateFields), RpcError> {
		let mut wallet = self.open_wallet(&request.identity, true)?;
		wallet
			.refresh_from_local_bc()
			.await
			.map_err(|e| wallet_error(e, WALLET_RPC_ERROR_CODE_GENERIC_TRANSFER_ERROR))?;

		let destinations = self.parse_destinations(&request.destinations)?;
		let extra = if request.payment_id.is_empty() {
			Vec::new()
		} else {
			extra_with_payment_id(&request.payment_id)
				.map_err(|e| RpcError::new(WALLET_RPC_ERROR_CODE_WRONG_PAYMENT_ID, e.to_string()))?
		};

		let ptxs = wallet
			.create_transactions(
				&destinations,
				request.mixin,
				request.unlock_time,
				request.fee,
				&extra,
			)
			.await
			.map_err(|e| wallet_error(e, WALLET_RPC_ERROR_CODE_GENERIC_TRANSFER_ERROR))?;
		if !allow_split && ptxs.len() != 1 {
			return Err(RpcError::new(
				WALLET_RPC_ERROR_CODE_GENERIC_TRANSFER_ERROR,
				"Transaction would be too large.  try /transfer_split.",
			));
		}

		let hashes = wallet
			.commit_txs(&ptxs)
			.await
			.map_err(|e| wallet_error(e, WALLET_RPC_ERROR_CODE_GENERIC_TRANSFER_ERROR))?;
		Ok((hashes, state_fields(&wallet)?))
	}

	async fn transfer(&self, request: TransferRequest) -> Result<TransferResponse, RpcError> {
		let (hashes, state) = self.send(request, false).await?;
		let tx_hash = hashes.last().map(Hash::to_hex).unwrap_or_default();
		Ok(TransferResponse { tx_hash, state })
	}

	async fn transfer_split(
		&self,
		request: TransferRequest,
	) -> Result<TransferSplitResponse, RpcError> {
		let (hashes, state) = self.send(request, true).await?;
		Ok(TransferSplitResponse {
			tx_hash_list: hashes.iter().map(Hash::to_hex).collect(),
			state,
		})
	}

	fn incoming_transfers(
		&self,
		request: IncomingTransfersRequest,
	) -> Result<IncomingTransfersResponse, RpcError> {
		let wallet = self.open_wallet(&request.identity, false)?;
		if !TRANSFER_TYPES.contains(&request.transfer_type.as_str()) {
			return Err(RpcError::new(
				WALLET_RPC_ERROR_CODE_TRANSFER_TYPE,
				"Transfer type must be one of: all, available, or unavailable",
			));
		}

		let filter = match request.transfer_type.as_str() {
			"available" => Some(false),
			"unavailable" => Some(true),
			_ => None,
		};
		let transfers: Vec<IncomingTransfer> = wallet
			.transfers()
			.iter()
			.filter(|td| filter.is_none_or(|spent| td.spent == spent))
			.map(|td| IncomingTransfer {
				amount: td.amount(),
				spent: td.spent,
				global_index: td.global_output_index,
				tx_hash: td.tx_hash.to_hex(),
			})
			.collect();

		if transfers.is_empty() {
			return Err(RpcError::new(
				WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR,
				format!("No {} transfers found", request.transfer_type),
			));
		}
		Ok(IncomingTransfersResponse { transfers })
	}

	async fn bc_height(&self) -> Result<BcHeightResponse, RpcError> {
		let response = self
			.client
			.get_height()
			.await
			.map_err(|e| RpcError::new(WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR, e.to_string()))?;
		match response.status.as_str() {
			CORE_RPC_STATUS_OK => Ok(BcHeightResponse {
				height: response.height,
			}),
			CORE_RPC_STATUS_BUSY => Err(RpcError::new(
				WALLET_RPC_ERROR_CODE_DAEMON_IS_BUSY,
				"daemon is busy",
			)),
			status => Err(RpcError::new(
				WALLET_RPC_ERROR_CODE_UNKNOWN_ERROR,
				format!("getheight returned status {}", status),
			)),
		}
	}
}
