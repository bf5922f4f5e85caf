use crate::crypto::{CryptoError, Hash, KeyImage};
use crate::daemon::LedgerError;
use crate::transaction::builder::TransactionError;
use crate::transaction::{Transaction, TxOut};
use crate::wallet::address::AddressError;

use serde::{Deserialize, Serialize};

/// An output owned by the wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferDetails {
	pub block_height: u64,
	/// The transaction that created the output.
	pub tx: Transaction,
	pub tx_hash: Hash,
	pub internal_output_index: usize,
	pub global_output_index: u64,
	pub spent: bool,
	/// Null for outputs recorded by a view-only account.
	pub key_image: KeyImage,
}

impl TransferDetails {
	pub fn output(&self) -> Option<&TxOut> {
		self.tx.prefix.vout.get(self.internal_output_index)
	}

	pub fn amount(&self) -> u64 {
		self.output().map(|out| out.amount).unwrap_or(0)
	}
}

/// A transaction this wallet sent that has not yet been seen in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnconfirmedTransfer {
	pub tx: Transaction,
	pub change: u64,
	/// Unix seconds.
	pub sent_time: u64,
}

/// Funds received under a payment id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
	pub tx_hash: Hash,
	pub amount: u64,
	pub block_height: u64,
	pub unlock_time: u64,
}

/// Stable reference to a selected output, re-validated before it is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransferHandle {
	pub index: usize,
	pub key_image: KeyImage,
}

/// Result of one refresh call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshSummary {
	pub blocks_fetched: u64,
	/// Whether any owned output was found during the call.
	pub received_money: bool,
	/// Transactions that brought funds, in processing order.
	pub received_tx_hashes: Vec<Hash>,
	/// Set when a `refresh_until` target was observed.
	pub target_found: bool,
}

#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
	#[error("Ledger error: {0}")]
	Ledger(#[from] LedgerError),

	#[error("Daemon is busy: {0}")]
	DaemonBusy(String),

	#[error("Protocol error: {0}")]
	Protocol(String),

	#[error("Internal consistency error: {0}")]
	Consistency(String),

	#[error("Transaction error: {0}")]
	Transaction(#[from] TransactionError),

	#[error("Invalid password")]
	InvalidPassword,

	#[error("Wallet files do not correspond: {0}")]
	FilesDontCorrespond(String),

	#[error("File already exists: {0}")]
	FileExists(String),

	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Serialization error: {0}")]
	Serialization(#[from] bincode::Error),

	#[error("Crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("Address error: {0}")]
	Address(#[from] AddressError),

	#[error("Storage error: {0}")]
	Storage(String),
}

impl WalletError {
	/// Transient daemon failures that a refresh retries.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			WalletError::Ledger(_) | WalletError::DaemonBusy(_) | WalletError::Protocol(_)
		)
	}

	pub fn is_busy(&self) -> bool {
		matches!(self, WalletError::DaemonBusy(_))
	}
}
