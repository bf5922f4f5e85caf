use crate::crypto::Hash;
use crate::daemon::BlockCompleteEntry;
use crate::transaction::{Block, Transaction};
use crate::wallet::types::WalletError;
use tracing::error;

/// A block entry decoded from its hex blobs.
#[derive(Debug, Clone)]
pub struct ParsedBlock {
	pub block: Block,
	pub id: Hash,
	pub txs: Vec<(Hash, Transaction)>,
}

#[derive(Clone, Default)]
pub struct TransactionProcessor;

impl TransactionProcessor {
	pub fn new() -> Self {
		Self
	}

	/// Parse raw transaction hex
	pub fn parse_transaction(&self, raw_hex: &str) -> Result<Transaction, WalletError> {
		let tx_bytes = hex::decode(raw_hex).map_err(|e| {
			error!("[PARSE_TRANSACTION] Failed to decode hex: {}", e);
			WalletError::Protocol(format!("Failed to decode transaction hex: {}", e))
		})?;

		Transaction::from_blob(&tx_bytes).map_err(|e| {
			error!(
				"[PARSE_TRANSACTION] Failed to deserialize transaction: {}",
				e
			);
			WalletError::Protocol(format!("Failed to deserialize transaction: {}", e))
		})
	}

	pub fn parse_block(&self, raw_hex: &str) -> Result<Block, WalletError> {
		let block_bytes = hex::decode(raw_hex).map_err(|e| {
			error!("[PARSE_BLOCK] Failed to decode hex: {}", e);
			WalletError::Protocol(format!("Failed to decode block hex: {}", e))
		})?;

		Block::from_blob(&block_bytes).map_err(|e| {
			error!("[PARSE_BLOCK] Failed to deserialize block: {}", e);
			WalletError::Protocol(format!("Failed to deserialize block: {}", e))
		})
	}

	/// Decode a block and every transaction that came with it.
	pub fn parse_block_entry(&self, entry: &BlockCompleteEntry) -> Result<ParsedBlock, WalletError> {
		let block = self.parse_block(&entry.block)?;
		let id = block.hash()?;

		let mut txs = Vec::with_capacity(entry.txs.len());
		for raw in &entry.txs {
			let tx = self.parse_transaction(raw)?;
			txs.push((tx.hash()?, tx));
		}

		Ok(ParsedBlock { block, id, txs })
	}
}
