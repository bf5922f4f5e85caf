//! In-memory daemon for tests.

use super::client::LedgerClient;
use super::types::*;
use crate::crypto::{Hash, PublicKey, generate_keys};
use crate::test_utils::block_with;
use crate::transaction::{Block, Transaction};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Mutex;

struct MockState {
	blocks: Vec<(Block, Vec<Transaction>)>,
	/// Every output on the chain, per amount, in global index order.
	outputs: HashMap<u64, Vec<PublicKey>>,
	tx_output_indices: HashMap<Hash, Vec<u64>>,
	batch_size: usize,
	busy_get_blocks: usize,
	failing_get_blocks: usize,
	busy_output_indices: usize,
	decoy_limit: Option<usize>,
	send_status: String,
	sent: Vec<String>,
	get_blocks_calls: usize,
}

pub struct MockLedger {
	state: Mutex<MockState>,
}

impl Default for MockLedger {
	fn default() -> Self {
		Self::new()
	}
}

impl MockLedger {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(MockState {
				blocks: Vec::new(),
				outputs: HashMap::new(),
				tx_output_indices: HashMap::new(),
				batch_size: 100,
				busy_get_blocks: 0,
				failing_get_blocks: 0,
				busy_output_indices: 0,
				decoy_limit: None,
				send_status: CORE_RPC_STATUS_OK.to_string(),
				sent: Vec::new(),
				get_blocks_calls: 0,
			}),
		}
	}

	fn register_outputs(state: &mut MockState, tx: &Transaction) {
		let indices = tx
			.prefix
			.vout
			.iter()
			.map(|out| {
				let keys = state.outputs.entry(out.amount).or_default();
				keys.push(out.key);
				keys.len() as u64 - 1
			})
			.collect();
		state.tx_output_indices.insert(tx.hash().unwrap(), indices);
	}

	/// Append a block with a timestamp far in the future of any test account.
	pub fn push_block(&self, txs: Vec<Transaction>) -> Hash {
		self.push_block_at(txs, u64::MAX / 2)
	}

	pub fn push_block_at(&self, txs: Vec<Transaction>, timestamp: u64) -> Hash {
		let mut state = self.state.lock().unwrap();
		let height = state.blocks.len() as u64;
		let prev_id = state
			.blocks
			.last()
			.map(|(block, _)| block.hash().unwrap())
			.unwrap_or(Hash::NULL);
		let block = block_with(prev_id, height, timestamp, &txs);
		let id = block.hash().unwrap();

		Self::register_outputs(&mut state, &block.miner_tx);
		for tx in &txs {
			Self::register_outputs(&mut state, tx);
		}
		state.blocks.push((block, txs));
		id
	}

	/// Drop every block from `height` on, simulating a reorganization.
	pub fn truncate(&self, height: usize) {
		self.state.lock().unwrap().blocks.truncate(height);
	}

	/// Add `count` outputs of `amount` owned by nobody in particular.
	pub fn push_foreign_outputs(&self, amount: u64, count: usize) {
		let mut state = self.state.lock().unwrap();
		let keys = state.outputs.entry(amount).or_default();
		for _ in 0..count {
			keys.push(generate_keys().0);
		}
	}

	pub fn block_id(&self, height: usize) -> Hash {
		self.state.lock().unwrap().blocks[height].0.hash().unwrap()
	}

	pub fn height(&self) -> usize {
		self.state.lock().unwrap().blocks.len()
	}

	pub fn set_batch_size(&self, batch_size: usize) {
		self.state.lock().unwrap().batch_size = batch_size;
	}

	/// Answer the next `count` block requests with BUSY.
	pub fn set_busy_get_blocks(&self, count: usize) {
		self.state.lock().unwrap().busy_get_blocks = count;
	}

	/// Fail the next `count` block requests at the transport level.
	pub fn set_failing_get_blocks(&self, count: usize) {
		self.state.lock().unwrap().failing_get_blocks = count;
	}

	pub fn set_busy_output_indices(&self, count: usize) {
		self.state.lock().unwrap().busy_output_indices = count;
	}

	/// Return at most `limit` random outputs per amount.
	pub fn set_decoy_limit(&self, limit: usize) {
		self.state.lock().unwrap().decoy_limit = Some(limit);
	}

	pub fn set_send_status(&self, status: &str) {
		self.state.lock().unwrap().send_status = status.to_string();
	}

	pub fn sent(&self) -> Vec<String> {
		self.state.lock().unwrap().sent.clone()
	}

	pub fn get_blocks_calls(&self) -> usize {
		self.state.lock().unwrap().get_blocks_calls
	}
}

#[async_trait::async_trait]
impl LedgerClient for MockLedger {
	async fn get_blocks(&self, request: &GetBlocksRequest) -> Result<GetBlocksResponse, LedgerError> {
		let mut state = self.state.lock().unwrap();
		state.get_blocks_calls += 1;
		if state.failing_get_blocks > 0 {
			state.failing_get_blocks -= 1;
			return Err(LedgerError::Transport("connection reset".to_string()));
		}
		if state.busy_get_blocks > 0 {
			state.busy_get_blocks -= 1;
			return Ok(GetBlocksResponse {
				status: CORE_RPC_STATUS_BUSY.to_string(),
				start_height: 0,
				current_height: 0,
				blocks: Vec::new(),
			});
		}

		let ids: Vec<Hash> = state
			.blocks
			.iter()
			.map(|(block, _)| block.hash().unwrap())
			.collect();
		let start = if request.start_height > 0 {
			request.start_height as usize
		} else {
			request
				.block_ids
				.iter()
				.filter_map(|id| Hash::from_hex(id).ok())
				.find_map(|id| ids.iter().position(|known| *known == id))
				.unwrap_or(0)
		};
		let end = (start + state.batch_size).min(state.blocks.len());

		let blocks = state
			.blocks
			.get(start..end)
			.unwrap_or(&[])
			.iter()
			.map(|(block, txs)| BlockCompleteEntry {
				block: hex::encode(block.to_blob().unwrap()),
				txs: txs
					.iter()
					.map(|tx| hex::encode(tx.to_blob().unwrap()))
					.collect(),
			})
			.collect();

		Ok(GetBlocksResponse {
			status: CORE_RPC_STATUS_OK.to_string(),
			start_height: start as u64,
			current_height: state.blocks.len() as u64,
			blocks,
		})
	}

	async fn get_output_indices(&self, txid: &Hash) -> Result<GetOutputIndicesResponse, LedgerError> {
		let mut state = self.state.lock().unwrap();
		if state.busy_output_indices > 0 {
			state.busy_output_indices -= 1;
			return Ok(GetOutputIndicesResponse {
				status: CORE_RPC_STATUS_BUSY.to_string(),
				o_indexes: Vec::new(),
			});
		}
		Ok(match state.tx_output_indices.get(txid) {
			Some(indices) => GetOutputIndicesResponse {
				status: CORE_RPC_STATUS_OK.to_string(),
				o_indexes: indices.clone(),
			},
			None => GetOutputIndicesResponse {
				status: "Failed".to_string(),
				o_indexes: Vec::new(),
			},
		})
	}

	async fn get_random_outputs(
		&self,
		amounts: &[u64],
		outs_count: u64,
	) -> Result<GetRandomOutputsResponse, LedgerError> {
		let state = self.state.lock().unwrap();
		let limit = state
			.decoy_limit
			.unwrap_or(usize::MAX)
			.min(outs_count as usize);

		let outs = amounts
			.iter()
			.map(|amount| {
				let keys = state.outputs.get(amount).cloned().unwrap_or_default();
				let mut indices: Vec<usize> = (0..keys.len()).collect();
				indices.shuffle(&mut rand::rng());
				OutsForAmount {
					amount: *amount,
					outs: indices
						.into_iter()
						.take(limit)
						.map(|index| OutEntry {
							global_amount_index: index as u64,
							out_key: keys[index].to_hex(),
						})
						.collect(),
				}
			})
			.collect();

		Ok(GetRandomOutputsResponse {
			status: CORE_RPC_STATUS_OK.to_string(),
			outs,
		})
	}

	async fn send_raw_transaction(&self, tx_as_hex: &str) -> Result<SendRawTxResponse, LedgerError> {
		let mut state = self.state.lock().unwrap();
		let status = state.send_status.clone();
		if status == CORE_RPC_STATUS_OK {
			state.sent.push(tx_as_hex.to_string());
		}
		Ok(SendRawTxResponse { status })
	}

	async fn get_height(&self) -> Result<GetHeightResponse, LedgerError> {
		Ok(GetHeightResponse {
			status: CORE_RPC_STATUS_OK.to_string(),
			height: self.height() as u64,
		})
	}
}
