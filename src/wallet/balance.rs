//! Balances, unlock rules and input selection.

use crate::utils::unix_now;
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::types::{TransferDetails, TransferHandle};
use rand::Rng;
use std::collections::HashSet;

/// Remove and return a uniformly random element.
fn pop_random_value(candidates: &mut Vec<usize>) -> Option<usize> {
	if candidates.is_empty() {
		return None;
	}
	let index = rand::rng().random_range(0..candidates.len());
	Some(candidates.swap_remove(index))
}

impl LightWallet {
	/// Unspent funds plus the change of transactions still waiting to be mined.
	pub fn balance(&self) -> u64 {
		let unspent = self
			.transfers
			.iter()
			.filter(|td| !td.spent)
			.fold(0u64, |acc, td| acc.saturating_add(td.amount()));
		self.unconfirmed_txs
			.values()
			.fold(unspent, |acc, utx| acc.saturating_add(utx.change))
	}

	/// Unspent funds that may be spent right now.
	pub fn unlocked_balance(&self) -> u64 {
		self.transfers
			.iter()
			.filter(|td| !td.spent && self.is_transfer_unlocked(td))
			.fold(0u64, |acc, td| acc.saturating_add(td.amount()))
	}

	/// Whether an unlock time (a height, or a Unix time above the max block number) has passed.
	pub fn is_tx_spendtime_unlocked(&self, unlock_time: u64) -> bool {
		if unlock_time < self.config.max_block_number {
			let current_height = self.blockchain_height().saturating_sub(1);
			current_height.saturating_add(self.config.locked_tx_allowed_delta_blocks) >= unlock_time
		} else {
			unix_now().saturating_add(self.config.locked_tx_allowed_delta_seconds) >= unlock_time
		}
	}

	pub fn is_transfer_unlocked(&self, td: &TransferDetails) -> bool {
		self.is_tx_spendtime_unlocked(td.tx.unlock_time())
			&& td.block_height.saturating_add(self.config.spendable_age) <= self.blockchain_height()
	}

	/// Pick unspent, unlocked outputs at random until they cover `needed`.
	///
	/// With `add_dust` one dust output is taken first when any is available, and dust is used
	/// once the regular outputs run out. Outputs in `excluded` are never picked.
	pub fn select_transfers(
		&self,
		needed: u64,
		add_dust: bool,
		dust_threshold: u64,
		excluded: &HashSet<usize>,
	) -> (u64, Vec<TransferHandle>) {
		let mut unused_transfers = Vec::new();
		let mut unused_dust = Vec::new();
		for (index, td) in self.transfers.iter().enumerate() {
			if td.spent || excluded.contains(&index) || !self.is_transfer_unlocked(td) {
				continue;
			}
			if dust_threshold < td.amount() {
				unused_transfers.push(index);
			} else {
				unused_dust.push(index);
			}
		}

		let mut selected = Vec::new();
		let mut found = 0u64;
		let mut select_one_dust = add_dust && !unused_dust.is_empty();
		while found < needed && (!unused_transfers.is_empty() || !unused_dust.is_empty()) {
			let picked = if select_one_dust {
				select_one_dust = false;
				pop_random_value(&mut unused_dust)
			} else if !unused_transfers.is_empty() {
				pop_random_value(&mut unused_transfers)
			} else {
				pop_random_value(&mut unused_dust)
			};
			let Some(index) = picked else {
				break;
			};

			let td = &self.transfers[index];
			selected.push(TransferHandle {
				index,
				key_image: td.key_image,
			});
			found = found.saturating_add(td.amount());
		}

		(found, selected)
	}
}
