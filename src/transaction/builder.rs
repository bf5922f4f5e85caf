//! Transfer builder
//!
//! This module assembles spend transactions for a `LightWallet`: it selects inputs, fetches
//! decoy outputs from the daemon to form rings, splits destinations and change into outputs,
//! signs, and checks the result against the size limit. Nothing in the wallet changes until the
//! resulting `PendingTransaction` is committed.

use crate::crypto::{CryptoError, Hash, PublicKey};
use crate::daemon::{CORE_RPC_STATUS_BUSY, CORE_RPC_STATUS_OK, OutEntry};
use crate::transaction::construct::{TxDestinationEntry, TxSourceEntry, construct_tx};
use crate::transaction::extra::{
	ExtraError, add_extra_nonce_to_tx_extra, get_tx_pub_key_from_extra, parse_payment_id,
	set_payment_id_to_tx_extra_nonce,
};
use crate::transaction::split::{DustPolicy, SplitStrategy};
use crate::transaction::types::Transaction;
use crate::utils::format_money;
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::types::{TransferHandle, WalletError};

use itertools::Itertools;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransactionError {
	#[error("Zero destination")]
	ZeroDestination,

	#[error("Transaction amount overflow")]
	AmountOverflow,

	#[error("Fee {fee} is below the minimum fee {min_fee}")]
	FeeTooLow { fee: u64, min_fee: u64 },

	#[error("Not enough money: found {found}, needed {needed} plus fee {fee}")]
	NotEnoughMoney { found: u64, needed: u64, fee: u64 },

	#[error("Not enough outputs to mix with {mixin} decoys: {scanty:?}")]
	NotEnoughOutsToMix { scanty: Vec<(u64, usize)>, mixin: usize },

	#[error("Transaction too big: {size} bytes, limit {limit}")]
	TxTooBig { size: usize, limit: usize },

	#[error("Transaction not constructed: {0}")]
	NotConstructed(String),

	#[error("Unexpected transaction input type")]
	UnexpectedInputType,

	#[error("Wrong payment id: {0}")]
	WrongPaymentId(String),

	#[error("Selected output is no longer spendable: {0}")]
	StaleSelection(String),

	#[error("Transaction {tx_hash} rejected by daemon with status {status}")]
	TxRejected { tx_hash: Hash, status: String },

	#[error("View-only wallet cannot sign transactions")]
	ViewOnly,

	#[error("Transaction validation error: {0}")]
	ValidationError(String),

	#[error("Crypto error: {0}")]
	Crypto(#[from] CryptoError),

	#[error("Serialization error: {0}")]
	Serialization(#[from] bincode::Error),

	#[error("Extra error: {0}")]
	Extra(#[from] ExtraError),
}

/// A signed transaction that has not been sent yet.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
	pub tx: Transaction,
	pub tx_hash: Hash,
	pub fee: u64,
	pub dust: u64,
	pub change_dts: TxDestinationEntry,
	pub selected_transfers: Vec<TransferHandle>,
	/// Hex key images of the inputs, space separated.
	pub key_images: String,
}

/// Extra nonce carrying a 64 hex character payment id.
pub fn extra_with_payment_id(payment_id: &str) -> Result<Vec<u8>, TransactionError> {
	let Some(id) = parse_payment_id(payment_id) else {
		return Err(TransactionError::WrongPaymentId(format!(
			"payment id has invalid format: \"{}\", expected 64-character string",
			payment_id
		)));
	};
	let mut extra = Vec::new();
	add_extra_nonce_to_tx_extra(&mut extra, &set_payment_id_to_tx_extra_nonce(&id))?;
	Ok(extra)
}

/// Break every destination into `parts` pieces; the last piece carries the remainder.
///
/// Returns one destination list per resulting transaction.
pub fn split_amounts(
	destinations: &[TxDestinationEntry],
	parts: usize,
) -> Vec<Vec<TxDestinationEntry>> {
	let parts = parts.max(1);
	let mut split: Vec<Vec<TxDestinationEntry>> = vec![Vec::new(); parts];
	for de in destinations {
		let piece = de.amount / parts as u64;
		for (n, dsts) in split.iter_mut().enumerate() {
			let amount = if n + 1 == parts {
				de.amount - piece * (parts as u64 - 1)
			} else {
				piece
			};
			dsts.push(TxDestinationEntry::new(amount, de.addr));
		}
	}
	split
}

/// Builder for a single transfer from a wallet
pub struct TransferBuilder<'a> {
	wallet: &'a LightWallet,
	destinations: Vec<TxDestinationEntry>,
	fake_outputs_count: usize,
	unlock_time: u64,
	fee: u64,
	extra: Vec<u8>,
	payment_id: Option<String>,
	split_strategy: SplitStrategy,
	dust_policy: DustPolicy,
	excluded: HashSet<usize>,
}

impl<'a> TransferBuilder<'a> {
	pub fn new(wallet: &'a LightWallet) -> Self {
		Self {
			wallet,
			destinations: Vec::new(),
			fake_outputs_count: 0,
			unlock_time: 0,
			fee: 0,
			extra: Vec::new(),
			payment_id: None,
			split_strategy: SplitStrategy::default(),
			dust_policy: DustPolicy::new(wallet.config().dust_threshold),
			excluded: HashSet::new(),
		}
	}

	pub fn with_destinations(mut self, destinations: Vec<TxDestinationEntry>) -> Self {
		self.destinations = destinations;
		self
	}

	/// Number of decoys per input.
	pub fn with_mixin(mut self, fake_outputs_count: usize) -> Self {
		self.fake_outputs_count = fake_outputs_count;
		self
	}

	pub fn with_unlock_time(mut self, unlock_time: u64) -> Self {
		self.unlock_time = unlock_time;
		self
	}

	pub fn with_fee(mut self, fee: u64) -> Self {
		self.fee = fee;
		self
	}

	pub fn with_extra(mut self, extra: Vec<u8>) -> Self {
		self.extra = extra;
		self
	}

	pub fn with_payment_id(mut self, payment_id: impl Into<String>) -> Self {
		self.payment_id = Some(payment_id.into());
		self
	}

	pub fn with_split_strategy(mut self, split_strategy: SplitStrategy) -> Self {
		self.split_strategy = split_strategy;
		self
	}

	pub fn with_dust_policy(mut self, dust_policy: DustPolicy) -> Self {
		self.dust_policy = dust_policy;
		self
	}

	/// Never spend the transfers at these indices.
	pub fn excluding(mut self, excluded: HashSet<usize>) -> Self {
		self.excluded = excluded;
		self
	}

	/// Request decoys for every selected amount and merge the real outputs into rings.
	async fn prepare_sources(
		&self,
		selected: &[TransferHandle],
	) -> Result<Vec<TxSourceEntry>, WalletError> {
		let wallet = self.wallet;
		let mut daemon_outs: Vec<Vec<OutEntry>> = vec![Vec::new(); selected.len()];

		if self.fake_outputs_count > 0 {
			let amounts: Vec<u64> = selected
				.iter()
				.map(|h| wallet.transfers[h.index].amount())
				.collect();
			let response = wallet
				.client
				.get_random_outputs(&amounts, self.fake_outputs_count as u64 + 1)
				.await?;
			if response.status == CORE_RPC_STATUS_BUSY {
				return Err(WalletError::DaemonBusy("getrandom_outs".to_string()));
			}
			if response.status != CORE_RPC_STATUS_OK {
				return Err(WalletError::Protocol(format!(
					"getrandom_outs returned status {}",
					response.status
				)));
			}
			if response.outs.len() != selected.len() {
				return Err(WalletError::Protocol(format!(
					"getrandom_outs returned wrong amounts count = {}, expected {}",
					response.outs.len(),
					selected.len()
				)));
			}

			let scanty: Vec<(u64, usize)> = response
				.outs
				.iter()
				.filter(|o| o.outs.len() < self.fake_outputs_count)
				.map(|o| (o.amount, o.outs.len()))
				.collect();
			if !scanty.is_empty() {
				return Err(TransactionError::NotEnoughOutsToMix {
					scanty,
					mixin: self.fake_outputs_count,
				}
				.into());
			}
			daemon_outs = response.outs.into_iter().map(|o| o.outs).collect();
		}

		let mut sources = Vec::with_capacity(selected.len());
		for (handle, mut outs) in selected.iter().zip(daemon_outs) {
			let td = &wallet.transfers[handle.index];
			let real_out = td.output().ok_or_else(|| {
				WalletError::Consistency(format!("transfer {} has no output", handle.index))
			})?;

			outs.sort_by_key(|o| o.global_amount_index);
			let mut outputs = Vec::with_capacity(self.fake_outputs_count + 1);
			for out in outs
				.iter()
				.filter(|o| o.global_amount_index != td.global_output_index)
				.take(self.fake_outputs_count)
			{
				let key = PublicKey::from_hex(&out.out_key).map_err(|e| {
					WalletError::Protocol(format!("invalid decoy key {}: {}", out.out_key, e))
				})?;
				outputs.push((out.global_amount_index, key));
			}

			let real_output = outputs
				.iter()
				.position(|(index, _)| *index >= td.global_output_index)
				.unwrap_or(outputs.len());
			outputs.insert(real_output, (td.global_output_index, real_out.key));

			let real_out_tx_key = get_tx_pub_key_from_extra(&td.tx.prefix.extra).ok_or_else(|| {
				TransactionError::NotConstructed(format!(
					"transaction {} has no public key",
					td.tx_hash
				))
			})?;

			sources.push(TxSourceEntry {
				outputs,
				real_output,
				real_out_tx_key,
				real_output_in_tx_index: td.internal_output_index,
				amount: real_out.amount,
			});
		}
		Ok(sources)
	}

	/// Builds the signed transaction
	pub async fn build(self) -> Result<PendingTransaction, WalletError> {
		log::info!("Starting transaction build process");
		let wallet = self.wallet;
		let config = wallet.config();

		if self.destinations.is_empty() || self.destinations.iter().any(|de| de.amount == 0) {
			return Err(TransactionError::ZeroDestination.into());
		}
		let mut needed_money = 0u64;
		for de in &self.destinations {
			needed_money = needed_money
				.checked_add(de.amount)
				.ok_or(TransactionError::AmountOverflow)?;
		}
		let destinations_money = needed_money;
		needed_money = needed_money
			.checked_add(self.fee)
			.ok_or(TransactionError::AmountOverflow)?;
		if self.fee < config.min_fee {
			return Err(TransactionError::FeeTooLow {
				fee: self.fee,
				min_fee: config.min_fee,
			}
			.into());
		}

		let mut extra = self.extra.clone();
		if let Some(payment_id) = &self.payment_id {
			extra.extend(extra_with_payment_id(payment_id)?);
		}

		let (found_money, selected) = wallet.select_transfers(
			needed_money,
			self.fake_outputs_count == 0,
			self.dust_policy.dust_threshold,
			&self.excluded,
		);
		if found_money < needed_money {
			return Err(TransactionError::NotEnoughMoney {
				found: found_money,
				needed: destinations_money,
				fee: self.fee,
			}
			.into());
		}
		log::info!(
			"Selected {} inputs holding {} for {} plus fee {}",
			selected.len(),
			format_money(found_money, config.coin_decimals),
			format_money(destinations_money, config.coin_decimals),
			format_money(self.fee, config.coin_decimals)
		);

		let sources = self.prepare_sources(&selected).await?;

		let own_address = *wallet.account().address();
		let change_dts = TxDestinationEntry::new(found_money - needed_money, own_address);
		let (mut splitted_dsts, dust) = self.split_strategy.split(
			&self.destinations,
			&change_dts,
			self.dust_policy.dust_threshold,
		);
		if dust > self.dust_policy.dust_threshold {
			return Err(WalletError::Consistency(format!(
				"invalid dust value: dust = {}, dust_threshold = {}",
				dust, self.dust_policy.dust_threshold
			)));
		}
		if dust != 0 && !self.dust_policy.add_to_fee {
			let addr = self.dust_policy.addr_for_dust.unwrap_or(own_address);
			splitted_dsts.push(TxDestinationEntry::new(dust, addr));
		}

		log::info!("Signing transaction with {} outputs", splitted_dsts.len());
		let tx = construct_tx(
			wallet.account().keys(),
			&sources,
			&splitted_dsts,
			&extra,
			self.unlock_time,
		)?;

		let blob = tx.to_blob().map_err(TransactionError::from)?;
		if blob.len() >= config.upper_transaction_size_limit {
			return Err(TransactionError::TxTooBig {
				size: blob.len(),
				limit: config.upper_transaction_size_limit,
			}
			.into());
		}

		let key_images = tx
			.prefix
			.vin
			.iter()
			.map(|input| {
				input
					.key_image()
					.map(|key_image| key_image.to_hex())
					.ok_or(TransactionError::UnexpectedInputType)
			})
			.collect::<Result<Vec<_>, _>>()?
			.iter()
			.join(" ");

		let tx_hash = tx.hash().map_err(TransactionError::from)?;
		log::info!("Built transaction {} ({} bytes)", tx_hash, blob.len());

		Ok(PendingTransaction {
			tx,
			tx_hash,
			fee: self.fee,
			dust,
			change_dts,
			selected_transfers: selected,
			key_images,
		})
	}
}

impl LightWallet {
	/// Build one transaction with the default split strategy and dust policy.
	pub async fn transfer(
		&self,
		destinations: Vec<TxDestinationEntry>,
		fake_outputs_count: usize,
		unlock_time: u64,
		fee: u64,
		extra: Vec<u8>,
	) -> Result<PendingTransaction, WalletError> {
		TransferBuilder::new(self)
			.with_destinations(destinations)
			.with_mixin(fake_outputs_count)
			.with_unlock_time(unlock_time)
			.with_fee(fee)
			.with_extra(extra)
			.build()
			.await
	}

	/// Build as few transactions as possible that together pay `destinations`.
	///
	/// Starts with one transaction and, while the result is too big, retries with the amounts
	/// spread over one more transaction. Each transaction pays `fee`.
	pub async fn create_transactions(
		&self,
		destinations: &[TxDestinationEntry],
		fake_outputs_count: usize,
		unlock_time: u64,
		fee: u64,
		extra: &[u8],
	) -> Result<Vec<PendingTransaction>, WalletError> {
		let mut last_error = None;

		for attempt in 1..=self.config.max_split_attempts {
			let mut excluded = HashSet::new();
			let mut ptxs = Vec::with_capacity(attempt);
			let mut too_big = false;

			for dsts in split_amounts(destinations, attempt) {
				let result = TransferBuilder::new(self)
					.with_destinations(dsts)
					.with_mixin(fake_outputs_count)
					.with_unlock_time(unlock_time)
					.with_fee(fee)
					.with_extra(extra.to_vec())
					.excluding(excluded.clone())
					.build()
					.await;

				match result {
					Ok(ptx) => {
						excluded.extend(ptx.selected_transfers.iter().map(|h| h.index));
						ptxs.push(ptx);
					}
					Err(e @ WalletError::Transaction(TransactionError::TxTooBig { .. })) => {
						log::info!("{}, splitting into {} transactions", e, attempt + 1);
						last_error = Some(e);
						too_big = true;
						break;
					}
					Err(e) => return Err(e),
				}
			}

			if !too_big {
				return Ok(ptxs);
			}
		}

		Err(last_error.unwrap_or_else(|| {
			WalletError::Transaction(TransactionError::NotConstructed(
				"no split attempts configured".to_string(),
			))
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::funded_wallet;
	use crate::transaction::types::{TxIn, relative_output_offsets_to_absolute};
	use crate::wallet::account::Account;

	fn to_stranger(amount: u64) -> Vec<TxDestinationEntry> {
		vec![TxDestinationEntry::new(amount, *Account::generate().address())]
	}

	#[test]
	fn test_split_amounts() {
		let addr = *Account::generate().address();
		let split = split_amounts(&[TxDestinationEntry::new(10, addr)], 3);
		let amounts: Vec<u64> = split.iter().map(|d| d[0].amount).collect();
		assert_eq!(amounts, vec![3, 3, 4]);
		assert_eq!(split_amounts(&[TxDestinationEntry::new(10, addr)], 1)[0][0].amount, 10);
	}

	#[test]
	fn test_payment_id_validated() {
		assert!(matches!(
			extra_with_payment_id("abc"),
			Err(TransactionError::WrongPaymentId(_))
		));
		let extra = extra_with_payment_id(&"11".repeat(32)).unwrap();
		assert_eq!(extra.len(), 2 + 33);
	}

	#[tokio::test]
	async fn test_dust_and_regular_output_cover_amount() {
		let (wallet, _ledger) = funded_wallet(&[100, 5]).await;
		let ptx = wallet.transfer(to_stranger(105), 0, 0, 0, Vec::new()).await.unwrap();

		assert_eq!(ptx.selected_transfers.len(), 2);
		assert_eq!(ptx.change_dts.amount, 0);
		assert_eq!(ptx.tx.inputs_amount(), 105);
		assert_eq!(ptx.tx.outputs_amount(), 105);
		assert_eq!(ptx.key_images.split(' ').count(), 2);
	}

	#[tokio::test]
	async fn test_change_returns_to_wallet() {
		let (wallet, _ledger) = funded_wallet(&[100]).await;
		let ptx = wallet.transfer(to_stranger(30), 0, 0, 4, Vec::new()).await.unwrap();
		assert_eq!(ptx.change_dts.amount, 66);
		assert_eq!(ptx.change_dts.addr, *wallet.account().address());
		// Change 66 splits into 60 and dust 6 which goes to the fee.
		assert_eq!(ptx.dust, 6);
		assert_eq!(ptx.tx.outputs_amount(), 90);
	}

	#[tokio::test]
	async fn test_dust_sent_to_own_address_when_not_fee() {
		let (wallet, _ledger) = funded_wallet(&[100]).await;
		let mut policy = DustPolicy::new(10);
		policy.add_to_fee = false;
		let ptx = TransferBuilder::new(&wallet)
			.with_destinations(to_stranger(30))
			.with_fee(4)
			.with_dust_policy(policy)
			.build()
			.await
			.unwrap();
		assert_eq!(ptx.tx.outputs_amount(), 96);
	}

	#[tokio::test]
	async fn test_validation_errors() {
		let (mut wallet, _ledger) = funded_wallet(&[100]).await;

		let result = wallet.transfer(Vec::new(), 0, 0, 0, Vec::new()).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::ZeroDestination))
		));

		let result = wallet.transfer(to_stranger(u64::MAX), 0, 0, 1, Vec::new()).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::AmountOverflow))
		));

		let result = wallet.transfer(to_stranger(100), 0, 0, 1, Vec::new()).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::NotEnoughMoney {
				found: 100,
				needed: 100,
				fee: 1
			}))
		));

		let result = TransferBuilder::new(&wallet)
			.with_destinations(to_stranger(10))
			.with_payment_id("xyz")
			.build()
			.await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::WrongPaymentId(_)))
		));

		wallet.config.min_fee = 10;
		let result = wallet.transfer(to_stranger(10), 0, 0, 5, Vec::new()).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::FeeTooLow {
				fee: 5,
				min_fee: 10
			}))
		));
	}

	#[tokio::test]
	async fn test_not_enough_outs_to_mix() {
		let (wallet, ledger) = funded_wallet(&[100]).await;
		ledger.push_foreign_outputs(100, 2);
		ledger.set_decoy_limit(3);
		let before = wallet.snapshot();

		let result = wallet.transfer(to_stranger(50), 5, 0, 0, Vec::new()).await;
		match result {
			Err(WalletError::Transaction(TransactionError::NotEnoughOutsToMix {
				scanty,
				mixin,
			})) => {
				assert_eq!(scanty, vec![(100, 3)]);
				assert_eq!(mixin, 5);
			}
			other => panic!("unexpected result: {:?}", other),
		}
		assert_eq!(wallet.snapshot(), before);
	}

	#[tokio::test]
	async fn test_ring_contains_real_output() {
		let (wallet, ledger) = funded_wallet(&[100]).await;
		ledger.push_foreign_outputs(100, 10);

		let ptx = wallet.transfer(to_stranger(100), 3, 0, 0, Vec::new()).await.unwrap();
		let TxIn::ToKey { key_offsets, .. } = &ptx.tx.prefix.vin[0] else {
			panic!("expected key input");
		};
		let absolute = relative_output_offsets_to_absolute(key_offsets);
		assert_eq!(absolute.len(), 4);
		assert!(absolute.windows(2).all(|w| w[0] < w[1]));
		assert!(absolute.contains(&wallet.transfers()[0].global_output_index));
		assert_eq!(ptx.tx.signatures[0].len(), 4);
	}

	#[tokio::test]
	async fn test_oversized_transfer_split_in_two() {
		let (mut wallet, _ledger) = funded_wallet(&[10_000, 10_000, 10_000, 10_000]).await;
		wallet.config.upper_transaction_size_limit = 500;

		let result = wallet.transfer(to_stranger(40_000), 0, 0, 0, Vec::new()).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::TxTooBig { .. }))
		));

		let ptxs = wallet
			.create_transactions(&to_stranger(40_000), 0, 0, 0, &[])
			.await
			.unwrap();
		assert_eq!(ptxs.len(), 2);
		let used: HashSet<usize> = ptxs
			.iter()
			.flat_map(|ptx| ptx.selected_transfers.iter().map(|h| h.index))
			.collect();
		assert_eq!(used.len(), 4);
		assert_eq!(
			ptxs.iter().map(|ptx| ptx.tx.outputs_amount()).sum::<u64>(),
			40_000
		);
	}

	#[tokio::test]
	async fn test_view_only_cannot_transfer() {
		let (wallet, ledger) = funded_wallet(&[100]).await;
		let state = wallet.snapshot();
		let view_only = LightWallet::from_parts(
			wallet.account().to_view_only(),
			wallet.config().clone(),
			ledger,
			state,
		)
		.unwrap();
		let result = view_only.transfer(to_stranger(10), 0, 0, 0, Vec::new()).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::ViewOnly))
		));
	}
}
