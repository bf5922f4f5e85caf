//! Output and key-image tracking.
//!
//! Every transaction of a scanned block goes through `process_transaction`, which recognises
//! outputs paying this account, derives their key images, and marks owned outputs spent when
//! their key image shows up as an input.

use crate::crypto::{
	Hash, KeyDerivation, KeyImage, derive_public_key, derive_secret_key, generate_key_derivation,
	generate_key_image, secret_key_to_public_key,
};
use crate::daemon::{CORE_RPC_STATUS_BUSY, CORE_RPC_STATUS_OK};
use crate::transaction::Transaction;
use crate::transaction::extra::{ExtraField, get_payment_id_from_tx_extra_nonce, parse_tx_extra};
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::sync::events::WalletEvent;
use crate::wallet::types::{PaymentDetails, TransferDetails, WalletError};
use tracing::{debug, warn};

/// What one transaction did to the wallet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxScanOutcome {
	pub received: u64,
	pub spent: u64,
}

impl LightWallet {
	/// Positions of outputs of `tx` that pay this account.
	pub(crate) fn lookup_acc_outs(
		&self,
		tx: &Transaction,
		derivation: &KeyDerivation,
	) -> Result<(Vec<usize>, u64), WalletError> {
		let spend_public_key = &self.account.address().spend_public_key;
		let mut outs = Vec::new();
		let mut money = 0u64;

		for (index, out) in tx.prefix.vout.iter().enumerate() {
			if derive_public_key(derivation, index, spend_public_key)? == out.key {
				outs.push(index);
				money = money.saturating_add(out.amount);
			}
		}
		Ok((outs, money))
	}

	async fn fetch_output_indices(&self, tx_hash: &Hash) -> Result<Vec<u64>, WalletError> {
		let response = self.client.get_output_indices(tx_hash).await?;
		if response.status == CORE_RPC_STATUS_BUSY {
			return Err(WalletError::DaemonBusy("get_o_indexes".to_string()));
		}
		if response.status != CORE_RPC_STATUS_OK {
			return Err(WalletError::Protocol(format!(
				"get_o_indexes returned status {}",
				response.status
			)));
		}
		Ok(response.o_indexes)
	}

	fn one_time_key_image(
		&self,
		tx: &Transaction,
		derivation: &KeyDerivation,
		index: usize,
	) -> Result<Option<KeyImage>, WalletError> {
		let Some(spend_secret) = self.account.keys().spend_secret_key.as_ref() else {
			return Ok(None);
		};
		let expected = &tx.prefix.vout[index].key;
		let ephemeral_secret = derive_secret_key(derivation, index, spend_secret)?;
		let ephemeral_public = secret_key_to_public_key(&ephemeral_secret)?;
		if ephemeral_public != *expected {
			return Err(WalletError::Consistency(format!(
				"derived output key {} does not match {}",
				ephemeral_public.to_hex(),
				expected.to_hex()
			)));
		}
		Ok(Some(generate_key_image(&ephemeral_public, &ephemeral_secret)?))
	}

	/// Scan one transaction included at `height`.
	///
	/// Running it twice on the same transaction records nothing new.
	pub async fn process_transaction(
		&mut self,
		tx: &Transaction,
		tx_hash: &Hash,
		height: u64,
	) -> Result<TxScanOutcome, WalletError> {
		self.unconfirmed_txs.remove(tx_hash);

		let (fields, complete) = parse_tx_extra(&tx.prefix.extra);
		if !complete {
			debug!("Transaction extra of {} has unsupported format", tx_hash);
		}
		let tx_pub_key = fields.iter().find_map(|field| match field {
			ExtraField::PubKey(key) => Some(*key),
			_ => None,
		});
		let derivation = match tx_pub_key
			.map(|key| generate_key_derivation(&key, &self.account.keys().view_secret_key))
		{
			Some(Ok(derivation)) => derivation,
			Some(Err(e)) => {
				warn!("Transaction {} carries an invalid public key: {}", tx_hash, e);
				self.events
					.dispatch(&WalletEvent::SkipTransaction {
						height,
						tx_hash: *tx_hash,
					})
					.await;
				return Ok(TxScanOutcome::default());
			}
			None => {
				self.events
					.dispatch(&WalletEvent::SkipTransaction {
						height,
						tx_hash: *tx_hash,
					})
					.await;
				return Ok(TxScanOutcome::default());
			}
		};

		let mut outcome = TxScanOutcome::default();
		let (outs, tx_money_got_in_outs) = self.lookup_acc_outs(tx, &derivation)?;

		if !outs.is_empty() && tx_money_got_in_outs > 0 {
			let o_indexes = self.fetch_output_indices(tx_hash).await?;
			if o_indexes.len() != tx.prefix.vout.len() {
				return Err(WalletError::Protocol(format!(
					"transactions outputs size={} not match with get_o_indexes response size={}",
					tx.prefix.vout.len(),
					o_indexes.len()
				)));
			}

			for index in outs {
				let key_image = self.one_time_key_image(tx, &derivation, index)?;
				let already_known = match &key_image {
					Some(key_image) => self.key_images.contains_key(key_image),
					None => self
						.transfers
						.iter()
						.any(|td| td.tx_hash == *tx_hash && td.internal_output_index == index),
				};
				if already_known {
					continue;
				}

				let amount = tx.prefix.vout[index].amount;
				self.transfers.push(TransferDetails {
					block_height: height,
					tx: tx.clone(),
					tx_hash: *tx_hash,
					internal_output_index: index,
					global_output_index: o_indexes[index],
					spent: false,
					key_image: key_image.unwrap_or_default(),
				});
				let transfer_index = self.transfers.len() - 1;
				if let Some(key_image) = key_image {
					self.key_images.insert(key_image, transfer_index);
				}
				outcome.received = outcome.received.saturating_add(amount);

				self.events
					.dispatch(&WalletEvent::MoneyReceived {
						height,
						tx_hash: *tx_hash,
						amount,
					})
					.await;
			}
		}

		let mut tx_money_spent_in_ins = 0u64;
		for input in &tx.prefix.vin {
			let Some(key_image) = input.key_image() else {
				continue;
			};
			let Some(&transfer_index) = self.key_images.get(key_image) else {
				continue;
			};
			let td = &mut self.transfers[transfer_index];
			let amount = td.amount();
			td.spent = true;
			tx_money_spent_in_ins = tx_money_spent_in_ins.saturating_add(amount);

			self.events
				.dispatch(&WalletEvent::MoneySpent {
					height,
					spend_tx_hash: *tx_hash,
					amount,
				})
				.await;
		}
		outcome.spent = tx_money_spent_in_ins;

		let payment_id = fields.iter().find_map(|field| match field {
			ExtraField::Nonce(nonce) => get_payment_id_from_tx_extra_nonce(nonce),
			_ => None,
		});
		if let Some(payment_id) = payment_id.filter(|id| !id.is_null()) {
			let received = tx_money_got_in_outs.saturating_sub(tx_money_spent_in_ins);
			if received > 0 {
				let records = self.payments.entry(payment_id).or_default();
				if !records.iter().any(|p| p.tx_hash == *tx_hash) {
					records.push(PaymentDetails {
						tx_hash: *tx_hash,
						amount: received,
						block_height: height,
						unlock_time: tx.unlock_time(),
					});
				}
			}
		}

		Ok(outcome)
	}

	/// Drop everything learned from blocks at or above `height`.
	pub fn detach_blockchain(&mut self, height: u64) -> u64 {
		let height_index = height as usize;
		let blocks_detached = self.blockchain.len().saturating_sub(height_index) as u64;

		let first = self
			.transfers
			.iter()
			.position(|td| td.block_height >= height)
			.unwrap_or(self.transfers.len());
		let transfers_detached = self.transfers.len() - first;
		for td in self.transfers.drain(first..) {
			if !td.key_image.is_null() {
				self.key_images.remove(&td.key_image);
			}
		}
		self.blockchain.truncate(height_index);

		for records in self.payments.values_mut() {
			records.retain(|p| p.block_height < height);
		}
		self.payments.retain(|_, records| !records.is_empty());

		debug!(
			"Detached blockchain on height {}, transfers detached {}, blocks detached {}",
			height, transfers_detached, blocks_detached
		);
		blocks_detached
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{new_wallet, tx_paying_to};
	use crate::transaction::TxIn;
	use crate::wallet::account::Account;

	#[tokio::test]
	async fn test_owned_outputs_found_once() {
		let (mut wallet, ledger) = new_wallet();
		let tx = tx_paying_to(wallet.account().address(), &[100, 5], 0, None);
		let other = tx_paying_to(Account::generate().address(), &[7], 0, None);
		ledger.push_block(vec![tx.clone(), other.clone()]);
		let tx_hash = tx.hash().unwrap();

		let outcome = wallet.process_transaction(&tx, &tx_hash, 1).await.unwrap();
		assert_eq!(outcome.received, 105);
		let indices: Vec<usize> = wallet
			.transfers()
			.iter()
			.map(|td| td.internal_output_index)
			.collect();
		assert_eq!(indices, vec![0, 1]);
		assert_eq!(wallet.key_images().len(), 2);
		for (key_image, index) in wallet.key_images() {
			assert_eq!(&wallet.transfers()[*index].key_image, key_image);
		}

		let again = wallet.process_transaction(&tx, &tx_hash, 1).await.unwrap();
		assert_eq!(again.received, 0);
		assert_eq!(wallet.transfers().len(), 2);

		let other_hash = other.hash().unwrap();
		let foreign = wallet.process_transaction(&other, &other_hash, 1).await.unwrap();
		assert_eq!(foreign, TxScanOutcome::default());
	}

	#[tokio::test]
	async fn test_spend_detected_by_key_image() {
		let (mut wallet, ledger) = new_wallet();
		let tx = tx_paying_to(wallet.account().address(), &[40], 0, None);
		ledger.push_block(vec![tx.clone()]);
		wallet
			.process_transaction(&tx, &tx.hash().unwrap(), 1)
			.await
			.unwrap();
		let key_image = wallet.transfers()[0].key_image;

		let mut spend = tx_paying_to(Account::generate().address(), &[30], 0, None);
		spend.prefix.vin = vec![TxIn::ToKey {
			amount: 40,
			key_offsets: vec![3],
			key_image,
		}];
		let outcome = wallet
			.process_transaction(&spend, &spend.hash().unwrap(), 2)
			.await
			.unwrap();
		assert_eq!(outcome.spent, 40);
		assert!(wallet.transfers()[0].spent);
	}

	#[tokio::test]
	async fn test_payment_recorded_once() {
		let (mut wallet, ledger) = new_wallet();
		let payment_id = Hash([9u8; 32]);
		let tx = tx_paying_to(wallet.account().address(), &[25], 7, Some(payment_id));
		ledger.push_block(vec![tx.clone()]);
		let tx_hash = tx.hash().unwrap();

		wallet.process_transaction(&tx, &tx_hash, 1).await.unwrap();
		wallet.process_transaction(&tx, &tx_hash, 1).await.unwrap();

		let payments = wallet.payments(&payment_id);
		assert_eq!(payments.len(), 1);
		assert_eq!(payments[0].amount, 25);
		assert_eq!(payments[0].unlock_time, 7);
	}

	#[tokio::test]
	async fn test_missing_pub_key_skipped() {
		let (mut wallet, _ledger) = new_wallet();
		let mut tx = tx_paying_to(wallet.account().address(), &[25], 0, None);
		tx.prefix.extra.clear();
		let outcome = wallet
			.process_transaction(&tx, &tx.hash().unwrap(), 1)
			.await
			.unwrap();
		assert_eq!(outcome, TxScanOutcome::default());
		assert!(wallet.transfers().is_empty());
	}

	#[tokio::test]
	async fn test_busy_output_indices_is_error() {
		let (mut wallet, ledger) = new_wallet();
		let tx = tx_paying_to(wallet.account().address(), &[25], 0, None);
		ledger.push_block(vec![tx.clone()]);
		ledger.set_busy_output_indices(1);

		let result = wallet.process_transaction(&tx, &tx.hash().unwrap(), 1).await;
		assert!(matches!(result, Err(WalletError::DaemonBusy(_))));
		assert!(wallet.transfers().is_empty());
	}

	#[tokio::test]
	async fn test_view_only_records_without_key_image() {
		let (wallet, ledger) = new_wallet();
		let mut wallet = LightWallet::new(
			wallet.account().to_view_only(),
			wallet.config().clone(),
			ledger.clone(),
		)
		.unwrap();
		let tx = tx_paying_to(wallet.account().address(), &[25], 0, None);
		ledger.push_block(vec![tx.clone()]);
		let tx_hash = tx.hash().unwrap();

		wallet.process_transaction(&tx, &tx_hash, 1).await.unwrap();
		wallet.process_transaction(&tx, &tx_hash, 1).await.unwrap();
		assert_eq!(wallet.transfers().len(), 1);
		assert!(wallet.transfers()[0].key_image.is_null());
		assert!(wallet.key_images().is_empty());
	}
}
