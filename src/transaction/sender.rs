//! Submission of built transactions to the daemon.
//!
//! Committing is all-or-nothing: the wallet records the unconfirmed transfer and marks the
//! consumed outputs spent only after the daemon accepted the transaction.

use crate::crypto::Hash;
use crate::daemon::{CORE_RPC_STATUS_BUSY, CORE_RPC_STATUS_OK};
use crate::transaction::builder::{PendingTransaction, TransactionError};
use crate::utils::{format_money, unix_now};
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::types::{UnconfirmedTransfer, WalletError};
use tracing::{debug, error, info};

impl LightWallet {
	/// Check that every output the transaction spends is still ours and unspent.
	fn validate_selection(&self, ptx: &PendingTransaction) -> Result<(), TransactionError> {
		for handle in &ptx.selected_transfers {
			match self.transfers.get(handle.index) {
				Some(td) if td.key_image == handle.key_image && !td.spent => {}
				Some(td) if td.spent => {
					return Err(TransactionError::StaleSelection(format!(
						"output {} is already spent",
						handle.key_image
					)));
				}
				_ => {
					return Err(TransactionError::StaleSelection(format!(
						"output {} is no longer tracked at index {}",
						handle.key_image, handle.index
					)));
				}
			}
		}
		Ok(())
	}

	/// Send a pending transaction and record it as unconfirmed.
	pub async fn commit_tx(&mut self, ptx: &PendingTransaction) -> Result<Hash, WalletError> {
		self.validate_selection(ptx)?;

		let blob = ptx.tx.to_blob()?;
		debug!("Sending transaction {} ({} bytes)", ptx.tx_hash, blob.len());
		let response = self
			.client
			.send_raw_transaction(&hex::encode(&blob))
			.await
			.map_err(|e| {
				error!("Failed to send transaction {}: {}", ptx.tx_hash, e);
				WalletError::Protocol(format!("sendrawtransaction failed: {}", e))
			})?;

		if response.status == CORE_RPC_STATUS_BUSY {
			return Err(WalletError::DaemonBusy("sendrawtransaction".to_string()));
		}
		if response.status != CORE_RPC_STATUS_OK {
			return Err(TransactionError::TxRejected {
				tx_hash: ptx.tx_hash,
				status: response.status,
			}
			.into());
		}

		self.unconfirmed_txs.insert(
			ptx.tx_hash,
			UnconfirmedTransfer {
				tx: ptx.tx.clone(),
				change: ptx.change_dts.amount,
				sent_time: unix_now(),
			},
		);
		for handle in &ptx.selected_transfers {
			self.transfers[handle.index].spent = true;
		}

		let decimals = self.config.coin_decimals;
		info!(
			"Transaction successfully sent. <{}>\nCommission: {} (dust: {})\nBalance: {}\nUnlocked: {}",
			ptx.tx_hash,
			format_money(ptx.fee.saturating_add(ptx.dust), decimals),
			format_money(ptx.dust, decimals),
			format_money(self.balance(), decimals),
			format_money(self.unlocked_balance(), decimals)
		);
		Ok(ptx.tx_hash)
	}

	/// Commit several transactions in order, stopping at the first failure.
	pub async fn commit_txs(
		&mut self,
		ptxs: &[PendingTransaction],
	) -> Result<Vec<Hash>, WalletError> {
		let mut hashes = Vec::with_capacity(ptxs.len());
		for ptx in ptxs {
			hashes.push(self.commit_tx(ptx).await?);
		}
		Ok(hashes)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::funded_wallet;
	use crate::transaction::construct::TxDestinationEntry;
	use crate::wallet::account::Account;

	fn to_stranger(amount: u64) -> Vec<TxDestinationEntry> {
		vec![TxDestinationEntry::new(amount, *Account::generate().address())]
	}

	#[tokio::test]
	async fn test_commit_records_unconfirmed_and_spends() {
		let (mut wallet, ledger) = funded_wallet(&[100]).await;
		let ptx = wallet.transfer(to_stranger(30), 0, 0, 4, Vec::new()).await.unwrap();

		let tx_hash = wallet.commit_tx(&ptx).await.unwrap();
		assert_eq!(tx_hash, ptx.tx_hash);
		assert_eq!(ledger.sent().len(), 1);
		assert!(wallet.transfers()[0].spent);
		assert_eq!(wallet.unconfirmed_txs()[&tx_hash].change, 66);
		assert_eq!(wallet.balance(), 66);

		let again = wallet.commit_tx(&ptx).await;
		assert!(matches!(
			again,
			Err(WalletError::Transaction(TransactionError::StaleSelection(_)))
		));
	}

	#[tokio::test]
	async fn test_busy_daemon_leaves_state_unchanged() {
		let (mut wallet, ledger) = funded_wallet(&[100]).await;
		let ptx = wallet.transfer(to_stranger(30), 0, 0, 0, Vec::new()).await.unwrap();
		let before = wallet.snapshot();

		ledger.set_send_status(CORE_RPC_STATUS_BUSY);
		let result = wallet.commit_tx(&ptx).await;
		assert!(matches!(result, Err(WalletError::DaemonBusy(_))));
		assert_eq!(wallet.snapshot(), before);

		ledger.set_send_status("Failed");
		let result = wallet.commit_tx(&ptx).await;
		assert!(matches!(
			result,
			Err(WalletError::Transaction(TransactionError::TxRejected { .. }))
		));
		assert_eq!(wallet.snapshot(), before);
		assert!(ledger.sent().is_empty());
	}

	#[tokio::test]
	async fn test_confirmed_tx_leaves_unconfirmed_set() {
		let (mut wallet, ledger) = funded_wallet(&[100]).await;
		let ptx = wallet.transfer(to_stranger(30), 0, 0, 0, Vec::new()).await.unwrap();
		wallet.commit_tx(&ptx).await.unwrap();

		ledger.push_block(vec![ptx.tx.clone()]);
		wallet.refresh().await.unwrap();
		assert!(wallet.unconfirmed_txs().is_empty());
		assert!(wallet.transfers()[0].spent);
		// The change outputs are found by the scan.
		assert_eq!(wallet.balance(), 70);
	}
}
