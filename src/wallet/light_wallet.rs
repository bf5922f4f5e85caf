//! The wallet engine.
//!
//! `LightWallet` owns the account, the local block-id chain and everything the scanner has
//! learned about owned outputs. Behaviour is spread over several modules, each adding an
//! `impl LightWallet` block: scanning in `tracker`, balances and selection in `balance`,
//! chain synchronization in `sync::synchronizer`, transaction building in
//! `transaction::builder` and commit in `transaction::sender`.

use crate::config::WalletConfig;
use crate::crypto::{Hash, KeyImage};
use crate::daemon::LedgerClient;
use crate::wallet::account::Account;
use crate::wallet::sync::events::{EventDispatcher, WalletEventHandler};
use crate::wallet::sync::state_persistence::WalletState;
use crate::wallet::types::{PaymentDetails, TransferDetails, UnconfirmedTransfer, WalletError};

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct LightWallet {
	pub(crate) account: Account,
	pub(crate) config: WalletConfig,
	pub(crate) client: Arc<dyn LedgerClient>,
	/// Block ids by height. Null entries are ids this instance has not seen yet.
	pub(crate) blockchain: Vec<Hash>,
	pub(crate) transfers: Vec<TransferDetails>,
	pub(crate) key_images: HashMap<KeyImage, usize>,
	pub(crate) unconfirmed_txs: HashMap<Hash, UnconfirmedTransfer>,
	pub(crate) payments: HashMap<Hash, Vec<PaymentDetails>>,
	pub(crate) events: EventDispatcher,
	stop: Arc<AtomicBool>,
}

impl LightWallet {
	/// A wallet with an empty history. The chain starts at the configured genesis, if any.
	pub fn new(
		account: Account,
		config: WalletConfig,
		client: Arc<dyn LedgerClient>,
	) -> Result<Self, WalletError> {
		let genesis = config
			.genesis_id()
			.map_err(|e| WalletError::Storage(e.to_string()))?;
		let blockchain = if genesis.is_null() {
			Vec::new()
		} else {
			vec![genesis]
		};

		Ok(Self {
			account,
			config,
			client,
			blockchain,
			transfers: Vec::new(),
			key_images: HashMap::new(),
			unconfirmed_txs: HashMap::new(),
			payments: HashMap::new(),
			events: EventDispatcher::new(),
			stop: Arc::new(AtomicBool::new(false)),
		})
	}

	/// Rebuild a wallet from previously stored state.
	///
	/// The state must belong to `account` and every transfer must be consistent with the key
	/// image index.
	pub fn from_parts(
		account: Account,
		config: WalletConfig,
		client: Arc<dyn LedgerClient>,
		state: WalletState,
	) -> Result<Self, WalletError> {
		if state.address != *account.address() {
			return Err(WalletError::FilesDontCorrespond(
				"stored address does not match the account".to_string(),
			));
		}
		for td in &state.transfers {
			let tx_hash = td.tx.hash().map_err(|e| WalletError::Consistency(e.to_string()))?;
			if tx_hash != td.tx_hash {
				return Err(WalletError::Consistency(format!(
					"stored transaction {} hashes to {}",
					td.tx_hash, tx_hash
				)));
			}
		}
		for (key_image, &index) in &state.key_images {
			match state.transfers.get(index) {
				Some(td) if td.key_image == *key_image => {}
				_ => {
					return Err(WalletError::Consistency(format!(
						"key image {} does not point at its transfer",
						key_image
					)));
				}
			}
		}

		let mut wallet = Self::new(account, config, client)?;
		if !state.blockchain.is_empty() {
			wallet.blockchain = state.blockchain;
		}
		wallet.transfers = state.transfers;
		wallet.key_images = state.key_images;
		wallet.unconfirmed_txs = state.unconfirmed_txs;
		wallet.payments = state.payments;
		Ok(wallet)
	}

	/// Copy of the persistent part of the wallet.
	pub fn snapshot(&self) -> WalletState {
		WalletState {
			blockchain: self.blockchain.clone(),
			transfers: self.transfers.clone(),
			address: *self.account.address(),
			key_images: self.key_images.clone(),
			unconfirmed_txs: self.unconfirmed_txs.clone(),
			payments: self.payments.clone(),
		}
	}

	pub fn register_handler(&mut self, handler: Box<dyn WalletEventHandler>) {
		self.events.register_handler(handler);
	}

	/// Handle that cancels a running refresh before its next fetch.
	pub fn stop_handle(&self) -> Arc<AtomicBool> {
		self.stop.clone()
	}

	pub fn stop(&self) {
		self.stop.store(true, Ordering::SeqCst);
	}

	pub(crate) fn stop_requested(&self) -> bool {
		self.stop.load(Ordering::SeqCst)
	}

	pub(crate) fn clear_stop(&self) {
		self.stop.store(false, Ordering::SeqCst);
	}

	pub fn account(&self) -> &Account {
		&self.account
	}

	pub fn config(&self) -> &WalletConfig {
		&self.config
	}

	/// Number of known blocks, genesis included.
	pub fn blockchain_height(&self) -> u64 {
		self.blockchain.len() as u64
	}

	pub fn blockchain(&self) -> &[Hash] {
		&self.blockchain
	}

	pub fn transfers(&self) -> &[TransferDetails] {
		&self.transfers
	}

	pub fn key_images(&self) -> &HashMap<KeyImage, usize> {
		&self.key_images
	}

	pub fn unconfirmed_txs(&self) -> &HashMap<Hash, UnconfirmedTransfer> {
		&self.unconfirmed_txs
	}

	pub fn payments(&self, payment_id: &Hash) -> &[PaymentDetails] {
		self.payments
			.get(payment_id)
			.map(Vec::as_slice)
			.unwrap_or(&[])
	}

	/// Extend the local chain with unknown ids up to `height` blocks.
	///
	/// Used when the caller only knows how far it has scanned, not the ids themselves.
	pub fn assume_scanned_up_to(&mut self, height: u64) {
		let height = height as usize;
		if self.blockchain.len() < height {
			self.blockchain.resize(height, Hash::NULL);
		}
	}
}
