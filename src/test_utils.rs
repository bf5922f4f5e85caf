//! Helpers shared by the unit tests.

use crate::config::{RetryConfig, WalletConfig};
use crate::crypto::{
	Hash, KeyImage, Signature, derive_public_key, generate_key_derivation, generate_keys,
};
use crate::daemon::mock::MockLedger;
use crate::transaction::extra::{
	add_extra_nonce_to_tx_extra, add_tx_pub_key_to_extra, set_payment_id_to_tx_extra_nonce,
};
use crate::transaction::{
	Block, BlockHeader, CURRENT_TRANSACTION_VERSION, Transaction, TransactionPrefix, TxIn, TxOut,
};
use crate::wallet::account::Account;
use crate::wallet::address::AccountAddress;
use crate::wallet::light_wallet::LightWallet;
use rand::RngCore;
use std::sync::Arc;

/// Config with short confirmation windows and no retry delay.
pub fn test_config(genesis: &Hash) -> WalletConfig {
	WalletConfig {
		genesis_block_id: if genesis.is_null() {
			String::new()
		} else {
			genesis.to_hex()
		},
		spendable_age: 1,
		dust_threshold: 10,
		retry: RetryConfig {
			max_retries: 3,
			initial_interval_ms: 0,
			max_interval_ms: 0,
		},
		..WalletConfig::default()
	}
}

fn random_key_image() -> KeyImage {
	let mut bytes = [0u8; 32];
	rand::rng().fill_bytes(&mut bytes);
	KeyImage(bytes)
}

/// A transaction from a stranger paying `amounts` to `to`, one output per amount.
pub fn tx_paying_to(
	to: &AccountAddress,
	amounts: &[u64],
	unlock_time: u64,
	payment_id: Option<Hash>,
) -> Transaction {
	let (tx_pub, tx_sec) = generate_keys();
	let mut extra = Vec::new();
	add_tx_pub_key_to_extra(&mut extra, &tx_pub);
	if let Some(payment_id) = payment_id {
		let nonce = set_payment_id_to_tx_extra_nonce(&payment_id);
		add_extra_nonce_to_tx_extra(&mut extra, &nonce).unwrap();
	}

	let derivation = generate_key_derivation(&to.view_public_key, &tx_sec).unwrap();
	let vout = amounts
		.iter()
		.enumerate()
		.map(|(index, amount)| TxOut {
			amount: *amount,
			key: derive_public_key(&derivation, index, &to.spend_public_key).unwrap(),
		})
		.collect();

	let total: u64 = amounts.iter().sum();
	Transaction {
		prefix: TransactionPrefix {
			version: CURRENT_TRANSACTION_VERSION,
			unlock_time,
			vin: vec![TxIn::ToKey {
				amount: total,
				key_offsets: vec![0],
				key_image: random_key_image(),
			}],
			vout,
			extra,
		},
		signatures: vec![vec![Signature::default()]],
	}
}

/// A block at `height` on top of `prev_id` that includes `txs`.
pub fn block_with(prev_id: Hash, height: u64, timestamp: u64, txs: &[Transaction]) -> Block {
	let (miner_pub, _) = generate_keys();
	let mut extra = Vec::new();
	add_tx_pub_key_to_extra(&mut extra, &miner_pub);

	Block {
		header: BlockHeader {
			major_version: 1,
			minor_version: 0,
			timestamp,
			prev_id,
			nonce: rand::rng().next_u32(),
		},
		miner_tx: Transaction {
			prefix: TransactionPrefix {
				version: CURRENT_TRANSACTION_VERSION,
				unlock_time: height + 60,
				vin: vec![TxIn::Gen { height }],
				vout: Vec::new(),
				extra,
			},
			signatures: Vec::new(),
		},
		tx_hashes: txs.iter().map(|tx| tx.hash().unwrap()).collect(),
	}
}

/// A mock ledger holding only a genesis block, and a fresh wallet following it.
pub fn new_wallet() -> (LightWallet, Arc<MockLedger>) {
	let ledger = Arc::new(MockLedger::new());
	let genesis = ledger.push_block(Vec::new());
	let wallet = LightWallet::new(Account::generate(), test_config(&genesis), ledger.clone())
		.unwrap();
	(wallet, ledger)
}

/// A synced wallet owning one confirmed, unlocked output per amount.
pub async fn funded_wallet(amounts: &[u64]) -> (LightWallet, Arc<MockLedger>) {
	let (mut wallet, ledger) = new_wallet();
	for amount in amounts {
		ledger.push_block(vec![tx_paying_to(wallet.account().address(), &[*amount], 0, None)]);
	}
	ledger.push_block(Vec::new());
	wallet.refresh().await.unwrap();
	(wallet, ledger)
}
