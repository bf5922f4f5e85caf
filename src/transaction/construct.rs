//! Assembly and signing of a spend transaction from prepared sources and destinations.

use crate::crypto::{
	PublicKey, SecretKey, derive_public_key, derive_secret_key, generate_key_derivation,
	generate_key_image, generate_keys, generate_ring_signature, secret_key_to_public_key,
};
use crate::transaction::builder::TransactionError;
use crate::transaction::extra::add_tx_pub_key_to_extra;
use crate::transaction::types::{
	CURRENT_TRANSACTION_VERSION, Transaction, TransactionPrefix, TxIn, TxOut,
	absolute_output_offsets_to_relative,
};
use crate::wallet::account::AccountKeys;
use crate::wallet::address::AccountAddress;

/// One input to spend: the ring (sorted by global index) and where the real output sits in it.
#[derive(Debug, Clone)]
pub struct TxSourceEntry {
	/// `(global index, output key)` pairs.
	pub outputs: Vec<(u64, PublicKey)>,
	pub real_output: usize,
	/// Public key of the transaction that created the real output.
	pub real_out_tx_key: PublicKey,
	/// Position of the real output inside that transaction.
	pub real_output_in_tx_index: usize,
	pub amount: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxDestinationEntry {
	pub amount: u64,
	pub addr: AccountAddress,
}

impl TxDestinationEntry {
	pub fn new(amount: u64, addr: AccountAddress) -> Self {
		Self { amount, addr }
	}
}

struct PreparedInput {
	ephemeral_secret: SecretKey,
	ring: Vec<PublicKey>,
	real_output: usize,
}

pub fn construct_tx(
	sender: &AccountKeys,
	sources: &[TxSourceEntry],
	destinations: &[TxDestinationEntry],
	extra: &[u8],
	unlock_time: u64,
) -> Result<Transaction, TransactionError> {
	let spend_secret = sender
		.spend_secret_key
		.as_ref()
		.ok_or(TransactionError::ViewOnly)?;
	if sources.is_empty() {
		return Err(TransactionError::NotConstructed("no sources".to_string()));
	}

	let (tx_public_key, tx_secret_key) = generate_keys();
	let mut tx_extra = Vec::with_capacity(33 + extra.len());
	add_tx_pub_key_to_extra(&mut tx_extra, &tx_public_key);
	tx_extra.extend_from_slice(extra);

	let mut vin = Vec::with_capacity(sources.len());
	let mut prepared = Vec::with_capacity(sources.len());
	let mut inputs_money = 0u64;

	for src in sources {
		let Some((_, real_key)) = src.outputs.get(src.real_output) else {
			return Err(TransactionError::NotConstructed(format!(
				"real output {} outside ring of {}",
				src.real_output,
				src.outputs.len()
			)));
		};

		let derivation = generate_key_derivation(&src.real_out_tx_key, &sender.view_secret_key)?;
		let ephemeral_secret =
			derive_secret_key(&derivation, src.real_output_in_tx_index, spend_secret)?;
		let ephemeral_public = secret_key_to_public_key(&ephemeral_secret)?;
		if ephemeral_public != *real_key {
			return Err(TransactionError::NotConstructed(format!(
				"derived key {} does not match real output key {}",
				ephemeral_public.to_hex(),
				real_key.to_hex()
			)));
		}
		let key_image = generate_key_image(&ephemeral_public, &ephemeral_secret)?;

		let absolute: Vec<u64> = src.outputs.iter().map(|(index, _)| *index).collect();
		vin.push(TxIn::ToKey {
			amount: src.amount,
			key_offsets: absolute_output_offsets_to_relative(&absolute),
			key_image,
		});
		prepared.push(PreparedInput {
			ephemeral_secret,
			ring: src.outputs.iter().map(|(_, key)| *key).collect(),
			real_output: src.real_output,
		});
		inputs_money = inputs_money
			.checked_add(src.amount)
			.ok_or(TransactionError::AmountOverflow)?;
	}

	let mut sorted_destinations = destinations.to_vec();
	sorted_destinations.sort_by_key(|de| de.amount);

	let mut vout = Vec::with_capacity(sorted_destinations.len());
	let mut outputs_money = 0u64;
	for (index, de) in sorted_destinations.iter().enumerate() {
		let derivation = generate_key_derivation(&de.addr.view_public_key, &tx_secret_key)?;
		let key = derive_public_key(&derivation, index, &de.addr.spend_public_key)?;
		vout.push(TxOut {
			amount: de.amount,
			key,
		});
		outputs_money = outputs_money
			.checked_add(de.amount)
			.ok_or(TransactionError::AmountOverflow)?;
	}

	if outputs_money > inputs_money {
		return Err(TransactionError::NotConstructed(format!(
			"outputs {} exceed inputs {}",
			outputs_money, inputs_money
		)));
	}

	let prefix = TransactionPrefix {
		version: CURRENT_TRANSACTION_VERSION,
		unlock_time,
		vin,
		vout,
		extra: tx_extra,
	};
	let prefix_hash = prefix.hash()?;

	let mut signatures = Vec::with_capacity(prepared.len());
	for (input, prep) in prefix.vin.iter().zip(&prepared) {
		let Some(key_image) = input.key_image() else {
			return Err(TransactionError::UnexpectedInputType);
		};
		signatures.push(generate_ring_signature(
			&prefix_hash,
			key_image,
			&prep.ring,
			&prep.ephemeral_secret,
			prep.real_output,
		)?);
	}

	Ok(Transaction { prefix, signatures })
}
