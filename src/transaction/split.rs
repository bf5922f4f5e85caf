//! Destination split strategies and dust policy.
//!
//! A strategy turns the requested destinations plus the change into the output list of the
//! transaction, and reports the dust (sub-threshold change) it could not place.

use crate::transaction::construct::TxDestinationEntry;
use crate::wallet::address::AccountAddress;
use std::cell::RefCell;

/// How destinations and change are broken into outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
	/// Every amount is decomposed into power-of-ten chunks.
	#[default]
	Digits,
	/// Destinations are kept as given; only the change is rounded.
	Null,
}

/// What to do with the change remainder below the dust threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DustPolicy {
	pub dust_threshold: u64,
	/// Leave the dust to the miner as extra fee.
	pub add_to_fee: bool,
	/// Where dust goes when it is not added to the fee. `None` means the wallet's own address.
	pub addr_for_dust: Option<AccountAddress>,
}

impl DustPolicy {
	pub fn new(dust_threshold: u64) -> Self {
		Self {
			dust_threshold,
			add_to_fee: true,
			addr_for_dust: None,
		}
	}
}

/// Split `amount` into its non-zero decimal digits, scaled by their order.
///
/// Low-order digits are accumulated into a single dust chunk while the running sum stays at or
/// below `dust_threshold`. The dust chunk is reported once, before the first regular chunk that
/// follows it.
pub fn decompose_amount_into_digits(
	mut amount: u64,
	dust_threshold: u64,
	mut chunk_handler: impl FnMut(u64),
	mut dust_handler: impl FnMut(u64),
) {
	if amount == 0 {
		return;
	}

	let mut is_dust_handled = false;
	let mut dust = 0u64;
	let mut order = 1u64;
	while amount != 0 {
		let chunk = (amount % 10) * order;
		amount /= 10;
		order = order.saturating_mul(10);

		if dust.saturating_add(chunk) <= dust_threshold {
			dust += chunk;
		} else {
			if !is_dust_handled && dust != 0 {
				dust_handler(dust);
				is_dust_handled = true;
			}
			if chunk != 0 {
				chunk_handler(chunk);
			}
		}
	}

	if !is_dust_handled && dust != 0 {
		dust_handler(dust);
	}
}

impl SplitStrategy {
	/// Returns the outputs to create and the dust left over from the change.
	pub fn split(
		&self,
		destinations: &[TxDestinationEntry],
		change: &TxDestinationEntry,
		dust_threshold: u64,
	) -> (Vec<TxDestinationEntry>, u64) {
		match self {
			SplitStrategy::Digits => digit_split(destinations, change, dust_threshold),
			SplitStrategy::Null => null_split(destinations, change, dust_threshold),
		}
	}
}

fn digit_split(
	destinations: &[TxDestinationEntry],
	change: &TxDestinationEntry,
	dust_threshold: u64,
) -> (Vec<TxDestinationEntry>, u64) {
	let split = RefCell::new(Vec::new());
	for de in destinations {
		decompose_amount_into_digits(
			de.amount,
			dust_threshold,
			|chunk| split.borrow_mut().push(TxDestinationEntry::new(chunk, de.addr)),
			|dust| split.borrow_mut().push(TxDestinationEntry::new(dust, de.addr)),
		);
	}
	let mut split = split.into_inner();

	let mut change_chunks = Vec::new();
	let mut dust = 0u64;
	decompose_amount_into_digits(
		change.amount,
		dust_threshold,
		|chunk| change_chunks.push(TxDestinationEntry::new(chunk, change.addr)),
		|change_dust| dust = change_dust,
	);
	split.extend(change_chunks);

	(split, dust)
}

fn null_split(
	destinations: &[TxDestinationEntry],
	change: &TxDestinationEntry,
	dust_threshold: u64,
) -> (Vec<TxDestinationEntry>, u64) {
	let mut split = destinations.to_vec();
	let mut dust = 0u64;
	let mut change_amount = change.amount;

	if dust_threshold > 0 {
		let mut order = 10u64;
		while order <= dust_threshold.saturating_mul(10) {
			let dust_candidate = change.amount % order;
			if dust_candidate > dust_threshold {
				break;
			}
			dust = dust_candidate;
			change_amount = (change.amount / order) * order;
			match order.checked_mul(10) {
				Some(next) => order = next,
				None => break,
			}
		}
	}

	if change_amount != 0 {
		split.push(TxDestinationEntry::new(change_amount, change.addr));
	}
	(split, dust)
}
