//! Transaction `extra` field: a tagged byte string carrying the transaction public key and an
//! optional nonce, which in turn may carry a payment id.

use crate::crypto::{Hash, PublicKey};

pub const TX_EXTRA_TAG_PADDING: u8 = 0x00;
pub const TX_EXTRA_TAG_PUBKEY: u8 = 0x01;
pub const TX_EXTRA_NONCE: u8 = 0x02;
pub const TX_EXTRA_NONCE_PAYMENT_ID: u8 = 0x00;

pub const TX_EXTRA_PADDING_MAX_COUNT: usize = 255;
pub const TX_EXTRA_NONCE_MAX_COUNT: usize = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtraField {
	Padding(usize),
	PubKey(PublicKey),
	Nonce(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtraError {
	#[error("Extra nonce too long: {0} bytes")]
	NonceTooLong(usize),
}

/// Parse as many fields as possible.
///
/// Returns the fields read and whether the whole buffer was consumed. A malformed tail does not
/// discard the fields parsed before it.
pub fn parse_tx_extra(extra: &[u8]) -> (Vec<ExtraField>, bool) {
	let mut fields = Vec::new();
	let mut pos = 0usize;

	while pos < extra.len() {
		match extra[pos] {
			TX_EXTRA_TAG_PADDING => {
				let padding = &extra[pos..];
				if padding.len() > TX_EXTRA_PADDING_MAX_COUNT || padding.iter().any(|b| *b != 0) {
					return (fields, false);
				}
				fields.push(ExtraField::Padding(padding.len()));
				pos = extra.len();
			}
			TX_EXTRA_TAG_PUBKEY => {
				let Some(bytes) = extra.get(pos + 1..pos + 33) else {
					return (fields, false);
				};
				let mut key = [0u8; 32];
				key.copy_from_slice(bytes);
				fields.push(ExtraField::PubKey(PublicKey(key)));
				pos += 33;
			}
			TX_EXTRA_NONCE => {
				let Some(&len) = extra.get(pos + 1) else {
					return (fields, false);
				};
				let start = pos + 2;
				let Some(nonce) = extra.get(start..start + len as usize) else {
					return (fields, false);
				};
				fields.push(ExtraField::Nonce(nonce.to_vec()));
				pos = start + len as usize;
			}
			_ => return (fields, false),
		}
	}

	(fields, true)
}

pub fn get_tx_pub_key_from_extra(extra: &[u8]) -> Option<PublicKey> {
	let (fields, _) = parse_tx_extra(extra);
	fields.into_iter().find_map(|field| match field {
		ExtraField::PubKey(key) => Some(key),
		_ => None,
	})
}

pub fn add_tx_pub_key_to_extra(extra: &mut Vec<u8>, key: &PublicKey) {
	extra.push(TX_EXTRA_TAG_PUBKEY);
	extra.extend_from_slice(&key.0);
}

pub fn add_extra_nonce_to_tx_extra(extra: &mut Vec<u8>, nonce: &[u8]) -> Result<(), ExtraError> {
	if nonce.len() > TX_EXTRA_NONCE_MAX_COUNT {
		return Err(ExtraError::NonceTooLong(nonce.len()));
	}
	extra.push(TX_EXTRA_NONCE);
	extra.push(nonce.len() as u8);
	extra.extend_from_slice(nonce);
	Ok(())
}

pub fn set_payment_id_to_tx_extra_nonce(payment_id: &Hash) -> Vec<u8> {
	let mut nonce = Vec::with_capacity(33);
	nonce.push(TX_EXTRA_NONCE_PAYMENT_ID);
	nonce.extend_from_slice(&payment_id.0);
	nonce
}

pub fn get_payment_id_from_tx_extra_nonce(nonce: &[u8]) -> Option<Hash> {
	if nonce.len() != 33 || nonce[0] != TX_EXTRA_NONCE_PAYMENT_ID {
		return None;
	}
	let mut id = [0u8; 32];
	id.copy_from_slice(&nonce[1..]);
	Some(Hash(id))
}

/// Payment id carried in the first extra nonce, if any.
pub fn get_payment_id_from_extra(extra: &[u8]) -> Option<Hash> {
	let (fields, _) = parse_tx_extra(extra);
	fields.iter().find_map(|field| match field {
		ExtraField::Nonce(nonce) => get_payment_id_from_tx_extra_nonce(nonce),
		_ => None,
	})
}

/// Parse a 64 hex character payment id.
pub fn parse_payment_id(payment_id: &str) -> Option<Hash> {
	if payment_id.len() != 64 {
		return None;
	}
	Hash::from_hex(payment_id).ok()
}
