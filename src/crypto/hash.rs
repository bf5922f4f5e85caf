use super::CryptoError;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

pub const HASH_SIZE: usize = 32;

/// Keccak-256 digest, used for transaction ids, block ids and payment ids.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl Hash {
	pub const NULL: Hash = Hash([0u8; HASH_SIZE]);

	pub fn is_null(&self) -> bool {
		self.0 == [0u8; HASH_SIZE]
	}

	pub fn to_hex(&self) -> String {
		hex::encode(self.0)
	}

	pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
		Ok(Self(decode_hex_32(s)?))
	}
}

impl fmt::Display for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_hex())
	}
}

impl fmt::Debug for Hash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Hash({})", self.to_hex())
	}
}

pub(crate) fn decode_hex_32(s: &str) -> Result<[u8; 32], CryptoError> {
	let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
	let len = bytes.len();
	bytes
		.try_into()
		.map_err(|_| CryptoError::InvalidHex(format!("expected 32 bytes, got {}", len)))
}

pub fn keccak256(data: &[u8]) -> [u8; 32] {
	Keccak256::digest(data).into()
}

pub fn cn_fast_hash(data: &[u8]) -> Hash {
	Hash(keccak256(data))
}

/// `Hs`: Keccak-256 reduced modulo the group order.
pub fn hash_to_scalar(data: &[u8]) -> Scalar {
	Scalar::from_bytes_mod_order(keccak256(data))
}

/// LEB128-style varint used inside derivation hashes.
pub fn write_varint(mut value: u64, out: &mut Vec<u8>) {
	while value >= 0x80 {
		out.push((value as u8 & 0x7f) | 0x80);
		value >>= 7;
	}
	out.push(value as u8);
}
