//! CryptoNote primitives over the Ed25519 group.
//!
//! Keys, derivations and key images travel as their 32-byte compressed encodings and are only
//! decompressed when an operation needs the group element. Hashing is Keccak-256 throughout.

mod hash;
mod keys;
mod ring;

pub use hash::*;
pub use keys::*;
pub use ring::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
	#[error("Invalid point encoding: {0}")]
	InvalidPoint(String),

	#[error("Invalid scalar encoding")]
	InvalidScalar,

	#[error("Invalid hex: {0}")]
	InvalidHex(String),

	#[error("Ring signature error: {0}")]
	RingSignature(String),
}
