use bech32::{Bech32m, Hrp};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::crypto::{PublicKey, check_key};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
	#[error("bech32 decoding failed: {0}")]
	Decode(String),
	#[error("bech32 encoding failed: {0}")]
	Encode(String),
	#[error("prefix '{found}' != '{expected}'")]
	PrefixMismatch { expected: String, found: String },
	#[error("address payload must be 64 bytes, got {0}")]
	InvalidLength(usize),
	#[error("address contains an invalid public key")]
	InvalidKey,
}

/// Public address: spend and view public keys.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountAddress {
	pub spend_public_key: PublicKey,
	pub view_public_key: PublicKey,
}

impl AccountAddress {
	/// Decode a bech32m address and check its prefix and keys.
	pub fn decode(encoded: &str, expected_prefix: &str) -> Result<Self, AddressError> {
		let (hrp, data) =
			bech32::decode(encoded).map_err(|e| AddressError::Decode(e.to_string()))?;
		if hrp.as_str() != expected_prefix {
			return Err(AddressError::PrefixMismatch {
				expected: expected_prefix.to_string(),
				found: hrp.to_string(),
			});
		}
		if data.len() != 64 {
			return Err(AddressError::InvalidLength(data.len()));
		}

		let mut spend = [0u8; 32];
		let mut view = [0u8; 32];
		spend.copy_from_slice(&data[..32]);
		view.copy_from_slice(&data[32..]);
		let address = Self {
			spend_public_key: PublicKey(spend),
			view_public_key: PublicKey(view),
		};
		if !check_key(&address.spend_public_key) || !check_key(&address.view_public_key) {
			return Err(AddressError::InvalidKey);
		}
		Ok(address)
	}

	pub fn encode(&self, prefix: &str) -> Result<String, AddressError> {
		let hrp = Hrp::parse(prefix).map_err(|e| AddressError::Encode(e.to_string()))?;
		let data = [&self.spend_public_key.0[..], &self.view_public_key.0[..]].concat();
		bech32::encode::<Bech32m>(hrp, &data).map_err(|e| AddressError::Encode(e.to_string()))
	}
}

impl fmt::Debug for AccountAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AccountAddress")
			.field("spend", &self.spend_public_key.to_hex())
			.field("view", &self.view_public_key.to_hex())
			.finish()
	}
}
