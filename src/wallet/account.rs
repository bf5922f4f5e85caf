//! Account key material.
//!
//! The view key pair lets the wallet recognise incoming outputs; the spend secret key is needed
//! to derive key images and sign. An account without a spend secret is view-only.

use crate::crypto::{
	PublicKey, SecretKey, generate_keys, hash_to_scalar, secret_key_to_public_key,
};
use crate::utils::unix_now;
use crate::wallet::address::AccountAddress;
use curve25519_dalek::edwards::EdwardsPoint;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccountKeys {
	pub address: AccountAddress,
	pub spend_secret_key: Option<SecretKey>,
	pub view_secret_key: SecretKey,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
	keys: AccountKeys,
	/// Unix seconds; blocks well before this are not scanned.
	create_time: u64,
}

/// True when `secret` is the discrete log of `expected`.
pub fn verify_keys(secret: &SecretKey, expected: &PublicKey) -> bool {
	secret_key_to_public_key(secret)
		.map(|public| public == *expected)
		.unwrap_or(false)
}

impl Account {
	/// Fresh account. The view key is derived from the spend key so the spend key alone
	/// restores both.
	pub fn generate() -> Self {
		let (spend_public_key, spend_secret_key) = generate_keys();
		let view_scalar = hash_to_scalar(&spend_secret_key.0);
		let view_secret_key = SecretKey::from_scalar(&view_scalar);
		let view_public_key = PublicKey::from_point(&EdwardsPoint::mul_base(&view_scalar));

		Self {
			keys: AccountKeys {
				address: AccountAddress {
					spend_public_key,
					view_public_key,
				},
				spend_secret_key: Some(spend_secret_key),
				view_secret_key,
			},
			create_time: unix_now(),
		}
	}

	/// Rebuild an account from caller-held keys. Returns `None` if a secret key does not match
	/// the address.
	pub fn from_keys(
		address: AccountAddress,
		view_secret_key: SecretKey,
		spend_secret_key: Option<SecretKey>,
		create_time: u64,
	) -> Option<Self> {
		let account = Self {
			keys: AccountKeys {
				address,
				spend_secret_key,
				view_secret_key,
			},
			create_time,
		};
		account.verify().then_some(account)
	}

	/// Check every secret key present against its public counterpart.
	pub fn verify(&self) -> bool {
		let view_ok = verify_keys(&self.keys.view_secret_key, &self.keys.address.view_public_key);
		let spend_ok = self
			.keys
			.spend_secret_key
			.as_ref()
			.map(|secret| verify_keys(secret, &self.keys.address.spend_public_key))
			.unwrap_or(true);
		view_ok && spend_ok
	}

	pub fn keys(&self) -> &AccountKeys {
		&self.keys
	}

	pub fn address(&self) -> &AccountAddress {
		&self.keys.address
	}

	pub fn create_time(&self) -> u64 {
		self.create_time
	}

	pub fn set_create_time(&mut self, create_time: u64) {
		self.create_time = create_time;
	}

	pub fn is_view_only(&self) -> bool {
		self.keys.spend_secret_key.is_none()
	}

	pub fn to_view_only(&self) -> Self {
		let mut account = self.clone();
		account.keys.spend_secret_key = None;
		account
	}
}
