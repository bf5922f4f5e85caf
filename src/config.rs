//! Wallet configuration.
//!
//! Every chain constant the engine consults lives here and is passed in at construction, so
//! tests and alternative networks can tune them without touching the engine. Values are loaded
//! from an optional JSON file and a handful of environment overrides.

use crate::crypto::Hash;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable pointing at a JSON config file.
pub const CONFIG_PATH_ENV: &str = "WALLET_CONFIG";
/// Environment variable overriding the daemon address.
pub const DAEMON_ADDRESS_ENV: &str = "WALLET_DAEMON_ADDRESS";

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Failed to read config file: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Failed to parse config file: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Invalid config value: {0}")]
	InvalidValue(String),
}

/// Retry policy for block fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
	/// Retries after the first failed attempt before the error is surfaced.
	pub max_retries: u32,
	/// First delay between attempts, in milliseconds. Zero disables waiting.
	pub initial_interval_ms: u64,
	/// Upper bound for the delay between attempts, in milliseconds.
	pub max_interval_ms: u64,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_interval_ms: 500,
			max_interval_ms: 5_000,
		}
	}
}

impl RetryConfig {
	/// Build the delay schedule for one refresh call.
	pub fn backoff(&self) -> ExponentialBackoff {
		ExponentialBackoffBuilder::new()
			.with_initial_interval(Duration::from_millis(self.initial_interval_ms))
			.with_max_interval(Duration::from_millis(
				self.max_interval_ms.max(self.initial_interval_ms),
			))
			.with_randomization_factor(0.0)
			.with_max_elapsed_time(None)
			.build()
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
	/// Base URL of the remote daemon.
	pub daemon_address: String,
	/// Per-request timeout for daemon calls, in milliseconds.
	pub rpc_timeout_ms: u64,
	pub retry: RetryConfig,
	/// Bech32m human readable part used for addresses.
	pub address_prefix: String,
	/// Hex id of the genesis block. Empty means the wallet learns it from the first batch.
	pub genesis_block_id: String,
	/// Unlock times below this value are block heights, above it Unix timestamps.
	pub max_block_number: u64,
	pub locked_tx_allowed_delta_blocks: u64,
	pub locked_tx_allowed_delta_seconds: u64,
	/// Confirmations required before an output may be spent.
	pub spendable_age: u64,
	/// Serialized transactions must stay strictly below this size in bytes.
	pub upper_transaction_size_limit: usize,
	/// Outputs at or below this amount are dust.
	pub dust_threshold: u64,
	/// Smallest fee accepted by the builder. Zero disables the check.
	pub min_fee: u64,
	/// Maximum number of transactions `create_transactions` splits a transfer into.
	pub max_split_attempts: usize,
	/// Blocks older than the account creation time minus this many seconds are not scanned.
	pub block_timestamp_tolerance: u64,
	/// Decimal places of the native coin, for display only.
	pub coin_decimals: u32,
}

impl Default for WalletConfig {
	fn default() -> Self {
		Self {
			daemon_address: "http://localhost:11181".to_string(),
			rpc_timeout_ms: 200_000,
			retry: RetryConfig::default(),
			address_prefix: "aeon".to_string(),
			genesis_block_id: String::new(),
			max_block_number: 500_000_000,
			locked_tx_allowed_delta_blocks: 1,
			locked_tx_allowed_delta_seconds: 240,
			spendable_age: 10,
			upper_transaction_size_limit: 20_000 - 600,
			dust_threshold: 1_000_000,
			min_fee: 0,
			max_split_attempts: 30,
			block_timestamp_tolerance: 60 * 60 * 24,
			coin_decimals: 12,
		}
	}
}

impl WalletConfig {
	/// Load a config from a JSON file. Missing fields fall back to their defaults.
	pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		let config: WalletConfig = serde_json::from_str(&content)?;
		config.validate()?;
		Ok(config)
	}

	/// Load the config named by `WALLET_CONFIG` if set, then apply environment overrides.
	pub fn from_env() -> Result<Self, ConfigError> {
		let config = match std::env::var(CONFIG_PATH_ENV) {
			Ok(path) => Self::from_json_file(Path::new(&path))?,
			Err(_) => Self::default(),
		};
		Ok(config.with_overrides(std::env::var(DAEMON_ADDRESS_ENV).ok()))
	}

	pub fn with_overrides(mut self, daemon_address: Option<String>) -> Self {
		if let Some(address) = daemon_address.filter(|a| !a.is_empty()) {
			self.daemon_address = address;
		}
		self
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_split_attempts == 0 {
			return Err(ConfigError::InvalidValue(
				"max_split_attempts must be positive".to_string(),
			));
		}
		if self.address_prefix.is_empty() {
			return Err(ConfigError::InvalidValue(
				"address_prefix must not be empty".to_string(),
			));
		}
		self.genesis_id()?;
		Ok(())
	}

	/// The configured genesis id, or the null hash when none is configured.
	pub fn genesis_id(&self) -> Result<Hash, ConfigError> {
		if self.genesis_block_id.is_empty() {
			return Ok(Hash::NULL);
		}
		Hash::from_hex(&self.genesis_block_id)
			.map_err(|e| ConfigError::InvalidValue(format!("genesis_block_id: {}", e)))
	}

	pub fn rpc_timeout(&self) -> Duration {
		Duration::from_millis(self.rpc_timeout_ms)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use backoff::backoff::Backoff;
	use std::io::Write;

	#[test]
	fn test_defaults_match_chain_constants() {
		let config = WalletConfig::default();
		assert_eq!(config.max_block_number, 500_000_000);
		assert_eq!(config.upper_transaction_size_limit, 19_400);
		assert_eq!(config.retry.max_retries, 3);
		assert_eq!(config.spendable_age, 10);
		assert!(config.genesis_id().unwrap().is_null());
	}

	#[test]
	fn test_partial_json_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{"daemon_address": "http://node:1234", "retry": {{"max_retries": 5}}}}"#
		)
		.unwrap();

		let config = WalletConfig::from_json_file(file.path()).unwrap();
		assert_eq!(config.daemon_address, "http://node:1234");
		assert_eq!(config.retry.max_retries, 5);
		assert_eq!(config.retry.initial_interval_ms, 500);
		assert_eq!(config.dust_threshold, 1_000_000);
	}

	#[test]
	fn test_invalid_genesis_rejected() {
		let config = WalletConfig {
			genesis_block_id: "abcd".to_string(),
			..WalletConfig::default()
		};
		assert!(matches!(
			config.validate(),
			Err(ConfigError::InvalidValue(_))
		));
	}

	#[test]
	fn test_override_and_zero_backoff() {
		let config = WalletConfig::default().with_overrides(Some("http://other:1".to_string()));
		assert_eq!(config.daemon_address, "http://other:1");

		let retry = RetryConfig {
			initial_interval_ms: 0,
			max_interval_ms: 0,
			..RetryConfig::default()
		};
		let mut backoff = retry.backoff();
		assert_eq!(backoff.next_backoff(), Some(Duration::ZERO));
	}
}
