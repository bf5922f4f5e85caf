use crate::wallet::sync::state_persistence::{KeysFile, StoredWalletState, WalletState};
use crate::wallet::types::WalletError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Repository for the encrypted keys file
#[async_trait::async_trait]
pub trait KeysRepository {
	async fn exists(&self) -> bool;
	async fn save(&self, keys: &KeysFile, address: &str) -> Result<(), WalletError>;
	async fn load(&self) -> Result<Option<KeysFile>, WalletError>;
}

/// Repository for the versioned wallet state
#[async_trait::async_trait]
pub trait WalletStateRepository {
	async fn exists(&self) -> bool;
	async fn save(&self, state: &WalletState, height: u64) -> Result<(), WalletError>;
	async fn load(&self) -> Result<Option<StoredWalletState>, WalletError>;
}

/// Append a suffix to the wallet path: `wallet` becomes `wallet.keys`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
	let mut name = path.as_os_str().to_owned();
	name.push(suffix);
	PathBuf::from(name)
}

async fn path_exists(path: &Path) -> bool {
	tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// File-based implementation of KeysRepository
pub struct FileKeysRepository {
	wallet_path: PathBuf,
}

impl FileKeysRepository {
	pub fn new(wallet_path: PathBuf) -> Self {
		Self { wallet_path }
	}

	pub fn keys_filename(&self) -> PathBuf {
		with_suffix(&self.wallet_path, ".keys")
	}

	pub fn address_filename(&self) -> PathBuf {
		with_suffix(&self.wallet_path, ".address.txt")
	}
}

#[async_trait::async_trait]
impl KeysRepository for FileKeysRepository {
	async fn exists(&self) -> bool {
		path_exists(&self.keys_filename()).await
	}

	async fn save(&self, keys: &KeysFile, address: &str) -> Result<(), WalletError> {
		let bytes = bincode::serialize(keys)?;

		let filename = self.keys_filename();
		tokio::fs::write(&filename, &bytes).await.map_err(|e| {
			WalletError::Storage(format!("Failed to write keys file {:?}: {}", filename, e))
		})?;

		let address_filename = self.address_filename();
		tokio::fs::write(&address_filename, address)
			.await
			.map_err(|e| {
				WalletError::Storage(format!(
					"Failed to write address file {:?}: {}",
					address_filename, e
				))
			})?;

		info!("Saved keys to {:?}", filename);
		Ok(())
	}

	async fn load(&self) -> Result<Option<KeysFile>, WalletError> {
		let filename = self.keys_filename();
		if !path_exists(&filename).await {
			return Ok(None);
		}

		let bytes = tokio::fs::read(&filename).await.map_err(|e| {
			WalletError::Storage(format!("Failed to read keys file {:?}: {}", filename, e))
		})?;
		let keys: KeysFile = bincode::deserialize(&bytes)?;
		Ok(Some(keys))
	}
}

/// File-based implementation of WalletStateRepository
pub struct FileWalletStateRepository {
	wallet_path: PathBuf,
}

impl FileWalletStateRepository {
	pub fn new(wallet_path: PathBuf) -> Self {
		Self { wallet_path }
	}

	fn metadata_filename(&self) -> PathBuf {
		with_suffix(&self.wallet_path, ".meta.json")
	}
}

#[async_trait::async_trait]
impl WalletStateRepository for FileWalletStateRepository {
	async fn exists(&self) -> bool {
		path_exists(&self.wallet_path).await
	}

	async fn save(&self, state: &WalletState, height: u64) -> Result<(), WalletError> {
		let metadata = serde_json::json!({
			"sync_height": height,
			"timestamp": chrono::Utc::now().to_rfc3339(),
		});
		let metadata = serde_json::to_string_pretty(&metadata).map_err(|e| {
			WalletError::Storage(format!("Failed to encode wallet metadata: {}", e))
		})?;

		let metadata_filename = self.metadata_filename();
		tokio::fs::write(&metadata_filename, metadata)
			.await
			.map_err(|e| {
				WalletError::Storage(format!("Failed to write wallet state metadata: {}", e))
			})?;

		let state_bytes = state.to_bytes()?;
		tokio::fs::write(&self.wallet_path, &state_bytes)
			.await
			.map_err(|e| {
				WalletError::Storage(format!("Failed to write wallet state file: {}", e))
			})?;

		info!(
			"Saved wallet state to {:?} at height {}",
			self.wallet_path, height
		);
		Ok(())
	}

	async fn load(&self) -> Result<Option<StoredWalletState>, WalletError> {
		if !path_exists(&self.wallet_path).await {
			return Ok(None);
		}

		// Metadata is advisory; a missing or broken file leaves the height at zero.
		let mut sync_height = 0u64;
		if let Ok(meta_content) = tokio::fs::read_to_string(self.metadata_filename()).await {
			if let Ok(metadata) = serde_json::from_str::<serde_json::Value>(&meta_content) {
				if let Some(h) = metadata.get("sync_height").and_then(|h| h.as_u64()) {
					sync_height = h;
				}
			}
		}

		let state_bytes = tokio::fs::read(&self.wallet_path).await.map_err(|e| {
			WalletError::Storage(format!("Failed to read wallet state file: {}", e))
		})?;
		let (version, state) = WalletState::from_bytes(&state_bytes)?;

		info!(
			"Loaded wallet state v{} from {:?} at height {}",
			version, self.wallet_path, sync_height
		);
		Ok(Some(StoredWalletState {
			version,
			state,
			sync_height,
		}))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_suffixes_append_to_file_name() {
		let repo = FileKeysRepository::new(PathBuf::from("/tmp/wallets/alice"));
		assert_eq!(repo.keys_filename(), PathBuf::from("/tmp/wallets/alice.keys"));
		assert_eq!(
			repo.address_filename(),
			PathBuf::from("/tmp/wallets/alice.address.txt")
		);
	}

	#[tokio::test]
	async fn test_metadata_written_next_to_state() {
		let dir = tempfile::tempdir().unwrap();
		let repo = FileWalletStateRepository::new(dir.path().join("wallet"));
		assert!(repo.load().await.unwrap().is_none());

		repo.save(&WalletState::default(), 42).await.unwrap();
		let meta = tokio::fs::read_to_string(dir.path().join("wallet.meta.json"))
			.await
			.unwrap();
		let meta: serde_json::Value = serde_json::from_str(&meta).unwrap();
		assert_eq!(meta["sync_height"], 42);
		assert!(meta["timestamp"].as_str().is_some());

		let stored = repo.load().await.unwrap().unwrap();
		assert_eq!(stored.sync_height, 42);
		assert_eq!(stored.state, WalletState::default());
	}
}
