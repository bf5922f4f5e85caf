//! State persistence service for the wallet.
//!
//! A wallet lives in three files next to each other: the password-encrypted keys file
//! (`<wallet>.keys`), a plain-text address file (`<wallet>.address.txt`) and the versioned
//! wallet-state file (`<wallet>`) with its `.meta.json` companion. The repository traits hide
//! the file handling; this module owns the formats and the rules for opening a wallet.

use crate::config::WalletConfig;
use crate::crypto::{Hash, KeyImage};
use crate::daemon::LedgerClient;
use crate::wallet::account::Account;
use crate::wallet::address::AccountAddress;
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::sync::repositories::{
    FileKeysRepository, FileWalletStateRepository, KeysRepository, WalletStateRepository,
};
use crate::wallet::types::{PaymentDetails, TransferDetails, UnconfirmedTransfer, WalletError};

use argon2::Argon2;
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use zeroize::Zeroizing;

/// Version written by `WalletState::to_bytes`.
///
/// Files below version 5 carry no usable state, version 6 added unconfirmed transfers and
/// version 7 added payments.
pub const WALLET_FILE_VERSION: u32 = 7;

const FIRST_STATEFUL_VERSION: u32 = 5;
const UNCONFIRMED_TXS_VERSION: u32 = 6;
const PAYMENTS_VERSION: u32 = 7;

/// The persistent part of a `LightWallet`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WalletState {
    pub blockchain: Vec<Hash>,
    pub transfers: Vec<TransferDetails>,
    pub address: AccountAddress,
    pub key_images: HashMap<KeyImage, usize>,
    pub unconfirmed_txs: HashMap<Hash, UnconfirmedTransfer>,
    pub payments: HashMap<Hash, Vec<PaymentDetails>>,
}

impl WalletState {
    /// Empty state bound to `address`.
    pub fn new(address: AccountAddress) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, WalletError> {
        self.encode(WALLET_FILE_VERSION)
    }

    /// Encode the sections that exist in `version` of the format.
    pub(crate) fn encode(&self, version: u32) -> Result<Vec<u8>, WalletError> {
        let mut out = Vec::new();
        bincode::serialize_into(&mut out, &version)?;
        if version < FIRST_STATEFUL_VERSION {
            return Ok(out);
        }
        bincode::serialize_into(&mut out, &self.blockchain)?;
        bincode::serialize_into(&mut out, &self.transfers)?;
        bincode::serialize_into(&mut out, &self.address)?;
        bincode::serialize_into(&mut out, &self.key_images)?;
        if version >= UNCONFIRMED_TXS_VERSION {
            bincode::serialize_into(&mut out, &self.unconfirmed_txs)?;
        }
        if version >= PAYMENTS_VERSION {
            bincode::serialize_into(&mut out, &self.payments)?;
        }
        Ok(out)
    }

    /// Decode a wallet file, returning the version it was written with.
    ///
    /// Sections the version does not have are left empty. For versions below 5 the whole
    /// state is empty, address included.
    pub fn from_bytes(bytes: &[u8]) -> Result<(u32, Self), WalletError> {
        let mut reader = bytes;
        let version: u32 = bincode::deserialize_from(&mut reader)?;
        if version > WALLET_FILE_VERSION {
            return Err(WalletError::Storage(format!(
                "unsupported wallet file version {}",
                version
            )));
        }

        let mut state = Self::default();
        if version < FIRST_STATEFUL_VERSION {
            return Ok((version, state));
        }
        state.blockchain = bincode::deserialize_from(&mut reader)?;
        state.transfers = bincode::deserialize_from(&mut reader)?;
        state.address = bincode::deserialize_from(&mut reader)?;
        state.key_images = bincode::deserialize_from(&mut reader)?;
        if version >= UNCONFIRMED_TXS_VERSION {
            state.unconfirmed_txs = bincode::deserialize_from(&mut reader)?;
        }
        if version >= PAYMENTS_VERSION {
            state.payments = bincode::deserialize_from(&mut reader)?;
        }
        Ok((version, state))
    }
}

/// A wallet-state file as read from disk.
#[derive(Debug, Clone)]
pub struct StoredWalletState {
    pub version: u32,
    pub state: WalletState,
    pub sync_height: u64,
}

/// On-disk keys file: the account encrypted under a password-derived key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysFile {
    pub salt: [u8; 16],
    pub nonce: [u8; 24],
    pub account_data: Vec<u8>,
}

fn derive_key(password: &str, salt: &[u8; 16]) -> Result<Zeroizing<[u8; 32]>, WalletError> {
    let mut key = Zeroizing::new([0u8; 32]);
    Argon2::default()
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| WalletError::Storage(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

impl KeysFile {
    /// Encrypt `account` with a fresh salt and nonce.
    pub fn seal(account: &Account, password: &str) -> Result<Self, WalletError> {
        let mut salt = [0u8; 16];
        let mut nonce = [0u8; 24];
        let mut rng = rand::rng();
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = derive_key(password, &salt)?;
        let plaintext = Zeroizing::new(bincode::serialize(account)?);
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let account_data = cipher
            .encrypt(XNonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| WalletError::Storage("failed to encrypt account keys".to_string()))?;

        Ok(Self {
            salt,
            nonce,
            account_data,
        })
    }

    /// Decrypt the account and check that its secret keys match the public ones.
    pub fn open(&self, password: &str) -> Result<Account, WalletError> {
        let key = derive_key(password, &self.salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let plaintext = cipher
            .decrypt(XNonce::from_slice(&self.nonce), self.account_data.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| WalletError::InvalidPassword)?;

        let account: Account = bincode::deserialize(&plaintext)?;
        if !account.verify() {
            return Err(WalletError::InvalidPassword);
        }
        Ok(account)
    }
}

/// Service for creating, storing and opening wallets.
pub struct StatePersistenceService {
    keys_repo: Box<dyn KeysRepository + Send + Sync>,
    wallet_repo: Box<dyn WalletStateRepository + Send + Sync>,
    address_prefix: String,
}

impl StatePersistenceService {
    /// Create a service for the wallet at `wallet_path`.
    pub fn new(wallet_path: PathBuf, address_prefix: impl Into<String>) -> Self {
        Self {
            keys_repo: Box::new(FileKeysRepository::new(wallet_path.clone())),
            wallet_repo: Box::new(FileWalletStateRepository::new(wallet_path)),
            address_prefix: address_prefix.into(),
        }
    }

    /// Generate a fresh account and write its files.
    pub async fn generate(&self, password: &str) -> Result<Account, WalletError> {
        let account = Account::generate();
        self.create(&account, password).await?;
        Ok(account)
    }

    /// Write the keys, address and an empty wallet state for `account`.
    ///
    /// Refuses to touch an existing wallet.
    pub async fn create(&self, account: &Account, password: &str) -> Result<(), WalletError> {
        if self.keys_repo.exists().await || self.wallet_repo.exists().await {
            return Err(WalletError::FileExists(
                "a wallet already exists at this path".to_string(),
            ));
        }

        let address = account.address().encode(&self.address_prefix)?;
        let keys = KeysFile::seal(account, password)?;
        self.keys_repo.save(&keys, &address).await?;
        self.wallet_repo
            .save(&WalletState::new(*account.address()), 0)
            .await?;

        info!("Generated new wallet {}", address);
        Ok(())
    }

    /// Decrypt the account from the keys file.
    pub async fn load_keys(&self, password: &str) -> Result<Account, WalletError> {
        let keys = self
            .keys_repo
            .load()
            .await?
            .ok_or_else(|| WalletError::FileNotFound("keys file".to_string()))?;
        keys.open(password)
    }

    /// Write the wallet state at the wallet's current height.
    pub async fn store(&self, wallet: &LightWallet) -> Result<(), WalletError> {
        self.wallet_repo
            .save(&wallet.snapshot(), wallet.blockchain_height())
            .await
    }

    /// Open the wallet: decrypt the keys, then restore the stored state if there is one.
    pub async fn load(
        &self,
        password: &str,
        config: WalletConfig,
        client: Arc<dyn LedgerClient>,
    ) -> Result<LightWallet, WalletError> {
        let account = self.load_keys(password).await?;

        let Some(stored) = self.wallet_repo.load().await? else {
            info!("No wallet state found, starting from an empty history");
            return LightWallet::new(account, config, client);
        };

        let state = if stored.version < FIRST_STATEFUL_VERSION {
            info!(
                "Wallet state v{} predates stored history, starting from an empty history",
                stored.version
            );
            WalletState::new(*account.address())
        } else {
            stored.state
        };

        let wallet = LightWallet::from_parts(account, config, client, state)?;
        info!(
            "Opened wallet at height {} with {} transfers",
            wallet.blockchain_height(),
            wallet.transfers().len()
        );
        Ok(wallet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{funded_wallet, test_config};

    fn service_in(dir: &tempfile::TempDir) -> StatePersistenceService {
        StatePersistenceService::new(
            dir.path().join("wallet"),
            WalletConfig::default().address_prefix,
        )
    }

    #[tokio::test]
    async fn test_store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);
        let (mut wallet, ledger) = funded_wallet(&[30, 40]).await;
        wallet.payments.insert(
            Hash([9u8; 32]),
            vec![PaymentDetails {
                tx_hash: wallet.transfers()[0].tx_hash,
                amount: 30,
                block_height: 1,
                unlock_time: 0,
            }],
        );

        service.create(wallet.account(), "hunter2").await.unwrap();
        service.store(&wallet).await.unwrap();

        let loaded = service
            .load("hunter2", wallet.config().clone(), ledger)
            .await
            .unwrap();
        assert_eq!(loaded.snapshot(), wallet.snapshot());
        assert_eq!(loaded.balance(), 70);
        assert!(dir.path().join("wallet.address.txt").exists());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);
        service.generate("right").await.unwrap();

        let result = service.load_keys("wrong").await;
        assert!(matches!(result, Err(WalletError::InvalidPassword)));
        assert!(service.load_keys("right").await.unwrap().verify());
    }

    #[tokio::test]
    async fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);
        service.generate("pw").await.unwrap();

        let result = service.generate("pw").await;
        assert!(matches!(result, Err(WalletError::FileExists(_))));
    }

    #[tokio::test]
    async fn test_older_versions_load_missing_sections_empty() {
        let (mut wallet, _ledger) = funded_wallet(&[30]).await;
        wallet.payments.insert(Hash([1u8; 32]), Vec::new());
        let state = wallet.snapshot();

        let (version, v6) = WalletState::from_bytes(&state.encode(6).unwrap()).unwrap();
        assert_eq!(version, 6);
        assert_eq!(v6.transfers, state.transfers);
        assert_eq!(v6.blockchain, state.blockchain);
        assert!(v6.payments.is_empty());

        let (_, v5) = WalletState::from_bytes(&state.encode(5).unwrap()).unwrap();
        assert_eq!(v5.key_images, state.key_images);
        assert!(v5.unconfirmed_txs.is_empty());

        let (_, v4) = WalletState::from_bytes(&state.encode(4).unwrap()).unwrap();
        assert_eq!(v4, WalletState::default());

        let mut future = state.to_bytes().unwrap();
        future[0] = 8;
        assert!(matches!(
            WalletState::from_bytes(&future),
            Err(WalletError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_pre_history_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);
        let (wallet, ledger) = funded_wallet(&[30]).await;
        service.create(wallet.account(), "pw").await.unwrap();
        tokio::fs::write(
            dir.path().join("wallet"),
            wallet.snapshot().encode(4).unwrap(),
        )
        .await
        .unwrap();

        let loaded = service
            .load("pw", wallet.config().clone(), ledger)
            .await
            .unwrap();
        assert!(loaded.transfers().is_empty());
        assert_eq!(loaded.blockchain(), &wallet.blockchain()[..1]);
    }

    #[tokio::test]
    async fn test_foreign_state_does_not_correspond() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(&dir);
        let (wallet, ledger) = funded_wallet(&[30]).await;
        service.generate("pw").await.unwrap();
        service.store(&wallet).await.unwrap();

        let result = service
            .load("pw", test_config(&wallet.blockchain()[0]), ledger)
            .await;
        assert!(matches!(result, Err(WalletError::FilesDontCorrespond(_))));
    }
}
