//! Wallet Synchronization Module
//!
//! Keeps the wallet in step with the remote daemon and on disk:
//!
//! - `synchronizer`: pulls block batches, detects reorganizations and feeds the tracker.
//! - `transaction_processor`: decodes the block and transaction blobs the daemon returns.
//! - `events`: notifications raised while scanning and the handlers that receive them.
//! - `progress_tracker`: counters and periodic progress logging for a refresh.
//! - `state_persistence`: keys file and versioned wallet-state formats.
//! - `repositories`: file-backed storage behind the persistence service.

/// Notifications raised while scanning
pub mod events;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// File repositories for keys and wallet state
pub mod repositories;
/// Wallet files and their formats
pub mod state_persistence;
/// Chain reconciliation and the refresh loop
pub mod synchronizer;
/// Block and transaction decoding
pub mod transaction_processor;

pub use events::{EventDispatcher, LoggingEventHandler, WalletEvent, WalletEventHandler};
pub use state_persistence::{StatePersistenceService, WALLET_FILE_VERSION, WalletState};
pub use synchronizer::StartHeight;
