//! Wallet notifications.
//!
//! The scanner and synchronizer emit `WalletEvent`s for new blocks, received and spent outputs,
//! skipped transactions and reorganizations. Handlers registered with the `EventDispatcher` see
//! every event in order; a failing handler is logged and does not affect the wallet or the other
//! handlers.

use crate::crypto::Hash;
use crate::wallet::types::WalletError;
use crate::utils::format_money;
use tracing::{debug, info, warn};

/// Events emitted while the wallet scans the chain
#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    /// A block id was appended to the local chain
    NewBlock { height: u64, block_id: Hash },
    /// An owned output was found
    MoneyReceived {
        height: u64,
        tx_hash: Hash,
        amount: u64,
    },
    /// One of our outputs was spent by a transaction
    MoneySpent {
        height: u64,
        spend_tx_hash: Hash,
        amount: u64,
    },
    /// A transaction without a public key in its extra was ignored
    SkipTransaction { height: u64, tx_hash: Hash },
    /// The local chain was truncated back to `height`
    Reorg { height: u64, blocks_detached: u64 },
    /// A refresh call finished
    RefreshCompleted { blocks_fetched: u64, height: u64 },
}

/// Trait for handling wallet events.
#[async_trait::async_trait]
pub trait WalletEventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in the order they are registered.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn WalletEventHandler>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a new event handler.
    pub fn register_handler(&mut self, handler: Box<dyn WalletEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub async fn dispatch(&mut self, event: &WalletEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}

/// Writes every event to the log.
pub struct LoggingEventHandler {
    coin_decimals: u32,
}

impl LoggingEventHandler {
    pub fn new(coin_decimals: u32) -> Self {
        Self { coin_decimals }
    }
}

#[async_trait::async_trait]
impl WalletEventHandler for LoggingEventHandler {
    async fn handle(&mut self, event: &WalletEvent) -> Result<(), WalletError> {
        match event {
            WalletEvent::NewBlock { height, block_id } => {
                debug!("New block {} at height {}", block_id, height);
            }
            WalletEvent::MoneyReceived {
                height,
                tx_hash,
                amount,
            } => {
                info!(
                    "Received money: {}, with tx: {} at height {}",
                    format_money(*amount, self.coin_decimals),
                    tx_hash,
                    height
                );
            }
            WalletEvent::MoneySpent {
                height,
                spend_tx_hash,
                amount,
            } => {
                info!(
                    "Spent money: {}, with tx: {} at height {}",
                    format_money(*amount, self.coin_decimals),
                    spend_tx_hash,
                    height
                );
            }
            WalletEvent::SkipTransaction { height, tx_hash } => {
                warn!(
                    "Public key wasn't found in the transaction extra at height {}. Skipping transaction {}",
                    height, tx_hash
                );
            }
            WalletEvent::Reorg {
                height,
                blocks_detached,
            } => {
                warn!(
                    "Blockchain reorganization: detached {} blocks from height {}",
                    blocks_detached, height
                );
            }
            WalletEvent::RefreshCompleted {
                blocks_fetched,
                height,
            } => {
                info!(
                    "Refresh done, blocks received: {}, height: {}",
                    blocks_fetched, height
                );
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingEventHandler"
    }
}
