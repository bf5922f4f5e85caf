//! Chain synchronization.
//!
//! The synchronizer pulls batches of blocks from the daemon, reconciles them with the local
//! block-id chain and hands every new block to the tracker. The daemon locates the common
//! ancestor from the short chain history sent with each request, so a reorganization shows up as
//! a block whose id differs from the local one at the same height; everything from that height
//! on is detached and rescanned.
//!
//! Transient failures (transport errors, a busy daemon, malformed replies) are retried with an
//! exponential backoff. Blocks processed before a failure are kept, so a retry only re-requests
//! what is still missing.

use crate::crypto::Hash;
use crate::daemon::{CORE_RPC_STATUS_BUSY, CORE_RPC_STATUS_OK, GetBlocksRequest};
use crate::wallet::light_wallet::LightWallet;
use crate::wallet::sync::{
    events::WalletEvent,
    progress_tracker::SyncProgressTracker,
    transaction_processor::{ParsedBlock, TransactionProcessor},
};
use crate::wallet::types::{RefreshSummary, WalletError};

use backoff::backoff::Backoff;
use tracing::{debug, error, info, warn};

/// Where a refresh asks the daemon to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartHeight {
    /// Use this height for the first batch, then let the daemon locate the common ancestor.
    Fixed(u64),
    /// Always continue from the end of the local chain.
    LocalChain,
}

impl LightWallet {
    /// Block ids the daemon uses to find the common ancestor, newest first.
    ///
    /// The ten most recent ids, then ids at doubling distances, then the genesis id. Unknown ids
    /// are left out.
    pub fn short_chain_history(&self) -> Vec<Hash> {
        let sz = self.blockchain.len();
        let mut ids = Vec::new();
        if sz == 0 {
            return ids;
        }

        let mut i = 0usize;
        let mut current_multiplier = 1usize;
        let mut current_back_offset = 1usize;
        while current_back_offset < sz {
            let id = self.blockchain[sz - current_back_offset];
            if !id.is_null() {
                ids.push(id);
            }
            if i < 10 {
                current_back_offset += 1;
            } else {
                current_multiplier *= 2;
                current_back_offset += current_multiplier;
            }
            i += 1;
        }

        if !self.blockchain[0].is_null() {
            ids.push(self.blockchain[0]);
        }
        ids
    }

    /// Sync from the common ancestor with the daemon up to its tip.
    pub async fn refresh(&mut self) -> Result<RefreshSummary, WalletError> {
        self.pull(StartHeight::Fixed(0), None).await
    }

    /// Sync starting at `start_height`. Heights below it that the wallet has not seen are
    /// treated as already scanned.
    pub async fn refresh_from(&mut self, start_height: u64) -> Result<RefreshSummary, WalletError> {
        self.pull(StartHeight::Fixed(start_height), None).await
    }

    /// Sync starting right after the last locally known block.
    pub async fn refresh_from_local_bc(&mut self) -> Result<RefreshSummary, WalletError> {
        self.pull(StartHeight::LocalChain, None).await
    }

    /// Sync until the block containing `txid` has been processed.
    pub async fn refresh_until(
        &mut self,
        start_height: u64,
        txid: &Hash,
    ) -> Result<RefreshSummary, WalletError> {
        self.pull(StartHeight::Fixed(start_height), Some(*txid)).await
    }

    async fn pull(
        &mut self,
        start: StartHeight,
        target: Option<Hash>,
    ) -> Result<RefreshSummary, WalletError> {
        self.clear_stop();
        if let StartHeight::Fixed(height) = start {
            self.assume_scanned_up_to(height);
        }
        info!(
            "Starting refresh at local height {} ({:?})",
            self.blockchain_height(),
            start
        );

        let mut summary = RefreshSummary::default();
        let mut tracker = SyncProgressTracker::new(self.blockchain_height());
        let mut backoff = self.config.retry.backoff();
        let mut try_count = 0u32;
        let mut first_batch = true;

        loop {
            if self.stop_requested() {
                info!("Refresh cancelled at height {}", self.blockchain_height());
                break;
            }

            let start_height = match start {
                StartHeight::Fixed(height) if first_batch => height,
                StartHeight::Fixed(_) => 0,
                StartHeight::LocalChain => self.blockchain_height(),
            };

            match self
                .pull_blocks(start_height, target.as_ref(), &mut summary, &mut tracker)
                .await
            {
                Ok(added) => {
                    first_batch = false;
                    tracker.record_batch();
                    tracker.log_progress(false);
                    if added == 0 || summary.target_found {
                        break;
                    }
                }
                Err(e) if e.is_retryable() && try_count < self.config.retry.max_retries => {
                    try_count += 1;
                    let delay = backoff.next_backoff().unwrap_or_default();
                    warn!(
                        "Failed to pull blocks (attempt {}/{}), retrying in {:?}: {}",
                        try_count, self.config.retry.max_retries, delay, e
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(e) => {
                    error!("Failed to pull blocks: {}", e);
                    return Err(e);
                }
            }
        }

        tracker.log_progress(true);
        info!("{}", tracker.get_stats().summary());
        self.events
            .dispatch(&WalletEvent::RefreshCompleted {
                blocks_fetched: summary.blocks_fetched,
                height: self.blockchain_height(),
            })
            .await;
        Ok(summary)
    }

    /// Fetch and apply one batch. Returns the number of blocks appended.
    async fn pull_blocks(
        &mut self,
        start_height: u64,
        target: Option<&Hash>,
        summary: &mut RefreshSummary,
        tracker: &mut SyncProgressTracker,
    ) -> Result<u64, WalletError> {
        let request = GetBlocksRequest {
            block_ids: self
                .short_chain_history()
                .iter()
                .map(Hash::to_hex)
                .collect(),
            start_height,
        };
        let response = self.client.get_blocks(&request).await?;
        if response.status == CORE_RPC_STATUS_BUSY {
            return Err(WalletError::DaemonBusy("getblocks".to_string()));
        }
        if response.status != CORE_RPC_STATUS_OK {
            return Err(WalletError::Protocol(format!(
                "getblocks returned status {}",
                response.status
            )));
        }
        debug!(
            "Received {} blocks starting at {} (daemon height {})",
            response.blocks.len(),
            response.start_height,
            response.current_height
        );

        let processor = TransactionProcessor::new();
        let mut current_index = response.start_height;
        let mut added = 0u64;

        for entry in &response.blocks {
            let parsed = processor.parse_block_entry(entry)?;
            let index = current_index as usize;
            let local_height = self.blockchain.len();

            if index > local_height {
                return Err(WalletError::Consistency(format!(
                    "daemon returned block {} while the local chain ends at {}",
                    current_index, local_height
                )));
            } else if index == local_height {
                self.process_new_block(&parsed, current_index, target, summary, tracker)
                    .await?;
                added += 1;
            } else if self.blockchain[index] == parsed.id {
                debug!("Block is already in blockchain: {}", parsed.id);
            } else if self.blockchain[index].is_null() {
                self.blockchain[index] = parsed.id;
            } else if current_index == response.start_height {
                error!(
                    "Wrong daemon response: split starts from the first block in response {} (height {}), local blockchain height {}",
                    parsed.id, current_index, local_height
                );
                return Err(WalletError::Consistency(format!(
                    "chain split at the first block of the batch, height {}",
                    current_index
                )));
            } else {
                let blocks_detached = self.detach_blockchain(current_index);
                tracker.record_reorg(current_index);
                self.events
                    .dispatch(&WalletEvent::Reorg {
                        height: current_index,
                        blocks_detached,
                    })
                    .await;
                self.process_new_block(&parsed, current_index, target, summary, tracker)
                    .await?;
                added += 1;
            }

            if summary.target_found {
                break;
            }
            current_index += 1;
        }

        Ok(added)
    }

    async fn process_new_block(
        &mut self,
        parsed: &ParsedBlock,
        height: u64,
        target: Option<&Hash>,
        summary: &mut RefreshSummary,
        tracker: &mut SyncProgressTracker,
    ) -> Result<(), WalletError> {
        let create_time = self.account.create_time();
        let scan = parsed
            .block
            .timestamp()
            .saturating_add(self.config.block_timestamp_tolerance)
            > create_time;

        let miner_tx_hash = parsed.block.miner_tx.hash()?;
        if scan {
            let outcome = self
                .process_transaction(&parsed.block.miner_tx, &miner_tx_hash, height)
                .await?;
            tracker.record_transaction();
            if outcome.received > 0 {
                summary.received_money = true;
                summary.received_tx_hashes.push(miner_tx_hash);
            }

            for (tx_hash, tx) in &parsed.txs {
                let outcome = self.process_transaction(tx, tx_hash, height).await?;
                tracker.record_transaction();
                if outcome.received > 0 {
                    summary.received_money = true;
                    summary.received_tx_hashes.push(*tx_hash);
                }
            }
        } else {
            debug!(
                "Skipped block by timestamp, height: {}, block time {}, account time {}",
                height,
                parsed.block.timestamp(),
                create_time
            );
        }

        if let Some(target) = target {
            if miner_tx_hash == *target || parsed.txs.iter().any(|(hash, _)| hash == target) {
                info!("Found transaction {} in block {}", target, height);
                summary.target_found = true;
            }
        }

        self.blockchain.push(parsed.id);
        summary.blocks_fetched += 1;
        tracker.record_block(height, scan);
        self.events
            .dispatch(&WalletEvent::NewBlock {
                height,
                block_id: parsed.id,
            })
            .await;
        Ok(())
    }
}
