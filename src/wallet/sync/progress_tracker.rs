//! Progress tracking for a refresh call.
//!
//! `SyncProgressTracker` counts the blocks, transactions and reorganizations seen while the
//! synchronizer pulls batches, logs progress every thousand blocks, and summarizes the call when
//! it finishes.

use tracing::info;

/// Counters for one refresh call
#[derive(Debug, Clone)]
pub struct SyncProgressTracker {
    /// Height the call started from
    start_height: u64,
    /// Highest height appended so far
    highest_height: u64,
    blocks_appended: u64,
    /// Blocks whose transactions were skipped because they predate the account
    blocks_skipped: u64,
    transactions_processed: usize,
    reorgs: usize,
    batches: usize,
    /// Last height at which we logged progress
    last_logged_height: u64,
}

impl SyncProgressTracker {
    /// Create a new progress tracker starting from the given height.
    pub fn new(start_height: u64) -> Self {
        Self {
            start_height,
            highest_height: start_height,
            blocks_appended: 0,
            blocks_skipped: 0,
            transactions_processed: 0,
            reorgs: 0,
            batches: 0,
            last_logged_height: start_height,
        }
    }

    pub fn record_batch(&mut self) {
        self.batches += 1;
    }

    /// Record an appended block; `scanned` is false when its transactions were not examined.
    pub fn record_block(&mut self, height: u64, scanned: bool) {
        self.highest_height = self.highest_height.max(height);
        self.blocks_appended += 1;
        if !scanned {
            self.blocks_skipped += 1;
        }
    }

    pub fn record_transaction(&mut self) {
        self.transactions_processed += 1;
    }

    pub fn record_reorg(&mut self, height: u64) {
        self.reorgs += 1;
        self.highest_height = height;
        self.last_logged_height = self.last_logged_height.min(height);
    }

    pub fn blocks_appended(&self) -> u64 {
        self.blocks_appended
    }

    /// Log progress at regular intervals or when forced
    pub fn log_progress(&mut self, force: bool) {
        let blocks_since_last_log = self.highest_height.saturating_sub(self.last_logged_height);
        let should_log = force || blocks_since_last_log >= 1000;

        if should_log && self.blocks_appended > 0 {
            info!(
                "Sync progress: {} blocks, {} transactions processed up to height {}",
                self.blocks_appended, self.transactions_processed, self.highest_height
            );
            self.last_logged_height = self.highest_height;
        }
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            start_height: self.start_height,
            highest_height: self.highest_height,
            blocks_appended: self.blocks_appended,
            blocks_skipped: self.blocks_skipped,
            transactions_processed: self.transactions_processed,
            reorgs: self.reorgs,
            batches: self.batches,
        }
    }
}

/// Statistics about a refresh call
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStats {
    pub start_height: u64,
    pub highest_height: u64,
    pub blocks_appended: u64,
    pub blocks_skipped: u64,
    pub transactions_processed: usize,
    pub reorgs: usize,
    pub batches: usize,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "Sync from {} to {}: {} blocks ({} skipped), {} transactions, {} batches{}",
            self.start_height,
            self.highest_height,
            self.blocks_appended,
            self.blocks_skipped,
            self.transactions_processed,
            self.batches,
            if self.reorgs == 0 {
                String::new()
            } else {
                format!(" ({} reorgs)", self.reorgs)
            }
        )
    }
}
