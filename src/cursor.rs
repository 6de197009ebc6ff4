// Cursor Tracker
//
// Owns the last processed block. `advance` only proposes a window; the
// caller commits after the whole cycle succeeded, so a failed fetch or
// delivery leaves the window to be retried on the next tick.

use crate::types::{BlockNumber, ScanWindow};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CursorTracker {
    last_processed: BlockNumber,
    lookback_limit: u64,
}

impl CursorTracker {
    pub fn new(last_processed: BlockNumber, lookback_limit: u64) -> Self {
        Self {
            last_processed,
            lookback_limit,
        }
    }

    pub fn last_processed(&self) -> BlockNumber {
        self.last_processed
    }

    pub fn lookback_limit(&self) -> u64 {
        self.lookback_limit
    }

    /// Window to scan for head `current_block`, or `None` when the head has
    /// not moved past the cursor.
    ///
    /// `from = max(last_processed, current - lookback)`: after downtime only
    /// the most recent `lookback` blocks are searched. The window starts at
    /// the last processed block itself, so consecutive windows overlap by
    /// one block and the ledger absorbs the repeat.
    pub fn advance(&self, current_block: BlockNumber) -> Option<ScanWindow> {
        if current_block <= self.last_processed {
            if current_block < self.last_processed {
                // No reorg handling: a head behind the cursor is just idle
                warn!(
                    current_block,
                    last_processed = self.last_processed,
                    "chain head is behind cursor, skipping"
                );
            } else {
                debug!(current_block, "no new blocks");
            }
            return None;
        }

        let from = self
            .last_processed
            .max(current_block.saturating_sub(self.lookback_limit));

        Some(ScanWindow {
            from,
            to: current_block,
        })
    }

    /// Record a completed cycle. The cursor never moves backwards.
    pub fn commit(&mut self, block: BlockNumber) {
        if block < self.last_processed {
            warn!(
                block,
                last_processed = self.last_processed,
                "ignoring commit below cursor"
            );
            return;
        }
        self.last_processed = block;
    }
}
