//! Walk-back and truncation after a parent-hash mismatch

use std::sync::Arc;

use chrono::Duration;

use crate::domain::errors::IngestError;
use crate::infrastructure::ledger::LedgerClient;
use crate::infrastructure::persistence::{DerivedStore, LedgerStore};
use crate::utils::logging;

/// Outcome of a repaired reorg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorgOutcome {
    /// Highest height whose stored hash matches the remote chain
    pub consistent_height: u64,
    pub consistent_hash: String,
    /// Stored blocks removed above `consistent_height`
    pub removed_blocks: u64,
}

pub struct ReorgHandler {
    client: LedgerClient,
    ledger: Arc<dyn LedgerStore>,
    derived: Arc<dyn DerivedStore>,
    max_depth: u64,
}

impl ReorgHandler {
    pub fn new(
        client: LedgerClient,
        ledger: Arc<dyn LedgerStore>,
        derived: Arc<dyn DerivedStore>,
        max_depth: u64,
    ) -> Self {
        Self {
            client,
            ledger,
            derived,
            max_depth,
        }
    }

    /// Finds the last stored block below `height` that is still canonical,
    /// rewinds the derivation cursors and truncates everything above it
    ///
    /// Returns `None` when nothing is stored yet.
    pub async fn recover(&self, height: u64) -> Result<Option<ReorgOutcome>, IngestError> {
        let Some(latest) = self.ledger.latest_block().await? else {
            return Ok(None);
        };

        // Stored blocks above the remote tip are orphaned by definition
        let tip = self.client.tip_height().await?;
        let mut current = height.saturating_sub(1).min(latest.number).min(tip);
        let mut depth = 0u64;
        let consistent_hash = loop {
            let remote = self.client.block_hash(current).await?;
            match self.ledger.get_block(current).await? {
                // Below the first ingested height: the remote chain is the anchor
                None => break remote,
                Some(stored) if stored.hash == remote => break remote,
                Some(stored) => {
                    logging::log_debug(&format!(
                        "[reorg] height {} stored {} remote {}",
                        current, stored.hash, remote
                    ));
                }
            }

            depth += 1;
            if depth > self.max_depth || current == 0 {
                return Err(IngestError::DataIntegrity(format!(
                    "reorg below height {} exceeds max depth {}",
                    height, self.max_depth
                )));
            }
            current -= 1;
        };

        // Cursors move before the ledger shrinks so derived rows never outlive their blocks
        if let Some(orphan) = self.ledger.get_block(current + 1).await? {
            let rewind_to = orphan.day() - Duration::days(1);
            self.derived.rewind_cursors(rewind_to).await?;
        }
        let removed_blocks = self.ledger.truncate_above(current, &consistent_hash).await?;

        logging::log_warning(&format!(
            "[reorg] ⚠️ Chain diverged below {}: truncated {} block(s) above {} ({})",
            height, removed_blocks, current, consistent_hash
        ));

        Ok(Some(ReorgOutcome {
            consistent_height: current,
            consistent_hash,
            removed_blocks,
        }))
    }
}
