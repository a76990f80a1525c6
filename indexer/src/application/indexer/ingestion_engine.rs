//! Checkpointed ingestion: historical backfill and tip-following live mode

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tokio::time;

use crate::application::indexer::batch_builder::BatchBuilder;
use crate::application::indexer::reorg::ReorgHandler;
use crate::config::IngestConfig;
use crate::domain::errors::IngestError;
use crate::domain::models::SyncState;
use crate::infrastructure::ledger::{FetchedBlock, LedgerClient};
use crate::infrastructure::persistence::{DerivedStore, LedgerStore};
use crate::utils::logging;

/// Reorgs repaired back to back before a range is given up
const MAX_CONSECUTIVE_REORGS: u32 = 3;

/// Totals of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub blocks: u64,
    pub transfers: u64,
    pub reorgs: u32,
    /// Checkpoint after the run
    pub last_processed_block: Option<u64>,
}

/// Drives the ledger client and the extractor across block ranges
///
/// Every batch is committed together with its stream's checkpoint, so a
/// restart replays at most the batch that was in flight.
pub struct IngestionEngine {
    client: LedgerClient,
    ledger: Arc<dyn LedgerStore>,
    derived: Arc<dyn DerivedStore>,
    reorg_handler: ReorgHandler,
    config: IngestConfig,
    shutdown: watch::Receiver<bool>,
}

impl IngestionEngine {
    pub fn new(
        client: LedgerClient,
        ledger: Arc<dyn LedgerStore>,
        derived: Arc<dyn DerivedStore>,
        config: IngestConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let reorg_handler = ReorgHandler::new(
            client.clone(),
            ledger.clone(),
            derived.clone(),
            config.max_reorg_depth,
        );
        Self {
            client,
            ledger,
            derived,
            reorg_handler,
            config,
            shutdown,
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Ingests `[start, end]` on the backfill stream
    ///
    /// Batches already fully stored are skipped, so a rerun resumes at the
    /// first missing height, whether that lies above the checkpoint or in an
    /// earlier range ingested after it. `end` defaults to the confirmed tip.
    pub async fn backfill(&self, start: u64, end: Option<u64>) -> Result<IngestSummary, IngestError> {
        let tip = self.client.tip_height().await?;
        let confirmed_tip = tip.saturating_sub(self.config.confirmations);
        let end = match end {
            Some(end) if end > tip => {
                logging::log_warning(&format!(
                    "[backfill] Requested end {} is above the tip {}, clamping",
                    end, tip
                ));
                tip
            }
            Some(end) => end,
            None => confirmed_tip,
        };
        if start > end {
            return Err(IngestError::Config(format!(
                "backfill start {} is after end {}",
                start, end
            )));
        }

        logging::log_info(&format!(
            "[backfill] 🚀 Ingesting {} → {} ({} blocks) from {}",
            start,
            end,
            end - start + 1,
            self.client.provider_name()
        ));
        let summary = self.ingest_range(SyncState::BACKFILL, start, end, true).await?;
        if summary.blocks == 0 {
            logging::log_info(&format!(
                "[backfill] ✅ Range {}..={} already ingested",
                start, end
            ));
        }
        Ok(summary)
    }

    /// Backfill of the blocks produced since `cutoff`
    pub async fn backfill_since(&self, cutoff: DateTime<Utc>) -> Result<IngestSummary, IngestError> {
        let start = self.client.find_height_for_timestamp(cutoff).await?;
        self.backfill(start, None).await
    }

    /// Follows the tip until the shutdown signal fires
    ///
    /// Transient failures are logged and retried on the next cycle; integrity
    /// errors stop the stream.
    pub async fn follow(&self) -> Result<(), IngestError> {
        logging::log_info(&format!(
            "[live] 🚀 Following {} with {} confirmations, polling every {} ms",
            self.client.provider_name(),
            self.config.confirmations,
            self.config.poll_interval_ms
        ));

        loop {
            if self.is_cancelled() {
                break;
            }

            match self.run_live_cycle().await {
                Ok(summary) if summary.blocks > 0 => {
                    logging::log_debug(&format!("[live] cycle ingested {} blocks", summary.blocks));
                }
                Ok(_) => {}
                Err(IngestError::Cancelled) => break,
                Err(e @ IngestError::DataIntegrity(_)) => return Err(e),
                Err(IngestError::BatchFailed { start, end, cause })
                    if matches!(*cause, IngestError::DataIntegrity(_)) =>
                {
                    return Err(IngestError::BatchFailed { start, end, cause });
                }
                Err(e) => {
                    logging::log_error(&format!(
                        "[live] ❌ Cycle failed: {}. Will retry after interval.",
                        e
                    ));
                }
            }

            tokio::select! {
                _ = time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                _ = shutdown_requested(self.shutdown.clone()) => break,
            }
        }

        logging::log_info("[live] 🛑 Shutdown requested, stream stopped");
        Ok(())
    }

    /// One live cycle: verify the anchor, then ingest up to the confirmed tip
    pub async fn run_live_cycle(&self) -> Result<IngestSummary, IngestError> {
        let tip = self.client.tip_height().await?;
        let safe_tip = tip.saturating_sub(self.config.confirmations);

        let checkpoint = self.ledger.get_sync_state(SyncState::LIVE).await?;
        let mut reorgs = 0;
        let start = match checkpoint {
            Some(cp) => {
                // A reorg that replaced already committed blocks shows up as
                // a changed hash at the checkpoint itself, or a shorter chain
                let changed = if cp.last_processed_block > tip {
                    true
                } else {
                    let remote = self.client.block_hash(cp.last_processed_block).await?;
                    cp.last_processed_hash.as_deref().map_or(false, |h| h != remote)
                };
                if changed {
                    logging::log_warning(&format!(
                        "[live] ⚠️ Block {} changed on the remote chain",
                        cp.last_processed_block
                    ));
                    reorgs += 1;
                    match self.reorg_handler.recover(cp.next_block()).await? {
                        Some(outcome) => outcome.consistent_height + 1,
                        None => cp.next_block(),
                    }
                } else {
                    cp.next_block()
                }
            }
            None => match self.ledger.latest_block().await? {
                Some(latest) => latest.number + 1,
                None => self.config.start_block,
            },
        };

        if start > safe_tip {
            logging::log_debug(&format!(
                "[live] ⏳ Up to date at {}, tip {} (safe {})",
                start.saturating_sub(1),
                tip,
                safe_tip
            ));
            return Ok(IngestSummary {
                reorgs,
                last_processed_block: start.checked_sub(1),
                ..IngestSummary::default()
            });
        }

        let mut summary = self.ingest_range(SyncState::LIVE, start, safe_tip, false).await?;
        summary.reorgs += reorgs;
        Ok(summary)
    }

    /// Ingests `[start, end]` in batches on `stream_id`, repairing reorgs on the way
    ///
    /// With `skip_stored`, heights already in the store are not fetched again.
    async fn ingest_range(
        &self,
        stream_id: &str,
        start: u64,
        end: u64,
        skip_stored: bool,
    ) -> Result<IngestSummary, IngestError> {
        let started = Instant::now();
        let batch_size = self.config.batch_size.max(1);
        let mut summary = IngestSummary {
            last_processed_block: self
                .ledger
                .get_sync_state(stream_id)
                .await?
                .map(|cp| cp.last_processed_block),
            ..IngestSummary::default()
        };
        let mut consecutive_reorgs = 0u32;
        let mut next = start;

        while next <= end {
            if self.is_cancelled() {
                return Err(IngestError::Cancelled);
            }

            let mut batch_end = (next + batch_size - 1).min(end);
            if skip_stored {
                match self.missing_run(next, batch_end).await? {
                    None => {
                        logging::log_debug(&format!(
                            "[{}] {}..={} already stored, skipping",
                            stream_id, next, batch_end
                        ));
                        next = batch_end + 1;
                        continue;
                    }
                    Some((first, _)) if first > next => {
                        next = first;
                        continue;
                    }
                    Some((_, last)) => batch_end = last,
                }
            }

            let batch_started = Instant::now();
            match self.ingest_batch(stream_id, next, batch_end).await {
                Ok((transfers, checkpoint)) => {
                    consecutive_reorgs = 0;
                    let blocks = batch_end - next + 1;
                    summary.blocks += blocks;
                    summary.transfers += transfers;
                    summary.last_processed_block = Some(checkpoint);

                    let done = batch_end - start + 1;
                    let total = end - start + 1;
                    let bps = summary.blocks as f64 / started.elapsed().as_secs_f64().max(0.001);
                    logging::log_info(&format!(
                        "[{}] {}..={} | {} blocks {} transfers | {:.1} b/s | batch {}ms | {}/{} ({:.1}%) | elapsed {}",
                        stream_id,
                        next,
                        batch_end,
                        blocks,
                        transfers,
                        bps,
                        batch_started.elapsed().as_millis(),
                        done,
                        total,
                        done as f64 * 100.0 / total as f64,
                        logging::fmt_duration(started.elapsed().as_secs())
                    ));
                    next = batch_end + 1;
                }
                Err(IngestError::ReorgDetected {
                    height,
                    expected,
                    actual,
                }) => {
                    consecutive_reorgs += 1;
                    summary.reorgs += 1;
                    logging::log_warning(&format!(
                        "[{}] ⚠️ Reorg detected at {}: expected parent {}, got {}",
                        stream_id, height, expected, actual
                    ));
                    if consecutive_reorgs > MAX_CONSECUTIVE_REORGS {
                        return Err(IngestError::DataIntegrity(format!(
                            "chain kept reorganizing around height {}",
                            height
                        ))
                        .in_batch(next, batch_end));
                    }
                    if let Some(outcome) = self
                        .reorg_handler
                        .recover(height)
                        .await
                        .map_err(|e| e.in_batch(next, batch_end))?
                    {
                        next = next.min(outcome.consistent_height + 1);
                    }
                }
                Err(e) => {
                    logging::log_error(&format!(
                        "[{}] ❌ Batch {}..={} failed: {}",
                        stream_id, next, batch_end, e
                    ));
                    return Err(e.in_batch(next, batch_end));
                }
            }
        }

        logging::log_info(&format!(
            "[{}] ✓ {} blocks, {} transfers in {}",
            stream_id,
            summary.blocks,
            summary.transfers,
            logging::fmt_duration(started.elapsed().as_secs())
        ));
        Ok(summary)
    }

    /// First run of heights inside `[start, end]` missing from the store
    async fn missing_run(&self, start: u64, end: u64) -> Result<Option<(u64, u64)>, IngestError> {
        let stored: Vec<u64> = self
            .ledger
            .blocks_between(start, end)
            .await?
            .iter()
            .map(|b| b.number)
            .collect();
        let Some(first) = (start..=end).find(|h| stored.binary_search(h).is_err()) else {
            return Ok(None);
        };
        let last = stored
            .iter()
            .find(|h| **h > first)
            .map_or(end, |next_stored| next_stored - 1);
        Ok(Some((first, last)))
    }

    /// Fetches, validates and commits one batch with its checkpoint; returns
    /// the number of transfers written and the checkpoint height
    ///
    /// A checkpoint never moves backwards here: a batch below it, as an
    /// earlier range backfilled later, leaves it in place. Derivation
    /// cursors covering the batch's first day are rewound before the commit.
    async fn ingest_batch(&self, stream_id: &str, start: u64, end: u64) -> Result<(u64, u64), IngestError> {
        let fetched = self.fetch_batch(start, end).await?;

        let anchor = match start.checked_sub(1) {
            Some(parent) => self.ledger.get_block(parent).await?,
            None => None,
        };
        let batch = BatchBuilder::new(start, anchor.as_ref()).build(fetched)?;
        let last = batch
            .blocks
            .last()
            .ok_or_else(|| IngestError::DataIntegrity(format!("empty batch {}..={}", start, end)))?;

        let checkpoint = match self.ledger.get_sync_state(stream_id).await? {
            Some(cp) if cp.last_processed_block > last.number => {
                SyncState::new(stream_id, cp.last_processed_block, cp.last_processed_hash)
            }
            _ => SyncState::new(stream_id, last.number, Some(last.hash.clone())),
        };

        if let Some(before) = batch.blocks.first().and_then(|b| b.day().pred_opt()) {
            self.derived.rewind_cursors(before).await?;
        }
        self.ledger.commit_batch(&batch, &checkpoint).await?;
        Ok((batch.transfers.len() as u64, checkpoint.last_processed_block))
    }

    /// Collects `[start, end]` from the bounded fetch pool, stopping early on shutdown
    async fn fetch_batch(&self, start: u64, end: u64) -> Result<Vec<FetchedBlock>, IngestError> {
        let mut blocks = Vec::with_capacity((end - start + 1) as usize);
        let stream = self.client.fetch_range(start, end);
        let cancelled = shutdown_requested(self.shutdown.clone());
        futures::pin_mut!(stream);
        futures::pin_mut!(cancelled);

        loop {
            tokio::select! {
                item = stream.next() => match item {
                    Some(result) => blocks.push(result?),
                    None => break,
                },
                _ = &mut cancelled => return Err(IngestError::Cancelled),
            }
        }
        Ok(blocks)
    }
}

/// Resolves once shutdown is requested; pends forever when the sender is gone
async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
