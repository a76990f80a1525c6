//! Retrying, concurrency-bounded front of a [`LedgerProvider`]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, Stream, StreamExt};

use crate::config::LedgerConfig;
use crate::infrastructure::ledger::error::LedgerError;
use crate::infrastructure::ledger::providers::{FetchedBlock, LedgerProvider};
use crate::infrastructure::ledger::retry_handler::RetryHandler;
use crate::utils::logging;

#[derive(Debug, Clone)]
pub struct LedgerClient {
    provider: Arc<dyn LedgerProvider>,
    retry_handler: RetryHandler,
    concurrency: usize,
}

impl LedgerClient {
    pub fn new(provider: Arc<dyn LedgerProvider>, config: &LedgerConfig) -> Self {
        Self::with_settings(
            provider,
            config.fetch_concurrency,
            RetryHandler::with_config(config.max_retries, config.retry_base_delay_ms),
        )
    }

    pub fn with_settings(
        provider: Arc<dyn LedgerProvider>,
        concurrency: usize,
        retry_handler: RetryHandler,
    ) -> Self {
        Self {
            provider,
            retry_handler,
            concurrency: concurrency.max(1),
        }
    }

    pub fn provider_name(&self) -> String {
        self.provider.provider_name()
    }

    pub async fn tip_height(&self) -> Result<u64, LedgerError> {
        self.retry_handler
            .execute_with_retry(|| self.provider.tip_height(), "tip_height")
            .await
    }

    pub async fn block_hash(&self, height: u64) -> Result<String, LedgerError> {
        self.retry_handler
            .execute_with_retry(
                || self.provider.block_hash(height),
                &format!("block_hash({})", height),
            )
            .await
    }

    pub async fn fetch_block(&self, height: u64) -> Result<FetchedBlock, LedgerError> {
        self.retry_handler
            .execute_with_retry(
                || self.provider.fetch_block(height),
                &format!("fetch_block({})", height),
            )
            .await
    }

    /// Blocks `start..=end` in height order
    ///
    /// Up to `concurrency` fetches are in flight at once; nothing is requested
    /// until the stream is polled, so a consumer can stop at any height and
    /// restart later from there.
    pub fn fetch_range(
        &self,
        start: u64,
        end: u64,
    ) -> impl Stream<Item = Result<FetchedBlock, LedgerError>> + '_ {
        stream::iter(start..=end)
            .map(move |height| self.fetch_block(height))
            .buffered(self.concurrency)
    }

    /// First height whose block timestamp is at or after `cutoff`
    ///
    /// Returns the tip when every block is older than `cutoff`.
    pub async fn find_height_for_timestamp(&self, cutoff: DateTime<Utc>) -> Result<u64, LedgerError> {
        let tip = self.tip_height().await?;
        let (mut low, mut high) = (0u64, tip);

        while low < high {
            let mid = low + (high - low) / 2;
            let timestamp = self
                .retry_handler
                .execute_with_retry(
                    || self.provider.block_timestamp(mid),
                    &format!("block_timestamp({})", mid),
                )
                .await?;
            if timestamp < cutoff {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        logging::log_info(&format!(
            "First block at or after {} is {} (tip {})",
            cutoff, low, tip
        ));
        Ok(low)
    }
}
