//! Scripted ledger and harness shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::watch;

use holder_indexer::application::derivation::DerivationPipeline;
use holder_indexer::application::indexer::IngestionEngine;
use holder_indexer::config::{DerivationConfig, IngestConfig};
use holder_indexer::domain::models::{Block, TokenUnits, Transaction};
use holder_indexer::infrastructure::ledger::{
    FetchedBlock, LedgerClient, LedgerError, LedgerProvider, RetryHandler,
};
use holder_indexer::infrastructure::persistence::{DerivedStore, LedgerStore, MemoryStore};

/// Hours between scripted blocks; four blocks per UTC day
pub const BLOCK_HOURS: i64 = 6;

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn genesis_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap()
}

/// UTC day of the scripted block at `height`
pub fn day_of(height: u64) -> NaiveDate {
    (genesis_time() + Duration::hours(BLOCK_HOURS * height as i64)).date_naive()
}

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<FetchedBlock>,
    /// Bumped on every fork so replacement blocks get fresh hashes
    fork: u32,
}

/// In-memory chain whose blocks carry native-value transfers
#[derive(Debug, Default)]
pub struct ScriptedChain {
    state: Mutex<ChainState>,
    failures: AtomicU32,
}

impl ScriptedChain {
    /// Chain holding only the genesis block
    pub fn new() -> Arc<Self> {
        let chain = Arc::new(Self::default());
        chain.mine_with(&[]);
        chain
    }

    pub fn tip(&self) -> u64 {
        self.state.lock().unwrap().blocks.len() as u64 - 1
    }

    pub fn hash_at(&self, height: u64) -> String {
        self.state.lock().unwrap().blocks[height as usize].block.hash.clone()
    }

    /// Appends `count` blocks without transactions
    pub fn mine(&self, count: u64) {
        for _ in 0..count {
            self.mine_with(&[]);
        }
    }

    /// Mines empty blocks until the tip is `height`
    pub fn mine_to(&self, height: u64) {
        while self.tip() < height {
            self.mine_with(&[]);
        }
    }

    /// Appends one block with a value transfer per `(from, to, value)`
    pub fn mine_with(&self, transfers: &[(&str, &str, i128)]) -> u64 {
        let mut state = self.state.lock().unwrap();
        let number = state.blocks.len() as u64;
        let fork = state.fork;
        let parent_hash = state
            .blocks
            .last()
            .map(|b| b.block.hash.clone())
            .unwrap_or_else(|| format!("0x{:064x}", 0));
        let hash = format!("0x{:056x}{:08x}", number + 1, fork);

        let transactions = transfers
            .iter()
            .enumerate()
            .map(|(i, (from, to, value))| Transaction {
                hash: format!("0x{:048x}{:08x}{:08x}", number, fork, i),
                block_number: number,
                from: from.to_string(),
                to: Some(to.to_string()),
                value: Decimal::from(*value),
                success: Some(true),
                gas_used: Some(21_000),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
                created_contract: None,
            })
            .collect();

        state.blocks.push(FetchedBlock {
            block: Block::new(
                number,
                hash,
                parent_hash,
                genesis_time() + Duration::hours(BLOCK_HOURS * number as i64),
            ),
            transactions,
            traces: Vec::new(),
        });
        number
    }

    /// Drops every block from `height` up; blocks mined afterwards replace
    /// them with different hashes
    pub fn fork_at(&self, height: u64) {
        let mut state = self.state.lock().unwrap();
        state.blocks.truncate(height as usize);
        state.fork += 1;
    }

    /// Makes the next `count` block fetches fail with a network error
    pub fn fail_next_fetches(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn block(&self, height: u64) -> Result<FetchedBlock, LedgerError> {
        self.state
            .lock()
            .unwrap()
            .blocks
            .get(height as usize)
            .cloned()
            .ok_or(LedgerError::BlockUnavailable(height))
    }
}

#[async_trait]
impl LedgerProvider for ScriptedChain {
    fn provider_name(&self) -> String {
        "scripted".to_string()
    }

    async fn tip_height(&self) -> Result<u64, LedgerError> {
        Ok(self.tip())
    }

    async fn block_hash(&self, height: u64) -> Result<String, LedgerError> {
        Ok(self.block(height)?.block.hash)
    }

    async fn fetch_block(&self, height: u64) -> Result<FetchedBlock, LedgerError> {
        let pending = self.failures.load(Ordering::SeqCst);
        if pending > 0 {
            self.failures.store(pending - 1, Ordering::SeqCst);
            return Err(LedgerError::Network(format!("scripted failure at {}", height)));
        }
        self.block(height)
    }
}

pub fn ingest_config(batch_size: u64) -> IngestConfig {
    IngestConfig {
        start_block: 0,
        batch_size,
        confirmations: 0,
        poll_interval_ms: 10,
        max_reorg_depth: 64,
    }
}

/// Derivation settings in whole-unit amounts so scenarios stay readable
pub fn derivation_config() -> DerivationConfig {
    let mut config = DerivationConfig::default();
    config.units = TokenUnits::new(0);
    config.total_supply = Decimal::from(50_000_000);
    config.recompute_partitions = 3;
    config
}

pub struct Harness {
    pub chain: Arc<ScriptedChain>,
    pub store: Arc<MemoryStore>,
    pub shutdown: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Harness {
    pub fn new(chain: Arc<ScriptedChain>) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        Self {
            chain,
            store: Arc::new(MemoryStore::new()),
            shutdown,
            shutdown_rx,
        }
    }

    pub fn ledger(&self) -> Arc<dyn LedgerStore> {
        self.store.clone()
    }

    pub fn derived(&self) -> Arc<dyn DerivedStore> {
        self.store.clone()
    }

    pub fn client(&self) -> LedgerClient {
        LedgerClient::with_settings(self.chain.clone(), 4, RetryHandler::with_config(2, 1))
    }

    pub fn engine(&self, batch_size: u64) -> IngestionEngine {
        self.engine_with(ingest_config(batch_size))
    }

    pub fn engine_with(&self, config: IngestConfig) -> IngestionEngine {
        IngestionEngine::new(
            self.client(),
            self.ledger(),
            self.derived(),
            config,
            self.shutdown_rx.clone(),
        )
    }

    /// Last processed height of `stream_id`
    pub async fn checkpoint(&self, stream_id: &str) -> Option<u64> {
        self.store
            .get_sync_state(stream_id)
            .await
            .unwrap()
            .map(|s| s.last_processed_block)
    }

    pub fn pipeline(&self) -> DerivationPipeline {
        DerivationPipeline::new(self.ledger(), self.derived(), derivation_config())
    }
}
