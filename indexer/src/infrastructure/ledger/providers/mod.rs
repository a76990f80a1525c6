//! Ledger provider implementations
//!
//! A provider turns one height into a fully populated [`FetchedBlock`]:
//! header, transactions (with receipt fields when enabled) and the
//! value-carrying internal call frames.

pub mod json_rpc;

pub use json_rpc::JsonRpcProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::models::{Block, Trace, Transaction};
use crate::infrastructure::ledger::error::LedgerError;

/// Everything ingested for one height
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBlock {
    pub block: Block,
    pub transactions: Vec<Transaction>,
    pub traces: Vec<Trace>,
}

/// Trait for ledger providers (JSON-RPC endpoints, scripted test chains)
#[async_trait]
pub trait LedgerProvider: Send + Sync + std::fmt::Debug {
    /// Get the provider name for identification
    fn provider_name(&self) -> String;

    /// Current chain height
    async fn tip_height(&self) -> Result<u64, LedgerError>;

    /// Canonical block hash at `height`
    async fn block_hash(&self, height: u64) -> Result<String, LedgerError>;

    /// Block, transactions and traces at `height`
    async fn fetch_block(&self, height: u64) -> Result<FetchedBlock, LedgerError>;

    /// Timestamp of the block at `height`
    async fn block_timestamp(&self, height: u64) -> Result<DateTime<Utc>, LedgerError> {
        Ok(self.fetch_block(height).await?.block.timestamp)
    }
}
