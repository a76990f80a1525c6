//! Storage seams of the engines
//!
//! [`LedgerStore`] holds the ingested chain data and the ingestion
//! checkpoints; [`DerivedStore`] holds static inputs, every derived table and
//! the derivation cursors. Both are implemented over PostgreSQL
//! ([`SeaOrmStore`](super::SeaOrmStore)) and in memory
//! ([`MemoryStore`](super::MemoryStore)).

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::models::{
    AddressLabel, Block, ConcentrationPoint, DailyBalance, DatedTransfer, DateRange,
    DerivationComponent, ExchangeFlow, HolderFlag, RealizedUnlock, SupplyPoint, SyncState,
    TopHolder, Trace, Transaction, Transfer, UnlockConfirmation, UnlockScheduleEntry,
};
use crate::infrastructure::persistence::error::DbError;

/// Rows of one ingestion batch, committed together with its checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    pub blocks: Vec<Block>,
    pub transactions: Vec<Transaction>,
    pub traces: Vec<Trace>,
    pub transfers: Vec<Transfer>,
}

impl LedgerBatch {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_sync_state(&self, stream_id: &str) -> Result<Option<SyncState>, DbError>;

    async fn list_sync_states(&self) -> Result<Vec<SyncState>, DbError>;

    /// Upserts every row of `batch` and writes `checkpoint` in one atomic commit
    async fn commit_batch(&self, batch: &LedgerBatch, checkpoint: &SyncState) -> Result<(), DbError>;

    async fn get_block(&self, number: u64) -> Result<Option<Block>, DbError>;

    async fn latest_block(&self) -> Result<Option<Block>, DbError>;

    /// Highest block of the unbroken run of heights starting at the lowest
    /// stored block
    async fn contiguous_tip(&self) -> Result<Option<Block>, DbError>;

    async fn blocks_between(&self, start: u64, end: u64) -> Result<Vec<Block>, DbError>;

    async fn transactions_between(&self, start: u64, end: u64) -> Result<Vec<Transaction>, DbError>;

    /// Transfers of blocks `start..=end`, ordered by (block, tx_hash, idx)
    async fn transfers_between(&self, start: u64, end: u64) -> Result<Vec<Transfer>, DbError>;

    /// Deletes every ledger row above `height` and clamps each checkpoint
    /// above it to (`height`, `hash`), atomically. Returns the blocks removed.
    async fn truncate_above(&self, height: u64, hash: &str) -> Result<u64, DbError>;

    /// Transfers with their UTC day, for days inside `range`, optionally
    /// touching `address`; ordered by (block, tx_hash, idx)
    async fn dated_transfers(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DatedTransfer>, DbError>;
}

#[async_trait]
pub trait DerivedStore: Send + Sync {
    // static inputs

    async fn upsert_labels(&self, labels: &[AddressLabel]) -> Result<(), DbError>;

    /// Inserts labels for addresses that have none yet; returns how many were added
    async fn insert_labels_if_absent(&self, labels: &[AddressLabel]) -> Result<usize, DbError>;

    async fn labels(&self) -> Result<Vec<AddressLabel>, DbError>;

    async fn replace_unlock_schedule(&self, entries: &[UnlockScheduleEntry]) -> Result<(), DbError>;

    async fn unlock_schedule(&self) -> Result<Vec<UnlockScheduleEntry>, DbError>;

    async fn upsert_unlock_confirmations(&self, rows: &[UnlockConfirmation]) -> Result<(), DbError>;

    async fn unlock_confirmations(&self) -> Result<Vec<UnlockConfirmation>, DbError>;

    // cursors

    async fn get_cursor(&self, component: DerivationComponent) -> Result<Option<NaiveDate>, DbError>;

    async fn set_cursor(&self, component: DerivationComponent, date: NaiveDate) -> Result<(), DbError>;

    async fn clear_cursor(&self, component: DerivationComponent) -> Result<(), DbError>;

    /// Moves every cursor later than `date` back to `date`
    async fn rewind_cursors(&self, date: NaiveDate) -> Result<(), DbError>;

    // derived tables; `replace_*_after(after, rows)` deletes rows dated after
    // `after` (all rows for `None`) and upserts `rows`, atomically

    async fn replace_daily_balances_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[DailyBalance],
    ) -> Result<(), DbError>;

    /// Latest row per address dated on or before `asof`
    async fn latest_balances(&self, asof: NaiveDate) -> Result<Vec<DailyBalance>, DbError>;

    async fn daily_balances(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DailyBalance>, DbError>;

    async fn replace_supply_after(&self, after: Option<NaiveDate>, rows: &[SupplyPoint]) -> Result<(), DbError>;

    async fn supply(&self, range: DateRange) -> Result<Vec<SupplyPoint>, DbError>;

    async fn replace_concentration_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ConcentrationPoint],
    ) -> Result<(), DbError>;

    async fn concentration(&self, range: DateRange) -> Result<Vec<ConcentrationPoint>, DbError>;

    async fn replace_top_holders_after(&self, after: Option<NaiveDate>, rows: &[TopHolder]) -> Result<(), DbError>;

    async fn top_holders(&self, range: DateRange, address: Option<&str>) -> Result<Vec<TopHolder>, DbError>;

    async fn replace_holder_flags_after(&self, after: Option<NaiveDate>, rows: &[HolderFlag]) -> Result<(), DbError>;

    async fn holder_flags(&self, range: DateRange, address: Option<&str>) -> Result<Vec<HolderFlag>, DbError>;

    async fn replace_exchange_flows_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ExchangeFlow],
    ) -> Result<(), DbError>;

    async fn exchange_flows(&self, range: DateRange) -> Result<Vec<ExchangeFlow>, DbError>;

    /// Realized unlocks are always rebuilt as a whole
    async fn replace_realized_unlocks(&self, rows: &[RealizedUnlock]) -> Result<(), DbError>;

    async fn realized_unlocks(&self, range: DateRange) -> Result<Vec<RealizedUnlock>, DbError>;
}
