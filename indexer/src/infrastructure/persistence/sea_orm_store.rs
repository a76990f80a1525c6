//! PostgreSQL implementation of the storage traits

use async_trait::async_trait;
use chrono::NaiveDate;
use sea_orm::{DatabaseConnection, TransactionTrait};

use crate::domain::models::{
    AddressLabel, Block, ConcentrationPoint, DailyBalance, DatedTransfer, DateRange,
    DerivationComponent, ExchangeFlow, HolderFlag, RealizedUnlock, SupplyPoint, SyncState,
    TopHolder, Transaction, Transfer, UnlockConfirmation, UnlockScheduleEntry,
};
use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::factory::RepositoryFactory;
use crate::infrastructure::persistence::repositories::{
    LedgerRepository, Repositories, SyncStateRepository,
};
use crate::infrastructure::persistence::store::{DerivedStore, LedgerBatch, LedgerStore};

#[derive(Debug, Clone)]
pub struct SeaOrmStore {
    conn: DatabaseConnection,
    repositories: Repositories,
}

impl SeaOrmStore {
    pub fn new(db_pool: &DbPool) -> Self {
        Self {
            conn: db_pool.get_connection().clone(),
            repositories: RepositoryFactory::create_repositories(db_pool),
        }
    }
}

#[async_trait]
impl LedgerStore for SeaOrmStore {
    async fn get_sync_state(&self, stream_id: &str) -> Result<Option<SyncState>, DbError> {
        self.repositories.sync_state.get(stream_id).await
    }

    async fn list_sync_states(&self) -> Result<Vec<SyncState>, DbError> {
        self.repositories.sync_state.list().await
    }

    async fn commit_batch(&self, batch: &LedgerBatch, checkpoint: &SyncState) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        LedgerRepository::save_batch_in(&txn, batch).await?;
        SyncStateRepository::save_in(&txn, checkpoint).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn get_block(&self, number: u64) -> Result<Option<Block>, DbError> {
        self.repositories.ledger.get_block(number).await
    }

    async fn latest_block(&self) -> Result<Option<Block>, DbError> {
        self.repositories.ledger.latest_block().await
    }

    async fn contiguous_tip(&self) -> Result<Option<Block>, DbError> {
        self.repositories.ledger.contiguous_tip().await
    }

    async fn blocks_between(&self, start: u64, end: u64) -> Result<Vec<Block>, DbError> {
        self.repositories.ledger.blocks_between(start, end).await
    }

    async fn transactions_between(&self, start: u64, end: u64) -> Result<Vec<Transaction>, DbError> {
        self.repositories.ledger.transactions_between(start, end).await
    }

    async fn transfers_between(&self, start: u64, end: u64) -> Result<Vec<Transfer>, DbError> {
        self.repositories.ledger.transfers_between(start, end).await
    }

    async fn truncate_above(&self, height: u64, hash: &str) -> Result<u64, DbError> {
        let txn = self.conn.begin().await?;
        let removed = LedgerRepository::truncate_above_in(&txn, height).await?;
        SyncStateRepository::clamp_above_in(&txn, height, hash).await?;
        txn.commit().await?;
        Ok(removed)
    }

    async fn dated_transfers(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DatedTransfer>, DbError> {
        self.repositories.ledger.dated_transfers(range, address).await
    }
}

#[async_trait]
impl DerivedStore for SeaOrmStore {
    async fn upsert_labels(&self, labels: &[AddressLabel]) -> Result<(), DbError> {
        self.repositories.labels.upsert(labels).await
    }

    async fn insert_labels_if_absent(&self, labels: &[AddressLabel]) -> Result<usize, DbError> {
        self.repositories.labels.insert_if_absent(labels).await
    }

    async fn labels(&self) -> Result<Vec<AddressLabel>, DbError> {
        self.repositories.labels.all().await
    }

    async fn replace_unlock_schedule(&self, entries: &[UnlockScheduleEntry]) -> Result<(), DbError> {
        self.repositories.unlocks.replace_schedule(entries).await
    }

    async fn unlock_schedule(&self) -> Result<Vec<UnlockScheduleEntry>, DbError> {
        self.repositories.unlocks.schedule().await
    }

    async fn upsert_unlock_confirmations(&self, rows: &[UnlockConfirmation]) -> Result<(), DbError> {
        self.repositories.unlocks.upsert_confirmations(rows).await
    }

    async fn unlock_confirmations(&self) -> Result<Vec<UnlockConfirmation>, DbError> {
        self.repositories.unlocks.confirmations().await
    }

    async fn get_cursor(&self, component: DerivationComponent) -> Result<Option<NaiveDate>, DbError> {
        self.repositories.cursors.get(component).await
    }

    async fn set_cursor(&self, component: DerivationComponent, date: NaiveDate) -> Result<(), DbError> {
        self.repositories.cursors.set(component, date).await
    }

    async fn clear_cursor(&self, component: DerivationComponent) -> Result<(), DbError> {
        self.repositories.cursors.clear(component).await
    }

    async fn rewind_cursors(&self, date: NaiveDate) -> Result<(), DbError> {
        self.repositories.cursors.rewind(date).await
    }

    async fn replace_daily_balances_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[DailyBalance],
    ) -> Result<(), DbError> {
        self.repositories.balances.replace_after(after, rows).await
    }

    async fn latest_balances(&self, asof: NaiveDate) -> Result<Vec<DailyBalance>, DbError> {
        self.repositories.balances.latest_as_of(asof).await
    }

    async fn daily_balances(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DailyBalance>, DbError> {
        self.repositories.balances.range(range, address).await
    }

    async fn replace_supply_after(&self, after: Option<NaiveDate>, rows: &[SupplyPoint]) -> Result<(), DbError> {
        self.repositories.metrics.replace_supply_after(after, rows).await
    }

    async fn supply(&self, range: DateRange) -> Result<Vec<SupplyPoint>, DbError> {
        self.repositories.metrics.supply(range).await
    }

    async fn replace_concentration_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ConcentrationPoint],
    ) -> Result<(), DbError> {
        self.repositories.metrics.replace_concentration_after(after, rows).await
    }

    async fn concentration(&self, range: DateRange) -> Result<Vec<ConcentrationPoint>, DbError> {
        self.repositories.metrics.concentration(range).await
    }

    async fn replace_top_holders_after(&self, after: Option<NaiveDate>, rows: &[TopHolder]) -> Result<(), DbError> {
        self.repositories.metrics.replace_top_holders_after(after, rows).await
    }

    async fn top_holders(&self, range: DateRange, address: Option<&str>) -> Result<Vec<TopHolder>, DbError> {
        self.repositories.metrics.top_holders(range, address).await
    }

    async fn replace_holder_flags_after(&self, after: Option<NaiveDate>, rows: &[HolderFlag]) -> Result<(), DbError> {
        self.repositories.signals.replace_flags_after(after, rows).await
    }

    async fn holder_flags(&self, range: DateRange, address: Option<&str>) -> Result<Vec<HolderFlag>, DbError> {
        self.repositories.signals.flags(range, address).await
    }

    async fn replace_exchange_flows_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ExchangeFlow],
    ) -> Result<(), DbError> {
        self.repositories.signals.replace_flows_after(after, rows).await
    }

    async fn exchange_flows(&self, range: DateRange) -> Result<Vec<ExchangeFlow>, DbError> {
        self.repositories.signals.flows(range).await
    }

    async fn replace_realized_unlocks(&self, rows: &[RealizedUnlock]) -> Result<(), DbError> {
        self.repositories.unlocks.replace_realized(rows).await
    }

    async fn realized_unlocks(&self, range: DateRange) -> Result<Vec<RealizedUnlock>, DbError> {
        self.repositories.unlocks.realized(range).await
    }
}
