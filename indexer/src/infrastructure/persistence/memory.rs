//! In-memory implementation of the storage traits, used by tests and dry runs

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::domain::models::{
    AddressLabel, Block, ConcentrationPoint, DailyBalance, DatedTransfer, DateRange,
    DerivationComponent, ExchangeFlow, HolderFlag, HolderFlagKind, RealizedUnlock, SupplyPoint,
    SyncState, TopHolder, Trace, Transaction, Transfer, UnlockConfirmation, UnlockScheduleEntry,
};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::store::{DerivedStore, LedgerBatch, LedgerStore};

type FlagKey = (NaiveDate, String, HolderFlagKind, String);

#[derive(Debug, Default)]
struct Tables {
    blocks: BTreeMap<u64, Block>,
    transactions: BTreeMap<String, Transaction>,
    traces: BTreeMap<(String, u32), (u64, Trace)>,
    transfers: BTreeMap<(String, u32), Transfer>,
    sync_states: BTreeMap<String, SyncState>,
    labels: BTreeMap<String, AddressLabel>,
    schedule: BTreeMap<(NaiveDate, String), UnlockScheduleEntry>,
    confirmations: BTreeMap<String, UnlockConfirmation>,
    cursors: BTreeMap<DerivationComponent, NaiveDate>,
    balances: BTreeMap<(NaiveDate, String), DailyBalance>,
    supply: BTreeMap<NaiveDate, SupplyPoint>,
    concentration: BTreeMap<NaiveDate, ConcentrationPoint>,
    top_holders: BTreeMap<(NaiveDate, u32), TopHolder>,
    flags: BTreeMap<FlagKey, HolderFlag>,
    flows: BTreeMap<(NaiveDate, String, String), ExchangeFlow>,
    realized: BTreeMap<(NaiveDate, String), RealizedUnlock>,
}

/// Store backed by ordered maps behind one lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `commit_batch` fail without writing anything
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

fn replace_after<K, V>(
    map: &mut BTreeMap<K, V>,
    after: Option<NaiveDate>,
    date_of: impl Fn(&K) -> NaiveDate,
    rows: impl IntoIterator<Item = (K, V)>,
) where
    K: Ord,
{
    match after {
        Some(after) => map.retain(|k, _| date_of(k) <= after),
        None => map.clear(),
    }
    map.extend(rows);
}

fn touches(address: Option<&str>, candidate: &str) -> bool {
    address.map_or(true, |a| a == candidate)
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_sync_state(&self, stream_id: &str) -> Result<Option<SyncState>, DbError> {
        Ok(self.tables.read().await.sync_states.get(stream_id).cloned())
    }

    async fn list_sync_states(&self) -> Result<Vec<SyncState>, DbError> {
        Ok(self.tables.read().await.sync_states.values().cloned().collect())
    }

    async fn commit_batch(&self, batch: &LedgerBatch, checkpoint: &SyncState) -> Result<(), DbError> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(DbError::Query("injected commit failure".to_string()));
        }

        let mut tables = self.tables.write().await;
        let trace_blocks = batch
            .traces
            .iter()
            .map(|trace| {
                batch
                    .transactions
                    .iter()
                    .find(|tx| tx.hash == trace.tx_hash)
                    .or_else(|| tables.transactions.get(&trace.tx_hash))
                    .map(|tx| tx.block_number)
                    .ok_or_else(|| DbError::Integrity(format!("trace of unknown tx {}", trace.tx_hash)))
            })
            .collect::<Result<Vec<u64>, DbError>>()?;

        for block in &batch.blocks {
            tables.blocks.insert(block.number, block.clone());
        }
        for tx in &batch.transactions {
            tables.transactions.insert(tx.hash.clone(), tx.clone());
        }
        for (trace, block_number) in batch.traces.iter().zip(trace_blocks) {
            tables.traces.insert(
                (trace.tx_hash.clone(), trace.trace_index),
                (block_number, trace.clone()),
            );
        }
        for transfer in &batch.transfers {
            tables
                .transfers
                .insert((transfer.tx_hash.clone(), transfer.idx), transfer.clone());
        }
        tables
            .sync_states
            .insert(checkpoint.stream_id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn get_block(&self, number: u64) -> Result<Option<Block>, DbError> {
        Ok(self.tables.read().await.blocks.get(&number).cloned())
    }

    async fn latest_block(&self) -> Result<Option<Block>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .blocks
            .values()
            .next_back()
            .cloned())
    }

    async fn contiguous_tip(&self) -> Result<Option<Block>, DbError> {
        let tables = self.tables.read().await;
        let mut tip: Option<&Block> = None;
        for (number, block) in &tables.blocks {
            if tip.map_or(false, |t| t.number + 1 != *number) {
                break;
            }
            tip = Some(block);
        }
        Ok(tip.cloned())
    }

    async fn blocks_between(&self, start: u64, end: u64) -> Result<Vec<Block>, DbError> {
        if start > end {
            return Ok(Vec::new());
        }
        Ok(self
            .tables
            .read()
            .await
            .blocks
            .range(start..=end)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn transactions_between(&self, start: u64, end: u64) -> Result<Vec<Transaction>, DbError> {
        let tables = self.tables.read().await;
        let mut txs: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|tx| tx.block_number >= start && tx.block_number <= end)
            .cloned()
            .collect();
        txs.sort_by(|a, b| (a.block_number, &a.hash).cmp(&(b.block_number, &b.hash)));
        Ok(txs)
    }

    async fn transfers_between(&self, start: u64, end: u64) -> Result<Vec<Transfer>, DbError> {
        let tables = self.tables.read().await;
        let mut transfers: Vec<Transfer> = tables
            .transfers
            .values()
            .filter(|t| t.block_number >= start && t.block_number <= end)
            .cloned()
            .collect();
        transfers.sort_by(|a, b| (a.block_number, &a.tx_hash, a.idx).cmp(&(b.block_number, &b.tx_hash, b.idx)));
        Ok(transfers)
    }

    async fn truncate_above(&self, height: u64, hash: &str) -> Result<u64, DbError> {
        let mut tables = self.tables.write().await;
        let before = tables.blocks.len();
        tables.blocks.retain(|number, _| *number <= height);
        let removed = (before - tables.blocks.len()) as u64;
        tables.transactions.retain(|_, tx| tx.block_number <= height);
        tables.traces.retain(|_, (block, _)| *block <= height);
        tables.transfers.retain(|_, t| t.block_number <= height);
        for state in tables.sync_states.values_mut() {
            if state.last_processed_block > height {
                state.last_processed_block = height;
                state.last_processed_hash = Some(hash.to_string());
                state.updated_at = Utc::now();
            }
        }
        Ok(removed)
    }

    async fn dated_transfers(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DatedTransfer>, DbError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<DatedTransfer> = tables
            .transfers
            .values()
            .filter(|t| touches(address, &t.from) || touches(address, &t.to))
            .filter_map(|t| {
                let day = tables.blocks.get(&t.block_number)?.day();
                range.contains(day).then(|| DatedTransfer {
                    day,
                    transfer: t.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            (a.transfer.block_number, &a.transfer.tx_hash, a.transfer.idx).cmp(&(
                b.transfer.block_number,
                &b.transfer.tx_hash,
                b.transfer.idx,
            ))
        });
        Ok(rows)
    }
}

#[async_trait]
impl DerivedStore for MemoryStore {
    async fn upsert_labels(&self, labels: &[AddressLabel]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        for label in labels {
            tables.labels.insert(label.address.clone(), label.clone());
        }
        Ok(())
    }

    async fn insert_labels_if_absent(&self, labels: &[AddressLabel]) -> Result<usize, DbError> {
        let mut tables = self.tables.write().await;
        let mut inserted = 0;
        for label in labels {
            if !tables.labels.contains_key(&label.address) {
                tables.labels.insert(label.address.clone(), label.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn labels(&self) -> Result<Vec<AddressLabel>, DbError> {
        Ok(self.tables.read().await.labels.values().cloned().collect())
    }

    async fn replace_unlock_schedule(&self, entries: &[UnlockScheduleEntry]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.schedule = entries
            .iter()
            .map(|e| ((e.unlock_date, e.category.clone()), e.clone()))
            .collect();
        Ok(())
    }

    async fn unlock_schedule(&self) -> Result<Vec<UnlockScheduleEntry>, DbError> {
        Ok(self.tables.read().await.schedule.values().cloned().collect())
    }

    async fn upsert_unlock_confirmations(&self, rows: &[UnlockConfirmation]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        for row in rows {
            tables.confirmations.insert(row.tx_hash.clone(), row.clone());
        }
        Ok(())
    }

    async fn unlock_confirmations(&self) -> Result<Vec<UnlockConfirmation>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .confirmations
            .values()
            .cloned()
            .collect())
    }

    async fn get_cursor(&self, component: DerivationComponent) -> Result<Option<NaiveDate>, DbError> {
        Ok(self.tables.read().await.cursors.get(&component).copied())
    }

    async fn set_cursor(&self, component: DerivationComponent, date: NaiveDate) -> Result<(), DbError> {
        self.tables.write().await.cursors.insert(component, date);
        Ok(())
    }

    async fn clear_cursor(&self, component: DerivationComponent) -> Result<(), DbError> {
        self.tables.write().await.cursors.remove(&component);
        Ok(())
    }

    async fn rewind_cursors(&self, date: NaiveDate) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        for cursor in tables.cursors.values_mut() {
            if *cursor > date {
                *cursor = date;
            }
        }
        Ok(())
    }

    async fn replace_daily_balances_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[DailyBalance],
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        replace_after(
            &mut tables.balances,
            after,
            |k| k.0,
            rows.iter().map(|r| ((r.date, r.address.clone()), r.clone())),
        );
        Ok(())
    }

    async fn latest_balances(&self, asof: NaiveDate) -> Result<Vec<DailyBalance>, DbError> {
        let tables = self.tables.read().await;
        let mut latest: BTreeMap<&str, &DailyBalance> = BTreeMap::new();
        for ((date, address), row) in tables.balances.iter() {
            if *date <= asof {
                // rows iterate in date order, so later days overwrite earlier ones
                latest.insert(address.as_str(), row);
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn daily_balances(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DailyBalance>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .balances
            .values()
            .filter(|r| range.contains(r.date) && touches(address, &r.address))
            .cloned()
            .collect())
    }

    async fn replace_supply_after(&self, after: Option<NaiveDate>, rows: &[SupplyPoint]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        replace_after(
            &mut tables.supply,
            after,
            |k| *k,
            rows.iter().map(|r| (r.date, r.clone())),
        );
        Ok(())
    }

    async fn supply(&self, range: DateRange) -> Result<Vec<SupplyPoint>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .supply
            .values()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect())
    }

    async fn replace_concentration_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ConcentrationPoint],
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        replace_after(
            &mut tables.concentration,
            after,
            |k| *k,
            rows.iter().map(|r| (r.date, r.clone())),
        );
        Ok(())
    }

    async fn concentration(&self, range: DateRange) -> Result<Vec<ConcentrationPoint>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .concentration
            .values()
            .filter(|r| range.contains(r.date))
            .cloned()
            .collect())
    }

    async fn replace_top_holders_after(&self, after: Option<NaiveDate>, rows: &[TopHolder]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        replace_after(
            &mut tables.top_holders,
            after,
            |k| k.0,
            rows.iter().map(|r| ((r.asof_date, r.rank), r.clone())),
        );
        Ok(())
    }

    async fn top_holders(&self, range: DateRange, address: Option<&str>) -> Result<Vec<TopHolder>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .top_holders
            .values()
            .filter(|r| range.contains(r.asof_date) && touches(address, &r.address))
            .cloned()
            .collect())
    }

    async fn replace_holder_flags_after(&self, after: Option<NaiveDate>, rows: &[HolderFlag]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        replace_after(
            &mut tables.flags,
            after,
            |k| k.0,
            rows.iter().map(|r| {
                (
                    (r.asof_date, r.address.clone(), r.flag, r.time_window.clone()),
                    r.clone(),
                )
            }),
        );
        Ok(())
    }

    async fn holder_flags(&self, range: DateRange, address: Option<&str>) -> Result<Vec<HolderFlag>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .flags
            .values()
            .filter(|r| range.contains(r.asof_date) && touches(address, &r.address))
            .cloned()
            .collect())
    }

    async fn replace_exchange_flows_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ExchangeFlow],
    ) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        replace_after(
            &mut tables.flows,
            after,
            |k| k.0,
            rows.iter().map(|r| {
                (
                    (r.asof_date, r.time_window.clone(), r.exchange.clone()),
                    r.clone(),
                )
            }),
        );
        Ok(())
    }

    async fn exchange_flows(&self, range: DateRange) -> Result<Vec<ExchangeFlow>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .flows
            .values()
            .filter(|r| range.contains(r.asof_date))
            .cloned()
            .collect())
    }

    async fn replace_realized_unlocks(&self, rows: &[RealizedUnlock]) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        tables.realized = rows
            .iter()
            .map(|r| ((r.unlock_date, r.category.clone()), r.clone()))
            .collect();
        Ok(())
    }

    async fn realized_unlocks(&self, range: DateRange) -> Result<Vec<RealizedUnlock>, DbError> {
        Ok(self
            .tables
            .read()
            .await
            .realized
            .values()
            .filter(|r| range.contains(r.unlock_date))
            .cloned()
            .collect())
    }
}
