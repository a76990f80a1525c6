//! Repository for the ingested ledger: blocks, transactions, traces, transfers

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, Set, Statement, Value,
};

use crate::domain::models::{
    Block, DatedTransfer, DateRange, Trace, Transaction, Transfer, TransferSource,
};
use crate::infrastructure::persistence::entities::{blocks, traces, transactions, transfers};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::{to_i64, to_u64, upsert_all};
use crate::infrastructure::persistence::store::LedgerBatch;

/// Repository for ledger tables
#[derive(Clone)]
pub struct LedgerRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for LedgerRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerRepository").finish_non_exhaustive()
    }
}

#[derive(Debug, FromQueryResult)]
struct DatedTransferRow {
    block_number: i64,
    tx_hash: String,
    idx: i32,
    from_address: String,
    to_address: String,
    value: Decimal,
    source: String,
    day: NaiveDate,
}

impl LedgerRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Upserts every row of `batch` on `db`, normally an open transaction
    pub async fn save_batch_in<C: ConnectionTrait>(db: &C, batch: &LedgerBatch) -> Result<(), DbError> {
        if batch.is_empty() {
            return Ok(());
        }

        let tx_blocks: HashMap<&str, u64> = batch
            .transactions
            .iter()
            .map(|tx| (tx.hash.as_str(), tx.block_number))
            .collect();

        let block_rows = batch
            .blocks
            .iter()
            .map(block_to_active)
            .collect::<Result<Vec<_>, _>>()?;
        upsert_all(
            db,
            block_rows,
            OnConflict::column(blocks::Column::Number)
                .update_columns([
                    blocks::Column::Hash,
                    blocks::Column::ParentHash,
                    blocks::Column::Timestamp,
                ])
                .to_owned(),
        )
        .await?;

        if !batch.transactions.is_empty() {
            let tx_rows = batch
                .transactions
                .iter()
                .map(transaction_to_active)
                .collect::<Result<Vec<_>, _>>()?;
            upsert_all(
                db,
                tx_rows,
                OnConflict::column(transactions::Column::Hash)
                    .update_columns([
                        transactions::Column::BlockNumber,
                        transactions::Column::FromAddress,
                        transactions::Column::ToAddress,
                        transactions::Column::Value,
                        transactions::Column::Success,
                        transactions::Column::GasUsed,
                        transactions::Column::MaxFeePerGas,
                        transactions::Column::MaxPriorityFeePerGas,
                        transactions::Column::CreatedContract,
                    ])
                    .to_owned(),
            )
            .await?;
        }

        if !batch.traces.is_empty() {
            let trace_rows = batch
                .traces
                .iter()
                .map(|trace| {
                    let block_number = tx_blocks.get(trace.tx_hash.as_str()).copied().ok_or_else(|| {
                        DbError::Integrity(format!("trace of tx {} outside its batch", trace.tx_hash))
                    })?;
                    trace_to_active(trace, block_number)
                })
                .collect::<Result<Vec<_>, _>>()?;
            upsert_all(
                db,
                trace_rows,
                OnConflict::columns([traces::Column::TxHash, traces::Column::TraceIndex])
                    .update_columns([
                        traces::Column::BlockNumber,
                        traces::Column::FromAddress,
                        traces::Column::ToAddress,
                        traces::Column::Value,
                        traces::Column::Reverted,
                    ])
                    .to_owned(),
            )
            .await?;
        }

        if !batch.transfers.is_empty() {
            let transfer_rows = batch
                .transfers
                .iter()
                .map(transfer_to_active)
                .collect::<Result<Vec<_>, _>>()?;
            upsert_all(
                db,
                transfer_rows,
                OnConflict::columns([transfers::Column::TxHash, transfers::Column::Idx])
                    .update_columns([
                        transfers::Column::BlockNumber,
                        transfers::Column::FromAddress,
                        transfers::Column::ToAddress,
                        transfers::Column::Value,
                        transfers::Column::Source,
                    ])
                    .to_owned(),
            )
            .await?;
        }

        Ok(())
    }

    /// Deletes every ledger row above `height`; returns the blocks removed
    pub async fn truncate_above_in<C: ConnectionTrait>(db: &C, height: u64) -> Result<u64, DbError> {
        let height = to_i64(height, "height")?;

        transfers::Entity::delete_many()
            .filter(transfers::Column::BlockNumber.gt(height))
            .exec(db)
            .await?;
        traces::Entity::delete_many()
            .filter(traces::Column::BlockNumber.gt(height))
            .exec(db)
            .await?;
        transactions::Entity::delete_many()
            .filter(transactions::Column::BlockNumber.gt(height))
            .exec(db)
            .await?;
        let removed = blocks::Entity::delete_many()
            .filter(blocks::Column::Number.gt(height))
            .exec(db)
            .await?;

        Ok(removed.rows_affected)
    }

    pub async fn get_block(&self, number: u64) -> Result<Option<Block>, DbError> {
        blocks::Entity::find_by_id(to_i64(number, "block number")?)
            .one(&self.conn)
            .await?
            .map(block_from_model)
            .transpose()
    }

    pub async fn latest_block(&self) -> Result<Option<Block>, DbError> {
        blocks::Entity::find()
            .order_by_desc(blocks::Column::Number)
            .one(&self.conn)
            .await?
            .map(block_from_model)
            .transpose()
    }

    /// First stored block whose successor height is missing
    pub async fn contiguous_tip(&self) -> Result<Option<Block>, DbError> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            r#"
            SELECT b.*
            FROM blocks b
            WHERE NOT EXISTS (SELECT 1 FROM blocks n WHERE n.number = b.number + 1)
            ORDER BY b.number
            LIMIT 1
            "#
            .to_string(),
        );
        blocks::Entity::find()
            .from_raw_sql(stmt)
            .one(&self.conn)
            .await?
            .map(block_from_model)
            .transpose()
    }

    pub async fn blocks_between(&self, start: u64, end: u64) -> Result<Vec<Block>, DbError> {
        blocks::Entity::find()
            .filter(blocks::Column::Number.between(to_i64(start, "start")?, to_i64(end, "end")?))
            .order_by_asc(blocks::Column::Number)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(block_from_model)
            .collect()
    }

    pub async fn transactions_between(&self, start: u64, end: u64) -> Result<Vec<Transaction>, DbError> {
        transactions::Entity::find()
            .filter(
                transactions::Column::BlockNumber.between(to_i64(start, "start")?, to_i64(end, "end")?),
            )
            .order_by_asc(transactions::Column::BlockNumber)
            .order_by_asc(transactions::Column::Hash)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(transaction_from_model)
            .collect()
    }

    pub async fn transfers_between(&self, start: u64, end: u64) -> Result<Vec<Transfer>, DbError> {
        transfers::Entity::find()
            .filter(transfers::Column::BlockNumber.between(to_i64(start, "start")?, to_i64(end, "end")?))
            .order_by_asc(transfers::Column::BlockNumber)
            .order_by_asc(transfers::Column::TxHash)
            .order_by_asc(transfers::Column::Idx)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(transfer_from_model)
            .collect()
    }

    /// Transfers joined with their block day
    pub async fn dated_transfers(
        &self,
        range: DateRange,
        address: Option<&str>,
    ) -> Result<Vec<DatedTransfer>, DbError> {
        let mut sql = String::from(
            r#"
            SELECT t.block_number, t.tx_hash, t.idx, t.from_address, t.to_address, t.value, t.source,
                   (b.timestamp AT TIME ZONE 'UTC')::date AS day
            FROM transfers t
            JOIN blocks b ON b.number = t.block_number
            WHERE TRUE
            "#,
        );
        let mut values: Vec<Value> = Vec::new();

        if let Some(from) = range.from {
            values.push(Utc.from_utc_datetime(&from.and_time(NaiveTime::default())).into());
            sql.push_str(&format!(" AND b.timestamp >= ${}", values.len()));
        }
        if let Some(next_day) = range.to.and_then(|to| to.succ_opt()) {
            values.push(Utc.from_utc_datetime(&next_day.and_time(NaiveTime::default())).into());
            sql.push_str(&format!(" AND b.timestamp < ${}", values.len()));
        }
        if let Some(address) = address {
            values.push(address.to_string().into());
            sql.push_str(&format!(
                " AND (t.from_address = ${0} OR t.to_address = ${0})",
                values.len()
            ));
        }
        sql.push_str(" ORDER BY t.block_number, t.tx_hash, t.idx");

        let rows = DatedTransferRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            &sql,
            values,
        ))
        .all(&self.conn)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DatedTransfer {
                    day: row.day,
                    transfer: Transfer {
                        block_number: to_u64(row.block_number, "block_number")?,
                        tx_hash: row.tx_hash,
                        idx: to_index(row.idx)?,
                        from: row.from_address,
                        to: row.to_address,
                        value: row.value,
                        source: parse_source(&row.source)?,
                    },
                })
            })
            .collect()
    }
}

fn to_index(value: i32) -> Result<u32, DbError> {
    u32::try_from(value).map_err(|_| DbError::Integrity(format!("negative index {}", value)))
}

fn parse_source(value: &str) -> Result<TransferSource, DbError> {
    TransferSource::parse(value)
        .ok_or_else(|| DbError::Integrity(format!("unknown transfer source {}", value)))
}

fn block_to_active(block: &Block) -> Result<blocks::ActiveModel, DbError> {
    Ok(blocks::ActiveModel {
        number: Set(to_i64(block.number, "block number")?),
        hash: Set(block.hash.clone()),
        parent_hash: Set(block.parent_hash.clone()),
        timestamp: Set(block.timestamp.into()),
    })
}

fn block_from_model(model: blocks::Model) -> Result<Block, DbError> {
    Ok(Block::new(
        to_u64(model.number, "block number")?,
        model.hash,
        model.parent_hash,
        model.timestamp.with_timezone(&Utc),
    ))
}

fn transaction_to_active(tx: &Transaction) -> Result<transactions::ActiveModel, DbError> {
    Ok(transactions::ActiveModel {
        hash: Set(tx.hash.clone()),
        block_number: Set(to_i64(tx.block_number, "block number")?),
        from_address: Set(tx.from.clone()),
        to_address: Set(tx.to.clone()),
        value: Set(tx.value),
        success: Set(tx.success),
        gas_used: Set(tx.gas_used.map(|g| to_i64(g, "gas_used")).transpose()?),
        max_fee_per_gas: Set(tx.max_fee_per_gas),
        max_priority_fee_per_gas: Set(tx.max_priority_fee_per_gas),
        created_contract: Set(tx.created_contract.clone()),
    })
}

fn transaction_from_model(model: transactions::Model) -> Result<Transaction, DbError> {
    Ok(Transaction {
        hash: model.hash,
        block_number: to_u64(model.block_number, "block number")?,
        from: model.from_address,
        to: model.to_address,
        value: model.value,
        success: model.success,
        gas_used: model.gas_used.map(|g| to_u64(g, "gas_used")).transpose()?,
        max_fee_per_gas: model.max_fee_per_gas,
        max_priority_fee_per_gas: model.max_priority_fee_per_gas,
        created_contract: model.created_contract,
    })
}

fn trace_to_active(trace: &Trace, block_number: u64) -> Result<traces::ActiveModel, DbError> {
    Ok(traces::ActiveModel {
        tx_hash: Set(trace.tx_hash.clone()),
        trace_index: Set(trace.trace_index as i32),
        block_number: Set(to_i64(block_number, "block number")?),
        from_address: Set(trace.from.clone()),
        to_address: Set(trace.to.clone()),
        value: Set(trace.value),
        reverted: Set(trace.reverted),
    })
}

fn transfer_to_active(transfer: &Transfer) -> Result<transfers::ActiveModel, DbError> {
    Ok(transfers::ActiveModel {
        tx_hash: Set(transfer.tx_hash.clone()),
        idx: Set(transfer.idx as i32),
        block_number: Set(to_i64(transfer.block_number, "block number")?),
        from_address: Set(transfer.from.clone()),
        to_address: Set(transfer.to.clone()),
        value: Set(transfer.value),
        source: Set(transfer.source.as_str().to_string()),
    })
}

fn transfer_from_model(model: transfers::Model) -> Result<Transfer, DbError> {
    Ok(Transfer {
        block_number: to_u64(model.block_number, "block number")?,
        tx_hash: model.tx_hash,
        idx: to_index(model.idx)?,
        from: model.from_address,
        to: model.to_address,
        value: model.value,
        source: parse_source(&model.source)?,
    })
}
