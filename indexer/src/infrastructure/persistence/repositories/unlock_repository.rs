//! Repository for the unlock schedule, manual confirmations and realized unlocks

use std::fmt;

use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set, TransactionTrait};

use crate::domain::models::{
    DateRange, RealizedUnlock, UnlockBasis, UnlockConfirmation, UnlockScheduleEntry,
};
use crate::infrastructure::persistence::entities::{
    realized_unlocks, unlock_confirmations, unlock_schedule,
};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::{delete_after, upsert_all, within};

#[derive(Clone)]
pub struct UnlockRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for UnlockRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockRepository").finish_non_exhaustive()
    }
}

impl UnlockRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Replaces the whole schedule
    pub async fn replace_schedule(&self, entries: &[UnlockScheduleEntry]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, unlock_schedule::Entity>(&txn, unlock_schedule::Column::UnlockDate, None).await?;
        let rows: Vec<unlock_schedule::ActiveModel> = entries
            .iter()
            .map(|e| unlock_schedule::ActiveModel {
                unlock_date: Set(e.unlock_date),
                category: Set(e.category.clone()),
                amount: Set(e.amount),
                basis: Set(e.basis.as_str().to_string()),
            })
            .collect();
        upsert_all(
            &txn,
            rows,
            OnConflict::columns([unlock_schedule::Column::UnlockDate, unlock_schedule::Column::Category])
                .update_columns([unlock_schedule::Column::Amount, unlock_schedule::Column::Basis])
                .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn schedule(&self) -> Result<Vec<UnlockScheduleEntry>, DbError> {
        Ok(unlock_schedule::Entity::find()
            .order_by_asc(unlock_schedule::Column::UnlockDate)
            .order_by_asc(unlock_schedule::Column::Category)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| UnlockScheduleEntry {
                unlock_date: m.unlock_date,
                category: m.category,
                amount: m.amount,
                basis: UnlockBasis::parse(&m.basis),
            })
            .collect())
    }

    pub async fn upsert_confirmations(&self, rows: &[UnlockConfirmation]) -> Result<(), DbError> {
        upsert_all(
            &self.conn,
            rows.iter()
                .map(|r| unlock_confirmations::ActiveModel {
                    tx_hash: Set(r.tx_hash.clone()),
                    source: Set(r.source.clone()),
                })
                .collect(),
            OnConflict::column(unlock_confirmations::Column::TxHash)
                .update_column(unlock_confirmations::Column::Source)
                .to_owned(),
        )
        .await?;
        Ok(())
    }

    pub async fn confirmations(&self) -> Result<Vec<UnlockConfirmation>, DbError> {
        Ok(unlock_confirmations::Entity::find()
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| UnlockConfirmation {
                tx_hash: m.tx_hash,
                source: m.source,
            })
            .collect())
    }

    pub async fn replace_realized(&self, rows: &[RealizedUnlock]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, realized_unlocks::Entity>(&txn, realized_unlocks::Column::UnlockDate, None).await?;
        let models: Vec<realized_unlocks::ActiveModel> = rows
            .iter()
            .map(|r| realized_unlocks::ActiveModel {
                unlock_date: Set(r.unlock_date),
                category: Set(r.category.clone()),
                scheduled_amount: Set(r.scheduled_amount),
                realized_amount: Set(r.realized_amount),
                realized_date: Set(r.realized_date),
                tx_hashes: Set(serde_json::json!(r.tx_hashes)),
                inferred: Set(r.inferred),
            })
            .collect();
        upsert_all(
            &txn,
            models,
            OnConflict::columns([realized_unlocks::Column::UnlockDate, realized_unlocks::Column::Category])
                .update_columns([
                    realized_unlocks::Column::ScheduledAmount,
                    realized_unlocks::Column::RealizedAmount,
                    realized_unlocks::Column::RealizedDate,
                    realized_unlocks::Column::TxHashes,
                    realized_unlocks::Column::Inferred,
                ])
                .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn realized(&self, range: DateRange) -> Result<Vec<RealizedUnlock>, DbError> {
        within(
            realized_unlocks::Entity::find(),
            realized_unlocks::Column::UnlockDate,
            range,
        )
        .order_by_asc(realized_unlocks::Column::UnlockDate)
        .order_by_asc(realized_unlocks::Column::Category)
        .all(&self.conn)
        .await?
        .into_iter()
        .map(|m| {
            let tx_hashes: Vec<String> = serde_json::from_value(m.tx_hashes)
                .map_err(|e| DbError::Integrity(format!("realized_unlocks.tx_hashes: {}", e)))?;
            Ok(RealizedUnlock {
                unlock_date: m.unlock_date,
                category: m.category,
                scheduled_amount: m.scheduled_amount,
                realized_amount: m.realized_amount,
                realized_date: m.realized_date,
                tx_hashes,
                inferred: m.inferred,
            })
        })
        .collect()
    }
}
