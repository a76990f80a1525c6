//! Repository for holder_flags and exchange_flows

use std::fmt;

use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};

use crate::domain::models::{
    Confidence, DateRange, ExchangeFlow, HolderFlag, HolderFlagKind, UnlockProximity,
};
use crate::infrastructure::persistence::entities::{exchange_flows, holder_flags};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::{delete_after, upsert_all, within};

#[derive(Clone)]
pub struct SignalRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for SignalRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalRepository").finish_non_exhaustive()
    }
}

impl SignalRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn replace_flags_after(&self, after: Option<NaiveDate>, rows: &[HolderFlag]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, holder_flags::Entity>(&txn, holder_flags::Column::AsofDate, after).await?;
        upsert_all(
            &txn,
            rows.iter()
                .map(|r| holder_flags::ActiveModel {
                    asof_date: Set(r.asof_date),
                    address: Set(r.address.clone()),
                    flag: Set(r.flag.as_str().to_string()),
                    time_window: Set(r.time_window.clone()),
                    confidence: Set(r.confidence.as_str().to_string()),
                    rationale: Set(r.rationale.clone()),
                })
                .collect(),
            OnConflict::columns([
                holder_flags::Column::AsofDate,
                holder_flags::Column::Address,
                holder_flags::Column::Flag,
                holder_flags::Column::TimeWindow,
            ])
            .update_columns([holder_flags::Column::Confidence, holder_flags::Column::Rationale])
            .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn flags(&self, range: DateRange, address: Option<&str>) -> Result<Vec<HolderFlag>, DbError> {
        let mut select = within(holder_flags::Entity::find(), holder_flags::Column::AsofDate, range);
        if let Some(address) = address {
            select = select.filter(holder_flags::Column::Address.eq(address));
        }
        select
            .order_by_asc(holder_flags::Column::AsofDate)
            .order_by_asc(holder_flags::Column::Address)
            .order_by_asc(holder_flags::Column::Flag)
            .order_by_asc(holder_flags::Column::TimeWindow)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| {
                Ok(HolderFlag {
                    flag: HolderFlagKind::parse(&m.flag)
                        .ok_or_else(|| DbError::Integrity(format!("unknown holder flag {}", m.flag)))?,
                    asof_date: m.asof_date,
                    address: m.address,
                    time_window: m.time_window,
                    confidence: Confidence::parse(&m.confidence),
                    rationale: m.rationale,
                })
            })
            .collect()
    }

    pub async fn replace_flows_after(&self, after: Option<NaiveDate>, rows: &[ExchangeFlow]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, exchange_flows::Entity>(&txn, exchange_flows::Column::AsofDate, after).await?;
        upsert_all(
            &txn,
            rows.iter()
                .map(|r| exchange_flows::ActiveModel {
                    time_window: Set(r.time_window.clone()),
                    asof_date: Set(r.asof_date),
                    exchange: Set(r.exchange.clone()),
                    net_in: Set(r.net_in),
                    unlock_proximity: Set(r.unlock_proximity.as_str().to_string()),
                })
                .collect(),
            OnConflict::columns([
                exchange_flows::Column::TimeWindow,
                exchange_flows::Column::AsofDate,
                exchange_flows::Column::Exchange,
            ])
            .update_columns([exchange_flows::Column::NetIn, exchange_flows::Column::UnlockProximity])
            .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn flows(&self, range: DateRange) -> Result<Vec<ExchangeFlow>, DbError> {
        Ok(within(exchange_flows::Entity::find(), exchange_flows::Column::AsofDate, range)
            .order_by_asc(exchange_flows::Column::AsofDate)
            .order_by_asc(exchange_flows::Column::TimeWindow)
            .order_by_asc(exchange_flows::Column::Exchange)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| ExchangeFlow {
                time_window: m.time_window,
                asof_date: m.asof_date,
                exchange: m.exchange,
                net_in: m.net_in,
                unlock_proximity: UnlockProximity::parse(&m.unlock_proximity),
            })
            .collect())
    }
}
