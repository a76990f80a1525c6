//! Repository for the daily metric tables: supply, concentration, top holders

use std::fmt;

use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait};

use crate::domain::models::{ConcentrationPoint, DateRange, SupplyPoint, TopHolder};
use crate::infrastructure::persistence::entities::{
    concentration_timeseries, supply_timeseries, top_holders_snapshot,
};
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::{delete_after, to_i64, to_u64, upsert_all, within};

#[derive(Clone)]
pub struct MetricsRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for MetricsRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRepository").finish_non_exhaustive()
    }
}

impl MetricsRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn replace_supply_after(&self, after: Option<NaiveDate>, rows: &[SupplyPoint]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, supply_timeseries::Entity>(&txn, supply_timeseries::Column::Date, after).await?;
        upsert_all(
            &txn,
            rows.iter()
                .map(|r| supply_timeseries::ActiveModel {
                    date: Set(r.date),
                    total_supply: Set(r.total_supply),
                    circulating: Set(r.circulating),
                    locked: Set(r.locked),
                    non_circulating_held: Set(r.non_circulating_held),
                })
                .collect(),
            OnConflict::column(supply_timeseries::Column::Date)
                .update_columns([
                    supply_timeseries::Column::TotalSupply,
                    supply_timeseries::Column::Circulating,
                    supply_timeseries::Column::Locked,
                    supply_timeseries::Column::NonCirculatingHeld,
                ])
                .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn supply(&self, range: DateRange) -> Result<Vec<SupplyPoint>, DbError> {
        Ok(within(supply_timeseries::Entity::find(), supply_timeseries::Column::Date, range)
            .order_by_asc(supply_timeseries::Column::Date)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| SupplyPoint {
                date: m.date,
                total_supply: m.total_supply,
                circulating: m.circulating,
                locked: m.locked,
                non_circulating_held: m.non_circulating_held,
            })
            .collect())
    }

    pub async fn replace_concentration_after(
        &self,
        after: Option<NaiveDate>,
        rows: &[ConcentrationPoint],
    ) -> Result<(), DbError> {
        let models = rows
            .iter()
            .map(|r| {
                Ok(concentration_timeseries::ActiveModel {
                    date: Set(r.date),
                    top10_share: Set(r.top10_share),
                    top50_share: Set(r.top50_share),
                    hhi: Set(r.hhi),
                    gini: Set(r.gini),
                    holder_count: Set(to_i64(r.holder_count, "holder_count")?),
                    spike_flag: Set(r.spike_flag),
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let txn = self.conn.begin().await?;
        delete_after::<_, concentration_timeseries::Entity>(&txn, concentration_timeseries::Column::Date, after)
            .await?;
        upsert_all(
            &txn,
            models,
            OnConflict::column(concentration_timeseries::Column::Date)
                .update_columns([
                    concentration_timeseries::Column::Top10Share,
                    concentration_timeseries::Column::Top50Share,
                    concentration_timeseries::Column::Hhi,
                    concentration_timeseries::Column::Gini,
                    concentration_timeseries::Column::HolderCount,
                    concentration_timeseries::Column::SpikeFlag,
                ])
                .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn concentration(&self, range: DateRange) -> Result<Vec<ConcentrationPoint>, DbError> {
        within(
            concentration_timeseries::Entity::find(),
            concentration_timeseries::Column::Date,
            range,
        )
        .order_by_asc(concentration_timeseries::Column::Date)
        .all(&self.conn)
        .await?
        .into_iter()
        .map(|m| {
            Ok(ConcentrationPoint {
                date: m.date,
                top10_share: m.top10_share,
                top50_share: m.top50_share,
                hhi: m.hhi,
                gini: m.gini,
                holder_count: to_u64(m.holder_count, "holder_count")?,
                spike_flag: m.spike_flag,
            })
        })
        .collect()
    }

    pub async fn replace_top_holders_after(&self, after: Option<NaiveDate>, rows: &[TopHolder]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, top_holders_snapshot::Entity>(&txn, top_holders_snapshot::Column::AsofDate, after)
            .await?;
        upsert_all(
            &txn,
            rows.iter()
                .map(|r| top_holders_snapshot::ActiveModel {
                    asof_date: Set(r.asof_date),
                    rank: Set(r.rank as i32),
                    address: Set(r.address.clone()),
                    balance: Set(r.balance),
                })
                .collect(),
            OnConflict::columns([
                top_holders_snapshot::Column::AsofDate,
                top_holders_snapshot::Column::Rank,
            ])
            .update_columns([
                top_holders_snapshot::Column::Address,
                top_holders_snapshot::Column::Balance,
            ])
            .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    pub async fn top_holders(&self, range: DateRange, address: Option<&str>) -> Result<Vec<TopHolder>, DbError> {
        let mut select = within(
            top_holders_snapshot::Entity::find(),
            top_holders_snapshot::Column::AsofDate,
            range,
        );
        if let Some(address) = address {
            select = select.filter(top_holders_snapshot::Column::Address.eq(address));
        }
        select
            .order_by_asc(top_holders_snapshot::Column::AsofDate)
            .order_by_asc(top_holders_snapshot::Column::Rank)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| {
                Ok(TopHolder {
                    asof_date: m.asof_date,
                    rank: u32::try_from(m.rank)
                        .map_err(|_| DbError::Integrity(format!("negative rank {}", m.rank)))?,
                    address: m.address,
                    balance: m.balance,
                })
            })
            .collect()
    }
}
