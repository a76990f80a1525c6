//! Repository for daily_balances

use std::fmt;

use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, QueryFilter, QueryOrder, Set,
    Statement, TransactionTrait,
};

use crate::domain::models::{DailyBalance, DateRange};
use crate::infrastructure::persistence::entities::daily_balances;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::{delete_after, upsert_all, within};

#[derive(Clone)]
pub struct BalanceRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for BalanceRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BalanceRepository").finish_non_exhaustive()
    }
}

impl BalanceRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn replace_after(&self, after: Option<NaiveDate>, rows: &[DailyBalance]) -> Result<(), DbError> {
        let txn = self.conn.begin().await?;
        delete_after::<_, daily_balances::Entity>(&txn, daily_balances::Column::Date, after).await?;
        upsert_all(
            &txn,
            rows.iter()
                .map(|r| daily_balances::ActiveModel {
                    date: Set(r.date),
                    address: Set(r.address.clone()),
                    net_flow: Set(r.net_flow),
                    cumulative_balance: Set(r.cumulative_balance),
                })
                .collect(),
            OnConflict::columns([daily_balances::Column::Date, daily_balances::Column::Address])
                .update_columns([
                    daily_balances::Column::NetFlow,
                    daily_balances::Column::CumulativeBalance,
                ])
                .to_owned(),
        )
        .await?;
        txn.commit().await?;
        Ok(())
    }

    /// Latest row per address dated on or before `asof`
    pub async fn latest_as_of(&self, asof: NaiveDate) -> Result<Vec<DailyBalance>, DbError> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT DISTINCT ON (address) date, address, net_flow, cumulative_balance
            FROM daily_balances
            WHERE date <= $1
            ORDER BY address, date DESC
            "#,
            [asof.into()],
        );
        Ok(daily_balances::Entity::find()
            .from_raw_sql(stmt)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(from_model)
            .collect())
    }

    pub async fn range(&self, range: DateRange, address: Option<&str>) -> Result<Vec<DailyBalance>, DbError> {
        let mut select = within(daily_balances::Entity::find(), daily_balances::Column::Date, range);
        if let Some(address) = address {
            select = select.filter(daily_balances::Column::Address.eq(address));
        }
        Ok(select
            .order_by_asc(daily_balances::Column::Date)
            .order_by_asc(daily_balances::Column::Address)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(from_model)
            .collect())
    }
}

fn from_model(model: daily_balances::Model) -> DailyBalance {
    DailyBalance {
        date: model.date,
        address: model.address,
        net_flow: model.net_flow,
        cumulative_balance: model.cumulative_balance,
    }
}
