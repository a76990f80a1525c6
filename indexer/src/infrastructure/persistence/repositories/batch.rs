//! Chunked upserts and date-bounded deletes shared by the repositories

use chrono::NaiveDate;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Select,
};

use crate::domain::models::DateRange;
use crate::infrastructure::persistence::error::DbError;

/// Rows per INSERT statement, keeps bind parameters under the Postgres limit
pub const CHUNK_SIZE: usize = 500;

/// Inserts `rows` in chunks, resolving key conflicts with `on_conflict`;
/// returns the number of rows written
pub async fn upsert_all<C, A>(db: &C, rows: Vec<A>, on_conflict: OnConflict) -> Result<u64, DbError>
where
    C: ConnectionTrait,
    A: ActiveModelTrait + Clone + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    let mut written = 0;
    for chunk in rows.chunks(CHUNK_SIZE) {
        written += <A::Entity as EntityTrait>::insert_many(chunk.to_vec())
            .on_conflict(on_conflict.clone())
            .exec_without_returning(db)
            .await?;
    }
    Ok(written)
}

/// Deletes rows whose `column` is later than `after`, or every row for `None`
pub async fn delete_after<C, E>(db: &C, column: E::Column, after: Option<NaiveDate>) -> Result<u64, DbError>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let mut delete = E::delete_many();
    if let Some(after) = after {
        delete = delete.filter(column.gt(after));
    }
    Ok(delete.exec(db).await?.rows_affected)
}

/// Restricts `select` to `column` values inside `range`
pub fn within<E: EntityTrait>(mut select: Select<E>, column: E::Column, range: DateRange) -> Select<E> {
    if let Some(from) = range.from {
        select = select.filter(column.gte(from));
    }
    if let Some(to) = range.to {
        select = select.filter(column.lte(to));
    }
    select
}

/// Converts a stored BIGINT back to an unsigned height
pub fn to_u64(value: i64, field: &str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::Integrity(format!("negative {}: {}", field, value)))
}

pub fn to_i64(value: u64, field: &str) -> Result<i64, DbError> {
    i64::try_from(value).map_err(|_| DbError::Integrity(format!("{} out of range: {}", field, value)))
}
