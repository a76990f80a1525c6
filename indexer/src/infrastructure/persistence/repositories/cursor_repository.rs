//! Repository for derivation_cursors

use std::fmt;

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::domain::models::DerivationComponent;
use crate::infrastructure::persistence::entities::derivation_cursors;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::upsert_all;

#[derive(Clone)]
pub struct CursorRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for CursorRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorRepository").finish_non_exhaustive()
    }
}

impl CursorRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, component: DerivationComponent) -> Result<Option<NaiveDate>, DbError> {
        Ok(derivation_cursors::Entity::find_by_id(component.as_str().to_string())
            .one(&self.conn)
            .await?
            .map(|m| m.last_computed_date))
    }

    pub async fn set(&self, component: DerivationComponent, date: NaiveDate) -> Result<(), DbError> {
        let row = derivation_cursors::ActiveModel {
            component: Set(component.as_str().to_string()),
            last_computed_date: Set(date),
            updated_at: Set(Utc::now().into()),
        };
        upsert_all(
            &self.conn,
            vec![row],
            OnConflict::column(derivation_cursors::Column::Component)
                .update_columns([
                    derivation_cursors::Column::LastComputedDate,
                    derivation_cursors::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .await?;
        Ok(())
    }

    pub async fn clear(&self, component: DerivationComponent) -> Result<(), DbError> {
        derivation_cursors::Entity::delete_by_id(component.as_str().to_string())
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    /// Moves every cursor later than `date` back to `date`
    pub async fn rewind(&self, date: NaiveDate) -> Result<(), DbError> {
        derivation_cursors::Entity::update_many()
            .col_expr(derivation_cursors::Column::LastComputedDate, Expr::value(date))
            .col_expr(derivation_cursors::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(derivation_cursors::Column::LastComputedDate.gt(date))
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
