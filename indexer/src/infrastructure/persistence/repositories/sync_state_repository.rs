//! Repository for ingestion checkpoints

use std::fmt;

use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::domain::models::SyncState;
use crate::infrastructure::persistence::entities::sync_state;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::{to_i64, to_u64, upsert_all};

#[derive(Clone)]
pub struct SyncStateRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for SyncStateRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncStateRepository").finish_non_exhaustive()
    }
}

impl SyncStateRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, stream_id: &str) -> Result<Option<SyncState>, DbError> {
        sync_state::Entity::find_by_id(stream_id.to_string())
            .one(&self.conn)
            .await?
            .map(from_model)
            .transpose()
    }

    pub async fn list(&self) -> Result<Vec<SyncState>, DbError> {
        sync_state::Entity::find()
            .order_by_asc(sync_state::Column::StreamId)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(from_model)
            .collect()
    }

    /// Writes `state` on `db`, normally the transaction of the batch it covers
    pub async fn save_in<C: ConnectionTrait>(db: &C, state: &SyncState) -> Result<(), DbError> {
        let row = sync_state::ActiveModel {
            stream_id: Set(state.stream_id.clone()),
            last_processed_block: Set(to_i64(state.last_processed_block, "last_processed_block")?),
            last_processed_hash: Set(state.last_processed_hash.clone()),
            updated_at: Set(state.updated_at.into()),
        };
        upsert_all(
            db,
            vec![row],
            OnConflict::column(sync_state::Column::StreamId)
                .update_columns([
                    sync_state::Column::LastProcessedBlock,
                    sync_state::Column::LastProcessedHash,
                    sync_state::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .await?;
        Ok(())
    }

    /// Moves every checkpoint above `height` back to (`height`, `hash`)
    pub async fn clamp_above_in<C: ConnectionTrait>(db: &C, height: u64, hash: &str) -> Result<u64, DbError> {
        let height = to_i64(height, "height")?;
        let result = sync_state::Entity::update_many()
            .col_expr(sync_state::Column::LastProcessedBlock, Expr::value(height))
            .col_expr(
                sync_state::Column::LastProcessedHash,
                Expr::value(Some(hash.to_string())),
            )
            .col_expr(sync_state::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sync_state::Column::LastProcessedBlock.gt(height))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }
}

fn from_model(model: sync_state::Model) -> Result<SyncState, DbError> {
    Ok(SyncState {
        stream_id: model.stream_id,
        last_processed_block: to_u64(model.last_processed_block, "last_processed_block")?,
        last_processed_hash: model.last_processed_hash,
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}
