//! Repository for address_labels

use std::fmt;

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, EntityTrait, QueryOrder, Set};

use crate::domain::models::AddressLabel;
use crate::infrastructure::persistence::entities::address_labels;
use crate::infrastructure::persistence::error::DbError;
use crate::infrastructure::persistence::repositories::batch::upsert_all;

#[derive(Clone)]
pub struct LabelRepository {
    conn: DatabaseConnection,
}

impl fmt::Debug for LabelRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelRepository").finish_non_exhaustive()
    }
}

impl LabelRepository {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn upsert(&self, labels: &[AddressLabel]) -> Result<(), DbError> {
        if labels.is_empty() {
            return Ok(());
        }
        upsert_all(
            &self.conn,
            labels.iter().map(to_active).collect(),
            OnConflict::column(address_labels::Column::Address)
                .update_columns([
                    address_labels::Column::Label,
                    address_labels::Column::Category,
                    address_labels::Column::Confidence,
                    address_labels::Column::Rationale,
                    address_labels::Column::Source,
                    address_labels::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .await?;
        Ok(())
    }

    /// Inserts labels for unlabeled addresses only
    pub async fn insert_if_absent(&self, labels: &[AddressLabel]) -> Result<usize, DbError> {
        if labels.is_empty() {
            return Ok(0);
        }
        let written = upsert_all(
            &self.conn,
            labels.iter().map(to_active).collect(),
            OnConflict::column(address_labels::Column::Address)
                .do_nothing()
                .to_owned(),
        )
        .await?;
        Ok(written as usize)
    }

    pub async fn all(&self) -> Result<Vec<AddressLabel>, DbError> {
        Ok(address_labels::Entity::find()
            .order_by_asc(address_labels::Column::Address)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(|m| AddressLabel {
                address: m.address,
                label: m.label,
                category: m.category,
                confidence: m.confidence,
                rationale: m.rationale,
                source: m.source,
            })
            .collect())
    }
}

fn to_active(label: &AddressLabel) -> address_labels::ActiveModel {
    address_labels::ActiveModel {
        address: Set(label.address.clone()),
        label: Set(label.label.clone()),
        category: Set(label.category.clone()),
        confidence: Set(label.confidence.clone()),
        rationale: Set(label.rationale.clone()),
        source: Set(label.source.clone()),
        updated_at: Set(Utc::now().into()),
    }
}
