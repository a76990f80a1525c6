//! SeaORM Entity for unlock_schedule table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "unlock_schedule")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub unlock_date: Date,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub amount: Decimal,
    #[sea_orm(column_type = "Text")]
    pub basis: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
