//! SeaORM Entity for exchange_flows table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "exchange_flows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub time_window: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub asof_date: Date,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub exchange: String,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub net_in: Decimal,
    #[sea_orm(column_type = "Text")]
    pub unlock_proximity: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
