//! SeaORM Entity for supply_timeseries table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supply_timeseries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub date: Date,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub total_supply: Decimal,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub circulating: Decimal,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub locked: Decimal,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub non_circulating_held: Decimal,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
