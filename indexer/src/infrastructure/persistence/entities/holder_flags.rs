//! SeaORM Entity for holder_flags table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "holder_flags")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub asof_date: Date,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub address: String,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub flag: String,
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub time_window: String,
    #[sea_orm(column_type = "Text")]
    pub confidence: String,
    #[sea_orm(column_type = "Text")]
    pub rationale: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
