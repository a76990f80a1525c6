//! SeaORM Entity for traces table (value-carrying internal call frames)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "traces")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub tx_hash: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub trace_index: i32,
    pub block_number: i64,
    #[sea_orm(column_type = "Text")]
    pub from_address: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub to_address: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub value: Decimal,
    pub reverted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
