//! SeaORM Entity for transactions table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false, column_type = "Text")]
    pub hash: String,
    pub block_number: i64,
    #[sea_orm(column_type = "Text")]
    pub from_address: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub to_address: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))")]
    pub value: Decimal,
    pub success: Option<bool>,
    pub gas_used: Option<i64>,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))", nullable)]
    pub max_fee_per_gas: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((38, 0)))", nullable)]
    pub max_priority_fee_per_gas: Option<Decimal>,
    #[sea_orm(column_type = "Text", nullable)]
    pub created_contract: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
