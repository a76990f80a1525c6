use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Daily supply split
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyPoint {
    pub date: NaiveDate,
    pub total_supply: Decimal,
    /// Scheduled circulating supply minus non-circulating holdings, never negative
    pub circulating: Decimal,
    /// `total_supply - circulating`
    pub locked: Decimal,
    /// Balance held by non-circulating addresses on `date`
    pub non_circulating_held: Decimal,
}
