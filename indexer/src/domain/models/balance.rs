use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Net flow and running balance of one address on one UTC day
///
/// Rows exist only for days with a non-zero movement; on other days the
/// balance carries forward from the latest earlier row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBalance {
    pub date: NaiveDate,
    pub address: String,
    /// Incoming minus outgoing value on `date`
    pub net_flow: Decimal,
    /// Prefix sum of `net_flow` up to and including `date`
    pub cumulative_balance: Decimal,
}
