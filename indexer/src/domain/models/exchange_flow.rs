use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position of a date relative to the nearest scheduled unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockProximity {
    Pre,
    Post,
    None,
}

impl UnlockProximity {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockProximity::Pre => "pre",
            UnlockProximity::Post => "post",
            UnlockProximity::None => "none",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "pre" => UnlockProximity::Pre,
            "post" => UnlockProximity::Post,
            _ => UnlockProximity::None,
        }
    }
}

/// Net exchange inflow over a trailing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeFlow {
    pub time_window: String,
    pub asof_date: NaiveDate,
    /// Exchange name, or `ALL` for the aggregate
    pub exchange: String,
    pub net_in: Decimal,
    pub unlock_proximity: UnlockProximity,
}

impl ExchangeFlow {
    pub const ALL_EXCHANGES: &'static str = "ALL";
}
