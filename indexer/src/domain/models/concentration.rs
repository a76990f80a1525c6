use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One ranked row of a daily top-holder snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopHolder {
    pub asof_date: NaiveDate,
    /// 1-based rank; ties on balance are ordered by address
    pub rank: u32,
    pub address: String,
    pub balance: Decimal,
}

/// Daily inequality metrics over circulating holders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationPoint {
    pub date: NaiveDate,
    /// Share of the ten largest holders, as a fraction
    pub top10_share: f64,
    /// Share of the fifty largest holders, as a fraction
    pub top50_share: f64,
    /// Herfindahl–Hirschman index over fractional shares
    pub hhi: f64,
    pub gini: f64,
    /// Holders with a positive balance
    pub holder_count: u64,
    /// top10 share or HHI jumped above its trailing average
    pub spike_flag: bool,
}
