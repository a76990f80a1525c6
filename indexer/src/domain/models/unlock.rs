use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockBasis {
    Tge,
    Cliff,
    Linear,
    Mixed,
}

impl UnlockBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockBasis::Tge => "tge",
            UnlockBasis::Cliff => "cliff",
            UnlockBasis::Linear => "linear",
            UnlockBasis::Mixed => "mixed",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "tge" => UnlockBasis::Tge,
            "cliff" => UnlockBasis::Cliff,
            "linear" => UnlockBasis::Linear,
            _ => UnlockBasis::Mixed,
        }
    }

    /// Basis of two schedule rows merged onto the same (date, category)
    pub fn merge(self, other: UnlockBasis) -> UnlockBasis {
        if self == other {
            self
        } else {
            UnlockBasis::Mixed
        }
    }
}

/// Planned unlock of one allocation category, amount in base units
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockScheduleEntry {
    pub unlock_date: NaiveDate,
    pub category: String,
    pub amount: Decimal,
    pub basis: UnlockBasis,
}

/// Transfers matched to a schedule entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedUnlock {
    pub unlock_date: NaiveDate,
    pub category: String,
    pub scheduled_amount: Decimal,
    pub realized_amount: Decimal,
    /// Day of the last matched transfer
    pub realized_date: NaiveDate,
    pub tx_hashes: Vec<String>,
    /// Not cross-confirmed by a manual source
    pub inferred: bool,
}

/// Manual confirmation that a transaction realized a scheduled unlock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConfirmation {
    pub tx_hash: String,
    pub source: String,
}
