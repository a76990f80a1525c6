use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HolderFlagKind {
    NeverSold,
    ConsistentSeller,
    Accumulator,
    Redistributor,
}

impl HolderFlagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HolderFlagKind::NeverSold => "NEVER_SOLD",
            HolderFlagKind::ConsistentSeller => "CONSISTENT_SELLER",
            HolderFlagKind::Accumulator => "ACCUMULATOR",
            HolderFlagKind::Redistributor => "REDISTRIBUTOR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NEVER_SOLD" => Some(HolderFlagKind::NeverSold),
            "CONSISTENT_SELLER" => Some(HolderFlagKind::ConsistentSeller),
            "ACCUMULATOR" => Some(HolderFlagKind::Accumulator),
            "REDISTRIBUTOR" => Some(HolderFlagKind::Redistributor),
            _ => None,
        }
    }
}

impl fmt::Display for HolderFlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// Behavioral flag of one address over one window; unique per
/// (asof_date, address, flag, time_window)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderFlag {
    pub asof_date: NaiveDate,
    pub address: String,
    pub flag: HolderFlagKind,
    pub time_window: String,
    pub confidence: Confidence,
    pub rationale: String,
}
