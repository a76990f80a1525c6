use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance of a transfer row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferSource {
    /// The transaction's own value (idx = 0)
    TopLevel,
    /// An internal call frame (idx > 0)
    Trace,
}

impl TransferSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferSource::TopLevel => "tx",
            TransferSource::Trace => "trace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tx" => Some(TransferSource::TopLevel),
            "trace" => Some(TransferSource::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for TransferSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical value movement; primary key is (tx_hash, idx)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub block_number: u64,
    pub tx_hash: String,
    pub idx: u32,
    pub from: String,
    pub to: String,
    pub value: Decimal,
    pub source: TransferSource,
}

impl Transfer {
    pub fn key(&self) -> (&str, u32) {
        (&self.tx_hash, self.idx)
    }
}

/// A transfer together with the UTC day of its block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedTransfer {
    pub day: NaiveDate,
    pub transfer: Transfer,
}
