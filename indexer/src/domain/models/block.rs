use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A block header as stored in the ledger tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height, the canonical ordering key
    pub number: u64,

    /// Block hash
    pub hash: String,

    /// Hash of the parent block, used to verify chain linkage
    pub parent_hash: String,

    /// Block timestamp
    pub timestamp: DateTime<Utc>,
}

impl Block {
    pub fn new(number: u64, hash: String, parent_hash: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            number,
            hash,
            parent_hash,
            timestamp,
        }
    }

    /// UTC calendar day the block belongs to
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Whether `self` directly extends `parent`
    pub fn extends(&self, parent: &Block) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}
