use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable progress marker of one ingestion stream
///
/// Created on the first committed batch, replaced on every following commit
/// and read back on restart. `last_processed_block` only ever decreases
/// through an explicit reorg truncation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Logical stream name (`backfill`, `live`)
    pub stream_id: String,

    /// Highest height whose batch is fully committed
    pub last_processed_block: u64,

    /// Hash of `last_processed_block`, the anchor for parent-hash checks
    pub last_processed_hash: Option<String>,

    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl SyncState {
    /// Stream id of the historical backfill
    pub const BACKFILL: &'static str = "backfill";
    /// Stream id of the tip follower
    pub const LIVE: &'static str = "live";

    pub fn new(stream_id: &str, last_processed_block: u64, last_processed_hash: Option<String>) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            last_processed_block,
            last_processed_hash,
            updated_at: Utc::now(),
        }
    }

    /// First height that still has to be ingested
    pub fn next_block(&self) -> u64 {
        self.last_processed_block + 1
    }
}
