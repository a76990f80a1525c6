use thiserror::Error;

use crate::infrastructure::ledger::LedgerError;
use crate::infrastructure::persistence::error::DbError;

/// Errors raised while ingesting a block range
#[derive(Debug, Error)]
pub enum IngestError {
    /// Timeout or rate limit that outlived the retry budget
    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    /// Malformed or unexpected response; the batch is aborted
    #[error("Non-retryable ledger error: {0}")]
    NonRetryable(String),

    /// Parent hash of `height` does not match the stored predecessor
    #[error("Reorg detected at height {height}: expected parent {expected}, got {actual}")]
    ReorgDetected {
        height: u64,
        expected: String,
        actual: String,
    },

    /// Fetched or stored data violates a ledger invariant
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Batch {start}..={end} failed: {cause}")]
    BatchFailed {
        start: u64,
        end: u64,
        cause: Box<IngestError>,
    },

    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Ingestion cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl IngestError {
    /// Wraps `self` with the height range of the batch it aborted
    pub fn in_batch(self, start: u64, end: u64) -> Self {
        match self {
            IngestError::BatchFailed { .. } | IngestError::Cancelled => self,
            other => IngestError::BatchFailed {
                start,
                end,
                cause: Box::new(other),
            },
        }
    }

    pub fn is_reorg(&self) -> bool {
        match self {
            IngestError::ReorgDetected { .. } => true,
            IngestError::BatchFailed { cause, .. } => cause.is_reorg(),
            _ => false,
        }
    }
}

impl From<LedgerError> for IngestError {
    fn from(error: LedgerError) -> Self {
        if error.is_transient() {
            IngestError::TransientNetwork(error.to_string())
        } else {
            IngestError::NonRetryable(error.to_string())
        }
    }
}

/// Errors raised by the derivation engines; they never touch ingestion checkpoints
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("Store error: {0}")]
    Store(#[from] DbError),

    #[error("Invalid derivation input: {0}")]
    InvalidInput(String),

    /// A blocking recompute worker panicked or was cancelled
    #[error("Derivation worker failed: {0}")]
    Worker(String),
}

impl From<tokio::task::JoinError> for DeriveError {
    fn from(error: tokio::task::JoinError) -> Self {
        DeriveError::Worker(error.to_string())
    }
}

/// Errors raised while loading static inputs (allocation file, seed list)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse allocation file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid static input: {0}")]
    Invalid(String),

    #[error("Store error: {0}")]
    Store(#[from] DbError),
}
