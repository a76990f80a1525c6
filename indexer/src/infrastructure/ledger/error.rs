use thiserror::Error;

/// JSON-RPC error codes providers use for overload; treated like HTTP 429
pub const OVERLOAD_CODES: [i64; 2] = [-32005, -32603];

/// JSON-RPC code for an unknown method
const METHOD_NOT_FOUND: i64 = -32601;

/// Errors returned by ledger providers
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Timeout, connection reset or 5xx
    #[error("Network error: {0}")]
    Network(String),
    /// HTTP 429 or an overload RPC code
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Any other RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    /// Response does not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),
    /// The endpoint does not implement the method
    #[error("Method not supported: {0}")]
    Unsupported(String),
    /// The endpoint does not serve this height yet
    #[error("Block {0} not available")]
    BlockUnavailable(u64),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Maps a JSON-RPC error object onto the taxonomy
    pub fn from_rpc(method: &str, code: i64, message: String) -> Self {
        let lowered = message.to_lowercase();
        if OVERLOAD_CODES.contains(&code) {
            LedgerError::RateLimited(format!("{}: {}", method, message))
        } else if code == METHOD_NOT_FOUND
            || lowered.contains("not supported")
            || lowered.contains("does not exist")
            || lowered.contains("not available")
        {
            LedgerError::Unsupported(method.to_string())
        } else {
            LedgerError::Rpc { code, message }
        }
    }

    /// Whether the call may succeed when retried
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::Network(_) | LedgerError::RateLimited(_) | LedgerError::BlockUnavailable(_)
        )
    }
}
