//! Retry handler for ledger calls that may fail temporarily

use std::future::Future;
use tokio::time::{sleep, Duration};

use crate::infrastructure::ledger::error::LedgerError;
use crate::utils::logging;

/// Upper bound of a single backoff sleep
const MAX_DELAY_MS: u64 = 30_000;

/// Errors that know whether another attempt can help
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for LedgerError {
    fn is_transient(&self) -> bool {
        LedgerError::is_transient(self)
    }
}

/// Retries transient failures with exponential backoff; other failures are
/// returned immediately
#[derive(Debug, Clone)]
pub struct RetryHandler {
    max_retries: u32,
    base_delay_ms: u64,
}

impl RetryHandler {
    pub fn new() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
        }
    }

    pub fn with_config(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay_ms,
        }
    }

    /// Execute an operation with retry logic
    pub async fn execute_with_retry<F, Fut, T, E>(&self, operation: F, operation_name: &str) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display + Retryable,
    {
        let mut retry_count = 0;

        loop {
            match operation().await {
                Ok(result) => {
                    if retry_count > 0 {
                        logging::log_info(&format!(
                            "{} succeeded after {} retries",
                            operation_name, retry_count
                        ));
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    retry_count += 1;

                    if retry_count >= self.max_retries {
                        logging::log_error(&format!(
                            "{} failed after {} attempts: {}",
                            operation_name, self.max_retries, e
                        ));
                        return Err(e);
                    }

                    let delay = self.calculate_delay(retry_count);
                    logging::log_warning(&format!(
                        "{} failed (attempt {}/{}): {}. Retrying in {}ms",
                        operation_name, retry_count, self.max_retries, e, delay
                    ));

                    sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    /// Calculate exponential backoff delay
    fn calculate_delay(&self, retry_count: u32) -> u64 {
        let factor = 2_u64.saturating_pow(retry_count.saturating_sub(1));
        self.base_delay_ms.saturating_mul(factor).min(MAX_DELAY_MS)
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let handler = RetryHandler::with_config(5, 1);
        let calls = AtomicU32::new(0);
        let result = handler
            .execute_with_retry(
                || async {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(LedgerError::RateLimited("eth_blockNumber".into()))
                    } else {
                        Ok(7u64)
                    }
                },
                "tip",
            )
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_errors_fail_fast() {
        let handler = RetryHandler::with_config(5, 1);
        let calls = AtomicU32::new(0);
        let result: Result<u64, _> = handler
            .execute_with_retry(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LedgerError::Parse("bad".into()))
                },
                "block",
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let handler = RetryHandler::with_config(3, 1);
        let calls = AtomicU32::new(0);
        let result: Result<u64, _> = handler
            .execute_with_retry(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(LedgerError::Network("timeout".into()))
                },
                "block",
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let handler = RetryHandler::with_config(10, 1000);
        assert_eq!(handler.calculate_delay(1), 1000);
        assert_eq!(handler.calculate_delay(3), 4000);
        assert_eq!(handler.calculate_delay(9), MAX_DELAY_MS);
    }
}
