//! Provider factory for creating ledger providers based on configuration

use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::infrastructure::ledger::error::LedgerError;
use crate::infrastructure::ledger::providers::{JsonRpcProvider, LedgerProvider};
use crate::utils::logging;

/// Factory for creating ledger providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create a provider based on the configuration
    pub fn create_provider(config: &LedgerConfig) -> Result<Arc<dyn LedgerProvider>, LedgerError> {
        if config.rpc_url.trim().is_empty() {
            return Err(LedgerError::Config("LEDGER_RPC_URL is empty".to_string()));
        }
        if !config.rpc_url.starts_with("http://") && !config.rpc_url.starts_with("https://") {
            return Err(LedgerError::Config(format!(
                "Unsupported ledger endpoint scheme: {}",
                config.rpc_url
            )));
        }

        let provider = JsonRpcProvider::new(config)?;
        logging::log_ledger_connection_details(&provider.provider_name(), &config.rpc_url);
        Ok(Arc::new(provider))
    }
}
