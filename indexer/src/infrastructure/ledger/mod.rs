pub mod client;
pub mod error;
pub mod provider_factory;
pub mod providers;
pub mod retry_handler;

pub use client::LedgerClient;
pub use error::LedgerError;
pub use provider_factory::ProviderFactory;
pub use providers::{FetchedBlock, LedgerProvider};
pub use retry_handler::RetryHandler;
