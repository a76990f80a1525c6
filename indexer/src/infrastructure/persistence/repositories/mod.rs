pub mod balance_repository;
pub mod batch;
pub mod cursor_repository;
pub mod label_repository;
pub mod ledger_repository;
pub mod metrics_repository;
pub mod signal_repository;
pub mod sync_state_repository;
pub mod unlock_repository;

pub use balance_repository::BalanceRepository;
pub use cursor_repository::CursorRepository;
pub use label_repository::LabelRepository;
pub use ledger_repository::LedgerRepository;
pub use metrics_repository::MetricsRepository;
pub use signal_repository::SignalRepository;
pub use sync_state_repository::SyncStateRepository;
pub use unlock_repository::UnlockRepository;

/// Collection of all repositories
#[derive(Debug, Clone)]
pub struct Repositories {
    /// Blocks, transactions, traces and transfers
    pub ledger: LedgerRepository,
    /// Ingestion checkpoints
    pub sync_state: SyncStateRepository,
    /// Address labels
    pub labels: LabelRepository,
    /// Unlock schedule, confirmations and realized unlocks
    pub unlocks: UnlockRepository,
    /// Daily balances
    pub balances: BalanceRepository,
    /// Supply, concentration and top holders
    pub metrics: MetricsRepository,
    /// Holder flags and exchange flows
    pub signals: SignalRepository,
    /// Derivation cursors
    pub cursors: CursorRepository,
}
