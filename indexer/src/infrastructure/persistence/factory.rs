use sea_orm::DatabaseConnection;

use crate::infrastructure::persistence::connection::DbPool;
use crate::infrastructure::persistence::repositories::{
    BalanceRepository, CursorRepository, LabelRepository, LedgerRepository, MetricsRepository,
    Repositories, SignalRepository, SyncStateRepository, UnlockRepository,
};

/// Factory for creating repositories
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create all repositories
    pub fn create_repositories(db_pool: &DbPool) -> Repositories {
        Self::create_repositories_for(db_pool.get_connection().clone())
    }

    /// Create all repositories over an existing connection
    pub fn create_repositories_for(conn: DatabaseConnection) -> Repositories {
        Repositories {
            ledger: LedgerRepository::new(conn.clone()),
            sync_state: SyncStateRepository::new(conn.clone()),
            labels: LabelRepository::new(conn.clone()),
            unlocks: UnlockRepository::new(conn.clone()),
            balances: BalanceRepository::new(conn.clone()),
            metrics: MetricsRepository::new(conn.clone()),
            signals: SignalRepository::new(conn.clone()),
            cursors: CursorRepository::new(conn),
        }
    }
}
