use holder_indexer::config::AppConfig;
use holder_indexer::infrastructure::persistence::DbPool;
use holder_indexer::utils::logging;
use migration::{Migrator, MigratorTrait};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();

    let config = AppConfig::from_env();
    let db_pool = DbPool::new(&config).await?;

    logging::log_info("Running database migrations...");
    Migrator::up(db_pool.get_connection(), None).await?;
    logging::log_info("Migrations completed successfully!");

    Ok(())
}
