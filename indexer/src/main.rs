use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use holder_indexer::application::derivation::{DerivationPipeline, RecomputeScope};
use holder_indexer::application::indexer::IngestionEngine;
use holder_indexer::application::inputs::StaticInputLoader;
use holder_indexer::config::AppConfig;
use holder_indexer::domain::models::DerivationComponent;
use holder_indexer::infrastructure::ledger::{LedgerClient, ProviderFactory};
use holder_indexer::infrastructure::persistence::{DbPool, DerivedStore, LedgerStore, SeaOrmStore};
use holder_indexer::utils::logging;
use migration::{Migrator, MigratorTrait};

#[derive(Parser)]
#[command(name = "holder-indexer", version, about = "Token holder ledger indexer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a historical block range
    Backfill {
        #[arg(long, conflicts_with = "days")]
        start_block: Option<u64>,
        #[arg(long, conflicts_with = "days")]
        end_block: Option<u64>,
        /// Ingest the blocks of the last N days instead of a height range
        #[arg(long)]
        days: Option<i64>,
        #[arg(long)]
        batch_blocks: Option<u64>,
    },
    /// Follow the chain tip until interrupted
    Stream {
        #[arg(long)]
        confirmations: Option<u64>,
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Also run incremental derivation after every poll interval
        #[arg(long)]
        derive: bool,
    },
    /// Rebuild derived tables
    Recompute {
        /// balances, supply, concentration, flows, flags, unlocks or all
        #[arg(long, default_value = "all")]
        component: String,
        /// all or incremental
        #[arg(long, default_value = "incremental")]
        scope: String,
    },
    /// Load the exchange seed list and add heuristic labels
    SeedLabels {
        #[arg(long)]
        file: Option<String>,
    },
    /// Expand an allocation file into the unlock schedule
    LoadUnlocks {
        #[arg(long)]
        file: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logger();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env();

    let db_pool = DbPool::new(&config).await?;
    Migrator::up(db_pool.get_connection(), None)
        .await
        .context("running migrations")?;
    let store = Arc::new(SeaOrmStore::new(&db_pool));
    let ledger: Arc<dyn LedgerStore> = store.clone();
    let derived: Arc<dyn DerivedStore> = store;

    match cli.command {
        Command::Backfill {
            start_block,
            end_block,
            days,
            batch_blocks,
        } => {
            if let Some(batch) = batch_blocks {
                config.ingest.batch_size = batch.max(1);
            }
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            spawn_ctrl_c(shutdown_tx);
            let engine = ingestion_engine(&config, ledger, derived, shutdown_rx)?;

            let summary = match days {
                Some(days) if days > 0 => {
                    engine
                        .backfill_since(chrono::Utc::now() - chrono::Duration::days(days))
                        .await?
                }
                Some(days) => bail!("--days must be positive, got {}", days),
                None => {
                    engine
                        .backfill(start_block.unwrap_or(config.ingest.start_block), end_block)
                        .await?
                }
            };
            logging::log_info(&format!(
                "[backfill] Done: {} blocks, {} transfers, {} reorgs, checkpoint {:?}",
                summary.blocks, summary.transfers, summary.reorgs, summary.last_processed_block
            ));
        }
        Command::Stream {
            confirmations,
            poll_interval_ms,
            derive,
        } => {
            if let Some(confirmations) = confirmations {
                config.ingest.confirmations = confirmations;
            }
            if let Some(interval) = poll_interval_ms {
                config.ingest.poll_interval_ms = interval;
            }
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            spawn_ctrl_c(shutdown_tx);

            let deriver = derive.then(|| {
                let pipeline = DerivationPipeline::new(
                    ledger.clone(),
                    derived.clone(),
                    config.derivation.clone(),
                );
                tokio::spawn(derive_periodically(
                    pipeline,
                    Duration::from_millis(config.ingest.poll_interval_ms),
                    shutdown_rx.clone(),
                ))
            });

            let engine = ingestion_engine(&config, ledger, derived, shutdown_rx)?;
            let result = engine.follow().await;
            if let Some(handle) = deriver {
                handle.abort();
            }
            result?;
        }
        Command::Recompute { component, scope } => {
            let scope = RecomputeScope::parse(&scope)
                .ok_or_else(|| anyhow!("unknown scope '{}', expected all or incremental", scope))?;
            let components = if component.eq_ignore_ascii_case("all") {
                DerivationComponent::ALL.to_vec()
            } else {
                vec![DerivationComponent::parse(&component)
                    .ok_or_else(|| anyhow!("unknown component '{}'", component))?]
            };

            let pipeline = DerivationPipeline::new(ledger, derived, config.derivation.clone());
            for run in pipeline.run(&components, scope).await? {
                logging::log_info(&format!("[recompute] {}: {} rows", run.component, run.rows));
            }
        }
        Command::SeedLabels { file } => {
            let path = file.unwrap_or_else(|| config.inputs.cex_seed_file.clone());
            let loader = StaticInputLoader::new(ledger, derived, config.derivation.units);
            let summary = loader.seed_labels(&path).await?;
            logging::log_info(&format!(
                "[labels] {}: {} seeded, {} heuristic",
                path, summary.seeded, summary.heuristic
            ));
        }
        Command::LoadUnlocks { file } => {
            let path = file.unwrap_or_else(|| config.inputs.unlocks_file.clone());
            let loader = StaticInputLoader::new(ledger, derived, config.derivation.units);
            let summary = loader.load_unlocks(&path).await?;
            logging::log_info(&format!(
                "[unlocks] {}: {} schedule rows, {} confirmations",
                path, summary.entries, summary.confirmations
            ));
        }
    }

    Ok(())
}

fn ingestion_engine(
    config: &AppConfig,
    ledger: Arc<dyn LedgerStore>,
    derived: Arc<dyn DerivedStore>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<IngestionEngine> {
    let provider = ProviderFactory::create_provider(&config.ledger)?;
    let client = LedgerClient::new(provider, &config.ledger);
    Ok(IngestionEngine::new(
        client,
        ledger,
        derived,
        config.ingest.clone(),
        shutdown,
    ))
}

fn spawn_ctrl_c(shutdown: watch::Sender<bool>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logging::log_info("Shutdown requested, finishing the current batch...");
                let _ = shutdown.send(true);
            }
            Err(e) => logging::log_error(&format!("Failed to listen for Ctrl+C: {}", e)),
        }
    });
}

async fn derive_periodically(
    pipeline: DerivationPipeline,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if let Err(e) = pipeline
            .run(&DerivationComponent::ALL, RecomputeScope::Incremental)
            .await
        {
            logging::log_error(&format!("[derive] Incremental run failed: {}", e));
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
