//! Loaders for the static inputs: exchange seed list, heuristic labels and
//! the unlock schedule

use std::path::Path;
use std::sync::Arc;

use crate::domain::errors::ConfigError;
use crate::domain::models::TokenUnits;
use crate::domain::services::labels::{fan_heuristics, parse_seed_list};
use crate::domain::services::{AllocationFile, UnlockScheduleGenerator};
use crate::infrastructure::persistence::{DerivedStore, LedgerStore};
use crate::utils::logging;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelSeedSummary {
    /// Seed-list rows upserted
    pub seeded: usize,
    /// Heuristic labels added for unlabeled addresses
    pub heuristic: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnlockLoadSummary {
    pub entries: usize,
    pub confirmations: usize,
}

pub struct StaticInputLoader {
    ledger: Arc<dyn LedgerStore>,
    derived: Arc<dyn DerivedStore>,
    units: TokenUnits,
}

impl StaticInputLoader {
    pub fn new(ledger: Arc<dyn LedgerStore>, derived: Arc<dyn DerivedStore>, units: TokenUnits) -> Self {
        Self {
            ledger,
            derived,
            units,
        }
    }

    /// Upserts the seed list, then labels fan-in / fan-out addresses that have
    /// no label yet
    pub async fn seed_labels(&self, path: impl AsRef<Path>) -> Result<LabelSeedSummary, ConfigError> {
        let raw = read_input(path.as_ref())?;
        self.seed_labels_from(&raw).await
    }

    pub async fn seed_labels_from(&self, raw: &str) -> Result<LabelSeedSummary, ConfigError> {
        let seeded = parse_seed_list(raw)?;
        self.derived.upsert_labels(&seeded).await?;

        let heuristic = match self.ledger.latest_block().await? {
            Some(tip) => {
                let transfers = self.ledger.transfers_between(0, tip.number).await?;
                let candidates = fan_heuristics(&transfers);
                self.derived.insert_labels_if_absent(&candidates).await?
            }
            None => 0,
        };

        logging::log_info(&format!(
            "[labels] {} seed labels upserted, {} heuristic labels added",
            seeded.len(),
            heuristic
        ));
        Ok(LabelSeedSummary {
            seeded: seeded.len(),
            heuristic,
        })
    }

    /// Replaces the unlock schedule with the expansion of an allocation file
    pub async fn load_unlocks(&self, path: impl AsRef<Path>) -> Result<UnlockLoadSummary, ConfigError> {
        let file = AllocationFile::load(path)?;
        self.load_allocations(&file).await
    }

    pub async fn load_allocations(&self, file: &AllocationFile) -> Result<UnlockLoadSummary, ConfigError> {
        let entries = UnlockScheduleGenerator::new(self.units).generate(file)?;
        self.derived.replace_unlock_schedule(&entries).await?;

        let confirmations = file.confirmations();
        if !confirmations.is_empty() {
            self.derived.upsert_unlock_confirmations(&confirmations).await?;
        }

        logging::log_info(&format!(
            "[unlocks] Loaded {} schedule rows across {} categories, {} confirmations",
            entries.len(),
            file.allocations.len(),
            confirmations.len()
        ));
        Ok(UnlockLoadSummary {
            entries: entries.len(),
            confirmations: confirmations.len(),
        })
    }
}

fn read_input(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}
