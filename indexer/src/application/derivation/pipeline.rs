//! Cursor-driven orchestration of the derived tables

use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, NaiveDate};

use crate::config::DerivationConfig;
use crate::domain::errors::DeriveError;
use crate::domain::models::DerivationComponent;
use crate::infrastructure::persistence::{DerivedStore, LedgerStore};
use crate::utils::logging;

/// How much of a component is rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeScope {
    /// Drop and rebuild every row up to the horizon
    All,
    /// Only the days after the component's cursor
    Incremental,
}

impl RecomputeScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecomputeScope::All => "all",
            RecomputeScope::Incremental => "incremental",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "all" | "full" => Some(RecomputeScope::All),
            "incremental" => Some(RecomputeScope::Incremental),
            _ => None,
        }
    }
}

/// Days a component run covers: `(after, until]`, `after = None` meaning from the start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySpan {
    pub after: Option<NaiveDate>,
    pub until: NaiveDate,
}

impl DaySpan {
    pub fn first_day(&self) -> Option<NaiveDate> {
        self.after.map(|a| a + Duration::days(1))
    }

    /// Days of the span, starting at `from` when the span is open-ended
    pub fn days(&self, from: NaiveDate) -> Vec<NaiveDate> {
        let start = self.first_day().unwrap_or(from);
        start
            .iter_days()
            .take_while(|d| *d <= self.until)
            .collect()
    }
}

/// Result of one component run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentRun {
    pub component: DerivationComponent,
    /// `None` when the component was already up to date or had no input
    pub span: Option<DaySpan>,
    pub rows: usize,
}

/// Rebuilds derived tables from the ledger, one component at a time
///
/// Each component keeps a cursor (the last day it covers). Nothing past the
/// horizon, the day before the day of the highest block of the unbroken
/// stored prefix, is ever read, so a partially ingested day never leaks into
/// a derived row. Ingestion rewinds the cursors when it commits blocks on a
/// day they already cover.
pub struct DerivationPipeline {
    pub(super) ledger: Arc<dyn LedgerStore>,
    pub(super) derived: Arc<dyn DerivedStore>,
    pub(super) config: DerivationConfig,
}

impl DerivationPipeline {
    pub fn new(ledger: Arc<dyn LedgerStore>, derived: Arc<dyn DerivedStore>, config: DerivationConfig) -> Self {
        Self {
            ledger,
            derived,
            config,
        }
    }

    /// Last complete UTC day of ingested data
    ///
    /// Bounded by the unbroken prefix of stored heights, so a range still
    /// being backfilled above a gap is not read.
    pub async fn horizon(&self) -> Result<Option<NaiveDate>, DeriveError> {
        Ok(self
            .ledger
            .contiguous_tip()
            .await?
            .and_then(|b| b.day().pred_opt()))
    }

    /// Runs `components` in dependency order
    pub async fn run(
        &self,
        components: &[DerivationComponent],
        scope: RecomputeScope,
    ) -> Result<Vec<ComponentRun>, DeriveError> {
        let Some(horizon) = self.horizon().await? else {
            logging::log_info("[derive] No ingested blocks yet, nothing to derive");
            return Ok(Vec::new());
        };

        let mut runs = Vec::new();
        for component in DerivationComponent::ALL {
            if !components.contains(&component) {
                continue;
            }
            runs.push(self.run_component(component, scope, horizon).await?);
        }
        Ok(runs)
    }

    async fn run_component(
        &self,
        component: DerivationComponent,
        scope: RecomputeScope,
        horizon: NaiveDate,
    ) -> Result<ComponentRun, DeriveError> {
        let started = Instant::now();
        let until = match component {
            DerivationComponent::Supply | DerivationComponent::Concentration => {
                match self.derived.get_cursor(DerivationComponent::Balances).await? {
                    Some(balances) => balances.min(horizon),
                    None => {
                        logging::log_warning(&format!(
                            "[derive:{}] Balances have not been derived yet, skipping",
                            component
                        ));
                        return Ok(ComponentRun {
                            component,
                            span: None,
                            rows: 0,
                        });
                    }
                }
            }
            _ => horizon,
        };

        let after = match scope {
            RecomputeScope::All => None,
            RecomputeScope::Incremental => self.derived.get_cursor(component).await?,
        };
        if after.map_or(false, |a| a >= until) {
            logging::log_debug(&format!("[derive:{}] Up to date at {}", component, until));
            return Ok(ComponentRun {
                component,
                span: None,
                rows: 0,
            });
        }

        let span = DaySpan { after, until };
        let rows = match component {
            DerivationComponent::Balances => self.derive_balances(span).await?,
            DerivationComponent::Supply => self.derive_supply(span).await?,
            DerivationComponent::Concentration => self.derive_concentration(span).await?,
            DerivationComponent::Flows => self.derive_flows(span).await?,
            DerivationComponent::Flags => self.derive_flags(span).await?,
            DerivationComponent::Unlocks => self.derive_unlocks(span).await?,
        };
        self.derived.set_cursor(component, until).await?;

        logging::log_info(&format!(
            "[derive:{}] {} → {} ({}) | {} rows | {}",
            component,
            span.first_day().map_or_else(|| "start".to_string(), |d| d.to_string()),
            until,
            scope.as_str(),
            rows,
            logging::fmt_duration(started.elapsed().as_secs())
        ));
        Ok(ComponentRun {
            component,
            span: Some(span),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn span_days_are_inclusive_of_until() {
        let span = DaySpan {
            after: Some(d("2026-01-01")),
            until: d("2026-01-03"),
        };
        assert_eq!(span.days(d("2020-01-01")), vec![d("2026-01-02"), d("2026-01-03")]);

        let open = DaySpan {
            after: None,
            until: d("2026-01-02"),
        };
        assert_eq!(open.days(d("2026-01-01")).len(), 2);
    }

    #[test]
    fn scope_parses_cli_values() {
        assert_eq!(RecomputeScope::parse("ALL"), Some(RecomputeScope::All));
        assert_eq!(RecomputeScope::parse("incremental"), Some(RecomputeScope::Incremental));
        assert_eq!(RecomputeScope::parse("partial"), None);
    }
}
