use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::application::derivation::pipeline::{DaySpan, DerivationPipeline};
use crate::domain::errors::DeriveError;
use crate::domain::models::{DailyBalance, DateRange};
use crate::domain::services::{BalanceEngine, DailyFlows};
use crate::utils::logging;

impl DerivationPipeline {
    /// Daily net flow and cumulative balance per address
    ///
    /// An open span rebuilds every address, partitioned over blocking
    /// workers; otherwise only the new days are appended on top of each
    /// address's latest balance.
    pub(super) async fn derive_balances(&self, span: DaySpan) -> Result<usize, DeriveError> {
        let range = DateRange::new(span.first_day(), Some(span.until));
        let transfers = self.ledger.dated_transfers(range, None).await?;
        let flows = BalanceEngine::daily_net_flows(&transfers);

        let rows = match span.after {
            None => self.full_balances(flows).await?,
            Some(after) => {
                let opening: HashMap<String, Decimal> = self
                    .derived
                    .latest_balances(after)
                    .await?
                    .into_iter()
                    .map(|row| (row.address, row.cumulative_balance))
                    .collect();
                BalanceEngine::accumulate(&flows, &opening)
            }
        };

        self.derived
            .replace_daily_balances_after(span.after, &rows)
            .await?;
        Ok(rows.len())
    }

    async fn full_balances(&self, flows: DailyFlows) -> Result<Vec<DailyBalance>, DeriveError> {
        let partitions = BalanceEngine::partition(flows, self.config.recompute_partitions);
        logging::log_debug(&format!(
            "[derive:balances] full recompute over {} partitions",
            partitions.len()
        ));

        let workers: Vec<_> = partitions
            .into_iter()
            .map(|part| {
                tokio::task::spawn_blocking(move || BalanceEngine::accumulate(&part, &HashMap::new()))
            })
            .collect();

        let mut rows = Vec::new();
        for worker in workers {
            rows.extend(worker.await?);
        }
        rows.sort_by(|a: &DailyBalance, b: &DailyBalance| {
            a.date.cmp(&b.date).then_with(|| a.address.cmp(&b.address))
        });
        Ok(rows)
    }
}
