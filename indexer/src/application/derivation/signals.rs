use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::application::derivation::pipeline::{DaySpan, DerivationPipeline};
use crate::domain::errors::DeriveError;
use crate::domain::models::{DateRange, DatedTransfer, TimeWindow};
use crate::domain::services::{build_activity, unlock_proximity, ExchangeFlowEngine, HolderFlagEngine};

impl DerivationPipeline {
    /// Transfers needed to evaluate trailing `windows` for every day of `span`,
    /// and the first as-of day
    async fn windowed_transfers(
        &self,
        span: DaySpan,
        windows: &[TimeWindow],
    ) -> Result<(Vec<DatedTransfer>, Option<NaiveDate>), DeriveError> {
        let from = span.first_day().and_then(|first| lookback_start(first, windows));
        let transfers = self
            .ledger
            .dated_transfers(DateRange::new(from, Some(span.until)), None)
            .await?;
        let first_day = span
            .first_day()
            .or_else(|| transfers.iter().map(|t| t.day).min());
        Ok((transfers, first_day))
    }

    /// Net exchange inflow per exchange and window, tagged with unlock proximity
    pub(super) async fn derive_flows(&self, span: DaySpan) -> Result<usize, DeriveError> {
        let labels = self.derived.labels().await?;
        let engine = ExchangeFlowEngine::new(&labels, &self.config.exchange_categories);
        let unlock_dates: BTreeSet<NaiveDate> = self
            .derived
            .unlock_schedule()
            .await?
            .into_iter()
            .map(|e| e.unlock_date)
            .collect();

        let (transfers, first_day) = self
            .windowed_transfers(span, &self.config.flow_windows)
            .await?;
        let mut rows = Vec::new();
        if let Some(first_day) = first_day {
            let daily = engine.daily_net(&transfers);
            for day in span.days(first_day) {
                let proximity = unlock_proximity(day, &unlock_dates, self.config.unlock_proximity_days);
                rows.extend(engine.flows(day, &self.config.flow_windows, &daily, proximity));
            }
        }

        self.derived
            .replace_exchange_flows_after(span.after, &rows)
            .await?;
        Ok(rows.len())
    }

    /// Behavioral flags per address, window and day
    pub(super) async fn derive_flags(&self, span: DaySpan) -> Result<usize, DeriveError> {
        let thresholds = &self.config.flags;
        let (transfers, first_day) = self.windowed_transfers(span, &thresholds.windows).await?;

        let mut rows = Vec::new();
        if let Some(first_day) = first_day {
            let activity = build_activity(&transfers);
            let engine = HolderFlagEngine::new(thresholds);
            for day in span.days(first_day) {
                rows.extend(engine.evaluate(day, &activity));
            }
        }

        self.derived
            .replace_holder_flags_after(span.after, &rows)
            .await?;
        Ok(rows.len())
    }
}

/// Earliest day any of `windows` ending at `first` reaches back to;
/// `None` when a window is unbounded
fn lookback_start(first: NaiveDate, windows: &[TimeWindow]) -> Option<NaiveDate> {
    let mut longest = 1u32;
    for window in windows {
        longest = longest.max(window.days?);
    }
    Some(first - Duration::days(i64::from(longest) - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn lookback_covers_the_longest_window() {
        let windows = vec![TimeWindow::days(1), TimeWindow::days(7)];
        assert_eq!(lookback_start(d("2026-01-10"), &windows), Some(d("2026-01-04")));
        assert_eq!(
            lookback_start(d("2026-01-10"), &[TimeWindow::days(3), TimeWindow::all_time()]),
            None
        );
    }
}
