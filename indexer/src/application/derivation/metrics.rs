use std::collections::{HashSet, VecDeque};

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::application::derivation::pipeline::{DaySpan, DerivationPipeline};
use crate::domain::errors::DeriveError;
use crate::domain::models::{ConcentrationPoint, DailyBalance, DateRange};
use crate::domain::services::balance_engine::rows_by_day;
use crate::domain::services::{BalanceBook, ConcentrationEngine, SupplyCalculator};

impl DerivationPipeline {
    /// Balance book as of the span start plus every row inside the span
    async fn balance_replay(&self, span: DaySpan) -> Result<(BalanceBook, Vec<DailyBalance>), DeriveError> {
        let book = match span.after {
            Some(after) => BalanceBook::from_rows(&self.derived.latest_balances(after).await?),
            None => BalanceBook::default(),
        };
        let rows = self
            .derived
            .daily_balances(DateRange::new(span.first_day(), Some(span.until)), None)
            .await?;
        Ok((book, rows))
    }

    async fn non_circulating(&self) -> Result<HashSet<String>, DeriveError> {
        Ok(self
            .derived
            .labels()
            .await?
            .into_iter()
            .filter(|l| l.is_non_circulating())
            .map(|l| l.address)
            .collect())
    }

    /// Daily circulating / locked split
    pub(super) async fn derive_supply(&self, span: DaySpan) -> Result<usize, DeriveError> {
        let excluded = self.non_circulating().await?;
        let schedule = self.derived.unlock_schedule().await?;
        let calculator = SupplyCalculator::new(self.config.total_supply, &schedule);
        let (mut book, rows) = self.balance_replay(span).await?;
        let changes = rows_by_day(&rows);

        let first_day = changes
            .keys()
            .next()
            .copied()
            .into_iter()
            .chain(schedule.iter().map(|e| e.unlock_date))
            .min();
        let Some(first_day) = first_day.or(span.first_day()) else {
            self.derived.replace_supply_after(span.after, &[]).await?;
            return Ok(0);
        };

        let mut held: Decimal = excluded
            .iter()
            .map(|a| book.balance(a).max(Decimal::ZERO))
            .sum();
        let mut points = Vec::new();
        for day in span.days(first_day) {
            for row in changes.get(&day).into_iter().flatten() {
                if excluded.contains(&row.address) {
                    held += row.cumulative_balance.max(Decimal::ZERO)
                        - book.balance(&row.address).max(Decimal::ZERO);
                }
                book.apply(row);
            }
            points.push(calculator.point(day, held));
        }

        self.derived.replace_supply_after(span.after, &points).await?;
        Ok(points.len())
    }

    /// Daily top-holder snapshot and inequality metrics
    pub(super) async fn derive_concentration(&self, span: DaySpan) -> Result<usize, DeriveError> {
        let excluded = self.non_circulating().await?;
        let (mut book, rows) = self.balance_replay(span).await?;
        let changes = rows_by_day(&rows);
        let trailing_days = self.config.spike_trailing_days as i64;

        let Some(first_day) = changes.keys().next().copied().or(span.first_day()) else {
            self.derived.replace_concentration_after(span.after, &[]).await?;
            self.derived.replace_top_holders_after(span.after, &[]).await?;
            return Ok(0);
        };

        let mut history: VecDeque<ConcentrationPoint> = match span.after {
            Some(after) if trailing_days > 0 => self
                .derived
                .concentration(DateRange::between(after - Duration::days(trailing_days - 1), after))
                .await?
                .into(),
            _ => VecDeque::new(),
        };

        let mut points = Vec::new();
        let mut snapshots = Vec::new();
        for day in span.days(first_day) {
            for row in changes.get(&day).into_iter().flatten() {
                book.apply(row);
            }

            let mut point = ConcentrationEngine::measure(
                day,
                book.holders()
                    .filter(|(address, _)| !excluded.contains(*address))
                    .map(|(_, balance)| balance),
            );
            let trailing: Vec<ConcentrationPoint> = history
                .iter()
                .filter(|p| in_trailing_window(p.date, day, trailing_days))
                .cloned()
                .collect();
            point.spike_flag =
                ConcentrationEngine::is_spike(&point, &trailing, self.config.spike_threshold);

            snapshots.extend(ConcentrationEngine::top_holders(
                day,
                book.holders(),
                self.config.top_n,
            ));
            history.push_back(point.clone());
            while history
                .front()
                .map_or(false, |p| !in_trailing_window(p.date, day + Duration::days(1), trailing_days))
            {
                history.pop_front();
            }
            points.push(point);
        }

        self.derived
            .replace_concentration_after(span.after, &points)
            .await?;
        self.derived
            .replace_top_holders_after(span.after, &snapshots)
            .await?;
        Ok(points.len() + snapshots.len())
    }
}

/// `date` is one of the `days` days before `day`
fn in_trailing_window(date: NaiveDate, day: NaiveDate, days: i64) -> bool {
    date < day && date >= day - Duration::days(days)
}
