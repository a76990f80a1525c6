use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::models::{SupplyPoint, UnlockScheduleEntry};

/// Splits total supply into circulating and locked parts
pub struct SupplyCalculator {
    total_supply: Decimal,
    /// (date, cumulative scheduled amount) ascending
    cumulative: Vec<(NaiveDate, Decimal)>,
}

impl SupplyCalculator {
    pub fn new(total_supply: Decimal, schedule: &[UnlockScheduleEntry]) -> Self {
        let mut entries: Vec<(NaiveDate, Decimal)> = schedule
            .iter()
            .map(|e| (e.unlock_date, e.amount))
            .collect();
        entries.sort_by_key(|(date, _)| *date);

        let mut cumulative: Vec<(NaiveDate, Decimal)> = Vec::with_capacity(entries.len());
        let mut running = Decimal::ZERO;
        for (date, amount) in entries {
            running += amount;
            match cumulative.last_mut() {
                Some(last) if last.0 == date => last.1 = running,
                _ => cumulative.push((date, running)),
            }
        }

        Self {
            total_supply,
            cumulative,
        }
    }

    /// Scheduled unlocks up to and including `date`, capped at total supply
    pub fn scheduled_circulating(&self, date: NaiveDate) -> Decimal {
        let idx = self.cumulative.partition_point(|(d, _)| *d <= date);
        let unlocked = if idx == 0 {
            Decimal::ZERO
        } else {
            self.cumulative[idx - 1].1
        };
        unlocked.min(self.total_supply)
    }

    pub fn point(&self, date: NaiveDate, non_circulating_held: Decimal) -> SupplyPoint {
        let circulating = (self.scheduled_circulating(date) - non_circulating_held).max(Decimal::ZERO);
        SupplyPoint {
            date,
            total_supply: self.total_supply,
            circulating,
            locked: self.total_supply - circulating,
            non_circulating_held,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::UnlockBasis;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn entry(date: &str, amount: i64) -> UnlockScheduleEntry {
        UnlockScheduleEntry {
            unlock_date: d(date),
            category: "team".to_string(),
            amount: Decimal::from(amount),
            basis: UnlockBasis::Cliff,
        }
    }

    #[test]
    fn circulating_follows_the_schedule() {
        let calc = SupplyCalculator::new(
            Decimal::from(1000),
            &[entry("2026-02-01", 300), entry("2026-01-01", 100), entry("2026-02-01", 50)],
        );
        assert_eq!(calc.scheduled_circulating(d("2025-12-31")), Decimal::ZERO);
        assert_eq!(calc.scheduled_circulating(d("2026-01-15")), Decimal::from(100));
        assert_eq!(calc.scheduled_circulating(d("2026-02-01")), Decimal::from(450));

        let point = calc.point(d("2026-02-02"), Decimal::from(50));
        assert_eq!(point.circulating, Decimal::from(400));
        assert_eq!(point.locked, Decimal::from(600));
    }

    #[test]
    fn circulating_is_capped_and_never_negative() {
        let calc = SupplyCalculator::new(Decimal::from(100), &[entry("2026-01-01", 500)]);
        assert_eq!(calc.scheduled_circulating(d("2026-01-01")), Decimal::from(100));

        let point = calc.point(d("2026-01-01"), Decimal::from(150));
        assert_eq!(point.circulating, Decimal::ZERO);
        assert_eq!(point.locked, Decimal::from(100));
    }
}
