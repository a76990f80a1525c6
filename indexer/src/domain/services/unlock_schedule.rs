//! Expands a declarative allocation file into dated unlock rows
//!
//! ```toml
//! [meta]
//! total_supply = 1000000000
//! tge_date = "2025-02-13"
//!
//! [allocations.foundation]
//! percent = 10.0
//! tge_percent = 50.0
//! linear_months = 12
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Duration, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::errors::ConfigError;
use crate::domain::models::{TokenUnits, UnlockBasis, UnlockConfirmation, UnlockScheduleEntry};

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationFile {
    pub meta: AllocationMeta,
    pub allocations: BTreeMap<String, Allocation>,
    /// Unlock transactions confirmed out of band
    #[serde(default)]
    pub confirmed_unlocks: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationMeta {
    /// Total supply in whole tokens
    pub total_supply: Decimal,
    /// ISO date, e.g. `2025-02-13`
    pub tge_date: String,
}

/// Vesting terms of one category; amounts in whole tokens
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Allocation {
    pub percent: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub tge_percent: Option<Decimal>,
    pub tge_amount: Option<Decimal>,
    #[serde(default)]
    pub cliff_months: u32,
    #[serde(default)]
    pub linear_months: u32,
}

impl AllocationFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn tge_date(&self) -> Result<NaiveDate, ConfigError> {
        NaiveDate::parse_from_str(self.meta.tge_date.trim(), "%Y-%m-%d")
            .map_err(|e| ConfigError::Invalid(format!("tge_date '{}': {}", self.meta.tge_date, e)))
    }

    pub fn confirmations(&self) -> Vec<UnlockConfirmation> {
        self.confirmed_unlocks
            .iter()
            .map(|hash| hash.trim().to_lowercase())
            .filter(|hash| !hash.is_empty())
            .map(|tx_hash| UnlockConfirmation {
                tx_hash,
                source: "allocation_file".to_string(),
            })
            .collect()
    }
}

/// Generates schedule rows in base units, ordered by (date, category)
pub struct UnlockScheduleGenerator {
    units: TokenUnits,
}

impl UnlockScheduleGenerator {
    pub fn new(units: TokenUnits) -> Self {
        Self { units }
    }

    pub fn generate(&self, file: &AllocationFile) -> Result<Vec<UnlockScheduleEntry>, ConfigError> {
        let tge = file.tge_date()?;
        let mut rows: BTreeMap<(NaiveDate, String), (Decimal, UnlockBasis)> = BTreeMap::new();
        let mut push = |date: NaiveDate, category: &str, amount: Decimal, basis: UnlockBasis| {
            rows.entry((date, category.to_string()))
                .and_modify(|(sum, b)| {
                    *sum += amount;
                    *b = b.merge(basis);
                })
                .or_insert((amount, basis));
        };

        for (category, alloc) in &file.allocations {
            let total = allocation_total(category, alloc, file.meta.total_supply)?;

            let hundred = Decimal::from(100);
            let mut tge_unlock = alloc.tge_amount.unwrap_or(Decimal::ZERO);
            if let Some(pct) = alloc.tge_percent {
                tge_unlock += total * pct / hundred;
            }
            let tge_unlock = tge_unlock.min(total);
            let remaining = (total - tge_unlock).max(Decimal::ZERO);

            if tge_unlock > Decimal::ZERO {
                push(tge, category, tge_unlock, UnlockBasis::Tge);
            }
            if remaining <= Decimal::ZERO {
                continue;
            }

            let start = add_months(tge, alloc.cliff_months)?;
            if alloc.linear_months == 0 {
                push(start, category, remaining, UnlockBasis::Cliff);
                continue;
            }

            let end = add_months(start, alloc.linear_months)?;
            let days = (end - start).num_days() + 1;
            if days <= 0 {
                push(start, category, remaining, UnlockBasis::Cliff);
                continue;
            }

            let per_day = (remaining / Decimal::from(days)).round_dp(6);
            let residue = remaining - per_day * Decimal::from(days);
            for offset in 0..days {
                let day = start + Duration::days(offset);
                let amount = if offset == days - 1 {
                    per_day + residue
                } else {
                    per_day
                };
                push(day, category, amount, UnlockBasis::Linear);
            }
        }

        Ok(rows
            .into_iter()
            .map(|((unlock_date, category), (amount, basis))| UnlockScheduleEntry {
                unlock_date,
                category,
                amount: self.units.to_base(amount),
                basis,
            })
            .collect())
    }
}

fn allocation_total(category: &str, alloc: &Allocation, total_supply: Decimal) -> Result<Decimal, ConfigError> {
    match (alloc.amount, alloc.percent) {
        (Some(amount), _) => Ok(amount),
        (None, Some(percent)) => Ok(total_supply * percent / Decimal::from(100)),
        (None, None) => Err(ConfigError::Invalid(format!(
            "allocation '{}' must have 'percent' or 'amount'",
            category
        ))),
    }
}

/// Calendar month arithmetic, clamping to the last day of shorter months
fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, ConfigError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| ConfigError::Invalid(format!("{} + {} months is out of range", date, months)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn tokens(rows: &[UnlockScheduleEntry], category: &str) -> Decimal {
        let units = TokenUnits::new(6);
        rows.iter()
            .filter(|r| r.category == category)
            .map(|r| units.to_tokens(r.amount))
            .sum()
    }

    const FILE: &str = r#"
        [meta]
        total_supply = 1000000
        tge_date = "2025-02-13"

        [allocations.incentives]
        percent = 10.0
        tge_percent = 100.0

        [allocations.foundation]
        percent = 10.0
        tge_percent = 50.0
        linear_months = 1

        [allocations.backers]
        amount = 300000
        cliff_months = 12
    "#;

    #[test]
    fn expands_tge_cliff_and_linear_terms() {
        let file = AllocationFile::parse(FILE).unwrap();
        let rows = UnlockScheduleGenerator::new(TokenUnits::new(6)).generate(&file).unwrap();

        let incentives: Vec<_> = rows.iter().filter(|r| r.category == "incentives").collect();
        assert_eq!(incentives.len(), 1);
        assert_eq!(incentives[0].basis, UnlockBasis::Tge);
        assert_eq!(incentives[0].amount, Decimal::from(100_000_000_000u64));

        let backers: Vec<_> = rows.iter().filter(|r| r.category == "backers").collect();
        assert_eq!(backers.len(), 1);
        assert_eq!(backers[0].unlock_date, d("2026-02-13"));
        assert_eq!(backers[0].basis, UnlockBasis::Cliff);

        // the TGE half merges into the first of 29 linear days
        let foundation: Vec<_> = rows.iter().filter(|r| r.category == "foundation").collect();
        assert_eq!(foundation.len(), 29);
        assert_eq!(foundation[0].unlock_date, d("2025-02-13"));
        assert_eq!(foundation[0].basis, UnlockBasis::Mixed);
        assert_eq!(foundation.last().unwrap().unlock_date, d("2025-03-13"));
        assert_eq!(tokens(&rows, "foundation"), Decimal::from(100_000));
    }

    #[test]
    fn linear_residue_lands_on_the_last_day() {
        let file = AllocationFile::parse(
            r#"
            [meta]
            total_supply = 100
            tge_date = "2025-01-01"

            [allocations.team]
            amount = 100
            linear_months = 1
            "#,
        )
        .unwrap();
        let rows = UnlockScheduleGenerator::new(TokenUnits::new(6)).generate(&file).unwrap();
        assert_eq!(rows.len(), 32);
        let total: Decimal = rows.iter().map(|r| r.amount).sum();
        assert_eq!(total, Decimal::from(100_000_000));
    }

    #[test]
    fn allocation_without_size_is_rejected() {
        let file = AllocationFile::parse(
            r#"
            [meta]
            total_supply = 100
            tge_date = "2025-01-01"

            [allocations.team]
            cliff_months = 3
            "#,
        )
        .unwrap();
        assert!(matches!(
            UnlockScheduleGenerator::new(TokenUnits::new(0)).generate(&file),
            Err(ConfigError::Invalid(_))
        ));
    }
}
