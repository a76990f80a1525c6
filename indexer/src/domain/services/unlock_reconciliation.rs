//! Matches scheduled unlocks against transfers out of the unlocking category

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;

use crate::domain::models::{
    AddressLabel, DatedTransfer, RealizedUnlock, UnlockConfirmation, UnlockScheduleEntry,
};

/// A schedule entry whose window passed without a matching transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleMismatch {
    pub unlock_date: NaiveDate,
    pub category: String,
    pub scheduled_amount: Decimal,
    /// Everything the category sent out inside the window
    pub observed_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationReport {
    pub realized: Vec<RealizedUnlock>,
    /// Informational only
    pub mismatches: Vec<ScheduleMismatch>,
    /// Entries still inside their window
    pub pending: usize,
}

pub struct UnlockReconciler {
    window_days: i64,
    tolerance: Decimal,
    /// address -> lowercase category
    categories: HashMap<String, String>,
    confirmed: HashSet<String>,
}

impl UnlockReconciler {
    pub fn new(
        window_days: i64,
        tolerance: Decimal,
        labels: &[AddressLabel],
        confirmations: &[UnlockConfirmation],
    ) -> Self {
        Self {
            window_days,
            tolerance,
            categories: labels
                .iter()
                .map(|l| (l.address.to_lowercase(), l.category.to_lowercase()))
                .collect(),
            confirmed: confirmations.iter().map(|c| c.tx_hash.to_lowercase()).collect(),
        }
    }

    /// Days of ledger needed to reconcile `schedule`
    pub fn span(&self, schedule: &[UnlockScheduleEntry]) -> Option<(NaiveDate, NaiveDate)> {
        let first = schedule.iter().map(|e| e.unlock_date).min()?;
        let last = schedule.iter().map(|e| e.unlock_date).max()?;
        Some((
            first - Duration::days(self.window_days),
            last + Duration::days(self.window_days),
        ))
    }

    /// Reconciles every entry in date order; a transfer realizes at most one entry
    ///
    /// `horizon` is the last complete day of ledger data; unmatched entries
    /// whose window ends by then are reported as mismatches.
    pub fn reconcile(
        &self,
        schedule: &[UnlockScheduleEntry],
        transfers: &[DatedTransfer],
        horizon: NaiveDate,
    ) -> ReconciliationReport {
        let mut entries: Vec<&UnlockScheduleEntry> = schedule
            .iter()
            .filter(|e| e.amount > Decimal::ZERO)
            .collect();
        entries.sort_by(|a, b| {
            a.unlock_date
                .cmp(&b.unlock_date)
                .then_with(|| a.category.cmp(&b.category))
        });

        let mut used: HashSet<(String, u32)> = HashSet::new();
        let mut report = ReconciliationReport::default();

        for entry in entries {
            let category = entry.category.to_lowercase();
            let from = entry.unlock_date - Duration::days(self.window_days);
            let to = entry.unlock_date + Duration::days(self.window_days);

            let candidates: Vec<&DatedTransfer> = transfers
                .iter()
                .filter(|d| d.day >= from && d.day <= to)
                .filter(|d| !used.contains(&(d.transfer.tx_hash.clone(), d.transfer.idx)))
                .filter(|d| self.category_of(&d.transfer.from) == Some(category.as_str()))
                .filter(|d| self.category_of(&d.transfer.to) != Some(category.as_str()))
                .collect();

            match self.find_match(entry, &candidates) {
                Some(matched) => {
                    for d in &matched {
                        used.insert((d.transfer.tx_hash.clone(), d.transfer.idx));
                    }
                    report.realized.push(self.realize(entry, &matched));
                }
                None if to <= horizon => report.mismatches.push(ScheduleMismatch {
                    unlock_date: entry.unlock_date,
                    category: entry.category.clone(),
                    scheduled_amount: entry.amount,
                    observed_amount: candidates.iter().map(|d| d.transfer.value).sum(),
                }),
                None => report.pending += 1,
            }
        }
        report
    }

    fn category_of(&self, address: &str) -> Option<&str> {
        self.categories.get(address).map(String::as_str)
    }

    fn within_tolerance(&self, scheduled: Decimal, realized: Decimal) -> bool {
        (realized - scheduled).abs() <= scheduled * self.tolerance
    }

    /// Single transfer closest to the unlock date, then a single day's
    /// aggregate, then the whole window's aggregate
    fn find_match<'a>(
        &self,
        entry: &UnlockScheduleEntry,
        candidates: &[&'a DatedTransfer],
    ) -> Option<Vec<&'a DatedTransfer>> {
        let distance = |day: NaiveDate| (day - entry.unlock_date).num_days().abs();

        let single = candidates
            .iter()
            .filter(|d| self.within_tolerance(entry.amount, d.transfer.value))
            .min_by_key(|d| distance(d.day));
        if let Some(d) = single {
            return Some(vec![*d]);
        }

        let mut by_day: BTreeMap<NaiveDate, Vec<&'a DatedTransfer>> = BTreeMap::new();
        for d in candidates {
            by_day.entry(d.day).or_default().push(*d);
        }
        let mut days: Vec<(&NaiveDate, &Vec<&'a DatedTransfer>)> = by_day.iter().collect();
        days.sort_by_key(|(day, _)| distance(**day));
        for (_, group) in days {
            let total: Decimal = group.iter().map(|d| d.transfer.value).sum();
            if self.within_tolerance(entry.amount, total) {
                return Some(group.clone());
            }
        }

        let total: Decimal = candidates.iter().map(|d| d.transfer.value).sum();
        if !candidates.is_empty() && self.within_tolerance(entry.amount, total) {
            return Some(candidates.to_vec());
        }
        None
    }

    fn realize(&self, entry: &UnlockScheduleEntry, matched: &[&DatedTransfer]) -> RealizedUnlock {
        let mut tx_hashes: Vec<String> = Vec::new();
        for d in matched {
            if !tx_hashes.contains(&d.transfer.tx_hash) {
                tx_hashes.push(d.transfer.tx_hash.clone());
            }
        }
        let inferred = !tx_hashes
            .iter()
            .all(|h| self.confirmed.contains(&h.to_lowercase()));

        RealizedUnlock {
            unlock_date: entry.unlock_date,
            category: entry.category.clone(),
            scheduled_amount: entry.amount,
            realized_amount: matched.iter().map(|d| d.transfer.value).sum(),
            realized_date: matched
                .iter()
                .map(|d| d.day)
                .max()
                .unwrap_or(entry.unlock_date),
            tx_hashes,
            inferred,
        }
    }
}
