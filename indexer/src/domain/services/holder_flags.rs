//! Rule engine classifying holder behavior over trailing windows
//!
//! Each rule is a pure function from an address's activity inside one window
//! to an optional verdict. Rules are evaluated in [`RULES`] order and every
//! rule that holds produces its own flag.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config::FlagThresholds;
use crate::domain::models::{Confidence, DatedTransfer, HolderFlag, HolderFlagKind, TimeWindow};

/// Movements of one address on one day
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayActivity {
    pub inflow: Decimal,
    pub outflow: Decimal,
    /// (recipient, value) of every outgoing transfer
    pub outgoing: Vec<(String, Decimal)>,
}

impl DayActivity {
    pub fn net(&self) -> Decimal {
        self.inflow - self.outflow
    }
}

/// Per-address daily activity
pub type ActivityLedger = BTreeMap<String, BTreeMap<NaiveDate, DayActivity>>;

pub fn build_activity(transfers: &[DatedTransfer]) -> ActivityLedger {
    let mut ledger: ActivityLedger = BTreeMap::new();
    for dated in transfers {
        let t = &dated.transfer;
        if t.from == t.to {
            continue;
        }
        let incoming = ledger
            .entry(t.to.clone())
            .or_default()
            .entry(dated.day)
            .or_default();
        incoming.inflow += t.value;

        let outgoing = ledger
            .entry(t.from.clone())
            .or_default()
            .entry(dated.day)
            .or_default();
        outgoing.outflow += t.value;
        outgoing.outgoing.push((t.to.clone(), t.value));
    }
    ledger
}

/// Activity of one address inside one window, ascending by day
pub struct WindowActivity<'a> {
    pub days: Vec<(NaiveDate, &'a DayActivity)>,
}

impl<'a> WindowActivity<'a> {
    fn total_in(&self) -> Decimal {
        self.days.iter().map(|(_, a)| a.inflow).sum()
    }

    fn total_out(&self) -> Decimal {
        self.days.iter().map(|(_, a)| a.outflow).sum()
    }

    fn days_where(&self, pred: impl Fn(&DayActivity) -> bool) -> usize {
        self.days.iter().filter(|(_, a)| pred(a)).count()
    }

    /// Days with a non-zero net flow
    fn active_days(&self) -> usize {
        self.days_where(|a| !a.net().is_zero())
    }
}

/// Outcome of a rule that holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub confidence: Confidence,
    pub rationale: String,
}

pub type Rule = fn(&WindowActivity<'_>, &FlagThresholds) -> Option<Verdict>;

/// Evaluation order of the rules
pub const RULES: [(HolderFlagKind, Rule); 4] = [
    (HolderFlagKind::NeverSold, never_sold),
    (HolderFlagKind::ConsistentSeller, consistent_seller),
    (HolderFlagKind::Accumulator, accumulator),
    (HolderFlagKind::Redistributor, redistributor),
];

/// Confidence of a ratio-based rule
pub fn confidence_from_ratio(ratio: f64) -> Confidence {
    if ratio >= 0.9 {
        Confidence::High
    } else if ratio >= 0.75 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

fn never_sold(window: &WindowActivity<'_>, _: &FlagThresholds) -> Option<Verdict> {
    if window.total_in() <= Decimal::ZERO || !window.total_out().is_zero() {
        return None;
    }
    let inflow_days = window.days_where(|a| a.inflow > Decimal::ZERO);
    let confidence = match inflow_days {
        0 | 1 => Confidence::Low,
        2 => Confidence::Medium,
        _ => Confidence::High,
    };
    Some(Verdict {
        confidence,
        rationale: format!("received on {} day(s), no outgoing transfers", inflow_days),
    })
}

/// Majority of `part` over the active days, once enough days are active
fn majority(part: usize, active: usize, thresholds: &FlagThresholds) -> Option<Confidence> {
    if active == 0 || active < thresholds.min_active_days || part * 2 <= active {
        return None;
    }
    Some(confidence_from_ratio(part as f64 / active as f64))
}

fn consistent_seller(window: &WindowActivity<'_>, thresholds: &FlagThresholds) -> Option<Verdict> {
    let largest_inflow_day = window
        .days
        .iter()
        .map(|(_, a)| a.net())
        .filter(|n| *n > Decimal::ZERO)
        .max()
        .unwrap_or(Decimal::ZERO);
    if largest_inflow_day > thresholds.seller_max_daily_inflow {
        return None;
    }

    let active = window.active_days();
    let selling = window.days_where(|a| a.net() < Decimal::ZERO);
    let confidence = majority(selling, active, thresholds)?;
    Some(Verdict {
        confidence,
        rationale: format!("net outflow on {} of {} active days", selling, active),
    })
}

fn accumulator(window: &WindowActivity<'_>, thresholds: &FlagThresholds) -> Option<Verdict> {
    let largest_outflow_day = window
        .days
        .iter()
        .map(|(_, a)| a.outflow)
        .max()
        .unwrap_or(Decimal::ZERO);
    if largest_outflow_day > thresholds.accumulator_max_daily_outflow {
        return None;
    }

    let active = window.active_days();
    let buying = window.days_where(|a| a.net() > Decimal::ZERO);
    let confidence = majority(buying, active, thresholds)?;
    Some(Verdict {
        confidence,
        rationale: format!("net inflow on {} of {} active days", buying, active),
    })
}

fn redistributor(window: &WindowActivity<'_>, thresholds: &FlagThresholds) -> Option<Verdict> {
    for (i, (day, activity)) in window.days.iter().enumerate() {
        let inflow = activity.inflow;
        if inflow < thresholds.redistributor_min_inflow || inflow <= Decimal::ZERO {
            continue;
        }

        let mut recipients: HashSet<&str> = HashSet::new();
        let mut redistributed = Decimal::ZERO;
        for (_, later) in &window.days[i..] {
            for (to, value) in &later.outgoing {
                if *value < inflow {
                    recipients.insert(to.as_str());
                    redistributed += *value;
                }
            }
        }

        if recipients.len() >= thresholds.redistributor_min_recipients.max(2) {
            let ratio = (redistributed / inflow).to_f64().unwrap_or(0.0);
            return Some(Verdict {
                confidence: confidence_from_ratio(ratio),
                rationale: format!(
                    "inflow on {} spread to {} distinct addresses ({:.0}% forwarded)",
                    day,
                    recipients.len(),
                    ratio * 100.0
                ),
            });
        }
    }
    None
}

/// Applies [`RULES`] to every address active in each configured window
pub struct HolderFlagEngine<'a> {
    thresholds: &'a FlagThresholds,
}

impl<'a> HolderFlagEngine<'a> {
    pub fn new(thresholds: &'a FlagThresholds) -> Self {
        Self { thresholds }
    }

    /// Flags as of `asof`, ordered by (address, flag, window)
    pub fn evaluate(&self, asof: NaiveDate, ledger: &ActivityLedger) -> Vec<HolderFlag> {
        let mut flags = Vec::new();
        for (address, days) in ledger {
            for window in &self.thresholds.windows {
                let activity = window_activity(days, window, asof);
                if activity.days.is_empty() {
                    continue;
                }
                for (kind, rule) in RULES.iter() {
                    if let Some(verdict) = rule(&activity, self.thresholds) {
                        flags.push(HolderFlag {
                            asof_date: asof,
                            address: address.clone(),
                            flag: *kind,
                            time_window: window.label.clone(),
                            confidence: verdict.confidence,
                            rationale: verdict.rationale,
                        });
                    }
                }
            }
        }
        flags.sort_by(|a, b| {
            a.address
                .cmp(&b.address)
                .then_with(|| a.flag.cmp(&b.flag))
                .then_with(|| a.time_window.cmp(&b.time_window))
        });
        flags
    }
}

fn window_activity<'a>(
    days: &'a BTreeMap<NaiveDate, DayActivity>,
    window: &TimeWindow,
    asof: NaiveDate,
) -> WindowActivity<'a> {
    let lower = match window.start(asof) {
        Some(start) => Bound::Included(start),
        None => Bound::Unbounded,
    };
    WindowActivity {
        days: days
            .range((lower, Bound::Included(asof)))
            .map(|(d, a)| (*d, a))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DerivationConfig;
    use crate::domain::models::{Transfer, TransferSource};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dated(day: &str, from: &str, to: &str, value: i64) -> DatedTransfer {
        DatedTransfer {
            day: d(day),
            transfer: Transfer {
                block_number: 1,
                tx_hash: "0xt".to_string(),
                idx: 0,
                from: from.to_string(),
                to: to.to_string(),
                value: Decimal::from(value),
                source: TransferSource::TopLevel,
            },
        }
    }

    fn thresholds() -> FlagThresholds {
        let mut t = DerivationConfig::default().flags;
        t.windows = vec![TimeWindow::days(7)];
        t.seller_max_daily_inflow = Decimal::from(10);
        t.accumulator_max_daily_outflow = Decimal::from(10);
        t.redistributor_min_inflow = Decimal::from(1_000);
        t.redistributor_min_recipients = 3;
        t
    }

    fn flags_of(flags: &[HolderFlag], address: &str) -> Vec<(HolderFlagKind, Confidence)> {
        flags
            .iter()
            .filter(|f| f.address == address)
            .map(|f| (f.flag, f.confidence))
            .collect()
    }

    #[test]
    fn holder_that_only_receives_never_sold() {
        let ledger = build_activity(&[
            dated("2026-03-01", "0xsrc", "0xh", 5),
            dated("2026-03-02", "0xsrc", "0xh", 5),
            dated("2026-03-03", "0xsrc", "0xh", 5),
        ]);
        let t = thresholds();
        let flags = HolderFlagEngine::new(&t).evaluate(d("2026-03-03"), &ledger);
        let h = flags_of(&flags, "0xh");
        assert!(h.contains(&(HolderFlagKind::NeverSold, Confidence::High)));
        assert!(h.contains(&(HolderFlagKind::Accumulator, Confidence::High)));
        assert!(!h.iter().any(|(k, _)| *k == HolderFlagKind::ConsistentSeller));
    }

    #[test]
    fn seller_needs_a_strict_majority() {
        let ledger = build_activity(&[
            dated("2026-03-01", "0xs", "0xx", 5),
            dated("2026-03-02", "0xs", "0xx", 5),
            dated("2026-03-03", "0xx", "0xs", 5),
            dated("2026-03-04", "0xs", "0xx", 5),
        ]);
        let t = thresholds();
        let flags = HolderFlagEngine::new(&t).evaluate(d("2026-03-04"), &ledger);
        assert!(flags_of(&flags, "0xs").contains(&(HolderFlagKind::ConsistentSeller, Confidence::Medium)));

        let even = build_activity(&[
            dated("2026-03-01", "0xs", "0xx", 5),
            dated("2026-03-02", "0xx", "0xs", 5),
        ]);
        let flags = HolderFlagEngine::new(&t).evaluate(d("2026-03-02"), &even);
        assert!(!flags_of(&flags, "0xs").iter().any(|(k, _)| *k == HolderFlagKind::ConsistentSeller));
    }

    #[test]
    fn large_inflow_day_disqualifies_seller() {
        let ledger = build_activity(&[
            dated("2026-03-01", "0xs", "0xx", 5),
            dated("2026-03-02", "0xs", "0xx", 5),
            dated("2026-03-03", "0xx", "0xs", 500),
        ]);
        let t = thresholds();
        let flags = HolderFlagEngine::new(&t).evaluate(d("2026-03-03"), &ledger);
        assert!(!flags_of(&flags, "0xs").iter().any(|(k, _)| *k == HolderFlagKind::ConsistentSeller));
    }

    #[test]
    fn large_inflow_fanned_out_is_redistribution() {
        let ledger = build_activity(&[
            dated("2026-03-01", "0xwhale", "0xr", 1_000),
            dated("2026-03-02", "0xr", "0xa", 300),
            dated("2026-03-02", "0xr", "0xb", 300),
            dated("2026-03-03", "0xr", "0xc", 350),
        ]);
        let t = thresholds();
        let flags = HolderFlagEngine::new(&t).evaluate(d("2026-03-03"), &ledger);
        let r = flags_of(&flags, "0xr");
        assert!(r.contains(&(HolderFlagKind::Redistributor, Confidence::High)));
    }

    #[test]
    fn addresses_outside_the_window_are_not_evaluated() {
        let ledger = build_activity(&[dated("2026-01-01", "0xsrc", "0xold", 5)]);
        let t = thresholds();
        let flags = HolderFlagEngine::new(&t).evaluate(d("2026-03-01"), &ledger);
        assert!(flags.is_empty());
    }
}
