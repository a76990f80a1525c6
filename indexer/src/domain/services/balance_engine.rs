use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::models::{DailyBalance, DatedTransfer};

/// Net flow per address per UTC day
pub type DailyFlows = BTreeMap<String, BTreeMap<NaiveDate, Decimal>>;

/// Builds the sparse per-address daily balance series from the transfer ledger
pub struct BalanceEngine;

impl BalanceEngine {
    /// Incoming minus outgoing value per address and day; days whose
    /// movements cancel out are dropped
    pub fn daily_net_flows(transfers: &[DatedTransfer]) -> DailyFlows {
        let mut flows: DailyFlows = BTreeMap::new();
        for dated in transfers {
            let t = &dated.transfer;
            if t.from == t.to {
                continue;
            }
            *flows
                .entry(t.to.clone())
                .or_default()
                .entry(dated.day)
                .or_insert(Decimal::ZERO) += t.value;
            *flows
                .entry(t.from.clone())
                .or_default()
                .entry(dated.day)
                .or_insert(Decimal::ZERO) -= t.value;
        }

        for days in flows.values_mut() {
            days.retain(|_, net| !net.is_zero());
        }
        flows.retain(|_, days| !days.is_empty());
        flows
    }

    /// Prefix-sums each address's flows on top of its opening balance
    ///
    /// Output is ordered by (date, address).
    pub fn accumulate(flows: &DailyFlows, opening: &HashMap<String, Decimal>) -> Vec<DailyBalance> {
        let mut rows = Vec::new();
        for (address, days) in flows {
            let mut running = opening.get(address).copied().unwrap_or(Decimal::ZERO);
            for (date, net) in days {
                running += *net;
                rows.push(DailyBalance {
                    date: *date,
                    address: address.clone(),
                    net_flow: *net,
                    cumulative_balance: running,
                });
            }
        }
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.address.cmp(&b.address)));
        rows
    }

    /// Stable partition of an address (FNV-1a over its bytes)
    pub fn partition_of(address: &str, partitions: usize) -> usize {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in address.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x100000001b3);
        }
        (hash % partitions.max(1) as u64) as usize
    }

    /// Splits flows into address-disjoint partitions
    pub fn partition(flows: DailyFlows, partitions: usize) -> Vec<DailyFlows> {
        let count = partitions.max(1);
        let mut parts: Vec<DailyFlows> = vec![BTreeMap::new(); count];
        for (address, days) in flows {
            let slot = Self::partition_of(&address, count);
            parts[slot].insert(address, days);
        }
        parts
    }
}

/// Carry-forward view of every address's balance, advanced day by day
#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    balances: HashMap<String, Decimal>,
}

impl BalanceBook {
    /// Book opened from the latest row per address
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a DailyBalance>) -> Self {
        let mut book = Self::default();
        for row in rows {
            book.apply(row);
        }
        book
    }

    pub fn apply(&mut self, row: &DailyBalance) {
        self.balances
            .insert(row.address.clone(), row.cumulative_balance);
    }

    pub fn balance(&self, address: &str) -> Decimal {
        self.balances.get(address).copied().unwrap_or(Decimal::ZERO)
    }

    /// Addresses holding a positive balance
    pub fn holders(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.balances
            .iter()
            .filter(|(_, b)| **b > Decimal::ZERO)
            .map(|(a, b)| (a.as_str(), *b))
    }

    pub fn openings(&self) -> HashMap<String, Decimal> {
        self.balances.clone()
    }
}

/// Groups balance rows by day, preserving row order inside a day
pub fn rows_by_day(rows: &[DailyBalance]) -> BTreeMap<NaiveDate, Vec<&DailyBalance>> {
    let mut days: BTreeMap<NaiveDate, Vec<&DailyBalance>> = BTreeMap::new();
    for row in rows {
        days.entry(row.date).or_default().push(row);
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Transfer, TransferSource};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dated(day: &str, from: &str, to: &str, value: i64, idx: u32) -> DatedTransfer {
        DatedTransfer {
            day: d(day),
            transfer: Transfer {
                block_number: 1,
                tx_hash: format!("0x{}", idx),
                idx,
                from: from.to_string(),
                to: to.to_string(),
                value: Decimal::from(value),
                source: TransferSource::TopLevel,
            },
        }
    }

    #[test]
    fn net_flows_conserve_value() {
        let flows = BalanceEngine::daily_net_flows(&[
            dated("2026-01-01", "0xa", "0xb", 10, 1),
            dated("2026-01-01", "0xb", "0xc", 4, 2),
            dated("2026-01-02", "0xc", "0xa", 1, 3),
        ]);
        let total: Decimal = flows.values().flat_map(|d| d.values()).copied().sum();
        assert_eq!(total, Decimal::ZERO);
        assert_eq!(flows["0xb"][&d("2026-01-01")], Decimal::from(6));
        assert_eq!(flows["0xa"][&d("2026-01-02")], Decimal::from(1));
    }

    #[test]
    fn cancelling_days_and_self_transfers_leave_no_row() {
        let flows = BalanceEngine::daily_net_flows(&[
            dated("2026-01-01", "0xa", "0xa", 10, 1),
            dated("2026-01-01", "0xa", "0xb", 5, 2),
            dated("2026-01-01", "0xb", "0xa", 5, 3),
        ]);
        assert!(flows.is_empty());
    }

    #[test]
    fn accumulate_starts_from_opening_balance() {
        let flows = BalanceEngine::daily_net_flows(&[
            dated("2026-01-02", "0xa", "0xb", 10, 1),
            dated("2026-01-03", "0xb", "0xa", 3, 2),
        ]);
        let mut opening = HashMap::new();
        opening.insert("0xa".to_string(), Decimal::from(100));

        let rows = BalanceEngine::accumulate(&flows, &opening);
        let a: Vec<_> = rows.iter().filter(|r| r.address == "0xa").collect();
        assert_eq!(a[0].cumulative_balance, Decimal::from(90));
        assert_eq!(a[1].cumulative_balance, Decimal::from(93));
        assert!(rows.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn partitions_are_disjoint_and_stable() {
        let flows = BalanceEngine::daily_net_flows(&[
            dated("2026-01-01", "0xa", "0xb", 1, 1),
            dated("2026-01-01", "0xc", "0xd", 1, 2),
            dated("2026-01-01", "0xe", "0xf", 1, 3),
        ]);
        let parts = BalanceEngine::partition(flows.clone(), 4);
        assert_eq!(parts.iter().map(|p| p.len()).sum::<usize>(), flows.len());
        assert_eq!(
            BalanceEngine::partition_of("0xabc", 4),
            BalanceEngine::partition_of("0xabc", 4)
        );
    }

    #[test]
    fn book_tracks_only_positive_holders() {
        let rows = vec![
            DailyBalance {
                date: d("2026-01-01"),
                address: "0xa".to_string(),
                net_flow: Decimal::from(5),
                cumulative_balance: Decimal::from(5),
            },
            DailyBalance {
                date: d("2026-01-02"),
                address: "0xa".to_string(),
                net_flow: Decimal::from(-5),
                cumulative_balance: Decimal::ZERO,
            },
        ];
        let book = BalanceBook::from_rows(&rows);
        assert_eq!(book.balance("0xa"), Decimal::ZERO);
        assert_eq!(book.holders().count(), 0);
        assert_eq!(rows_by_day(&rows).len(), 2);
    }
}
