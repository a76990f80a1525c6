use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::models::{
    AddressLabel, DatedTransfer, ExchangeFlow, TimeWindow, UnlockProximity,
};

/// Net inflow per exchange per day
pub type DailyExchangeNet = BTreeMap<NaiveDate, BTreeMap<String, Decimal>>;

/// Net flows into labeled exchange wallets over trailing windows
pub struct ExchangeFlowEngine {
    /// address -> exchange name
    directory: HashMap<String, String>,
}

impl ExchangeFlowEngine {
    pub fn new(labels: &[AddressLabel], exchange_categories: &[String]) -> Self {
        let directory = labels
            .iter()
            .filter(|l| l.is_exchange(exchange_categories))
            .map(|l| (l.address.to_lowercase(), l.exchange_name()))
            .collect();
        Self { directory }
    }

    pub fn exchanges(&self) -> BTreeSet<String> {
        self.directory.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Inflow to minus outflow from each exchange, per day
    ///
    /// Moves between two wallets of the same exchange cancel out.
    pub fn daily_net(&self, transfers: &[DatedTransfer]) -> DailyExchangeNet {
        let mut daily: DailyExchangeNet = BTreeMap::new();
        for dated in transfers {
            let t = &dated.transfer;
            if let Some(exchange) = self.directory.get(&t.to) {
                *daily
                    .entry(dated.day)
                    .or_default()
                    .entry(exchange.clone())
                    .or_insert(Decimal::ZERO) += t.value;
            }
            if let Some(exchange) = self.directory.get(&t.from) {
                *daily
                    .entry(dated.day)
                    .or_default()
                    .entry(exchange.clone())
                    .or_insert(Decimal::ZERO) -= t.value;
            }
        }
        daily
    }

    /// One row per exchange and window plus the `ALL` aggregate
    pub fn flows(
        &self,
        asof: NaiveDate,
        windows: &[TimeWindow],
        daily: &DailyExchangeNet,
        proximity: UnlockProximity,
    ) -> Vec<ExchangeFlow> {
        let exchanges = self.exchanges();
        let mut rows = Vec::with_capacity(windows.len() * (exchanges.len() + 1));

        for window in windows {
            let lower = match window.start(asof) {
                Some(start) => Bound::Included(start),
                None => Bound::Unbounded,
            };
            let mut per_exchange: BTreeMap<&str, Decimal> =
                exchanges.iter().map(|e| (e.as_str(), Decimal::ZERO)).collect();
            for (_, day) in daily.range((lower, Bound::Included(asof))) {
                for (exchange, net) in day {
                    if let Some(sum) = per_exchange.get_mut(exchange.as_str()) {
                        *sum += *net;
                    }
                }
            }

            let all: Decimal = per_exchange.values().copied().sum();
            for (exchange, net_in) in per_exchange {
                rows.push(ExchangeFlow {
                    time_window: window.label.clone(),
                    asof_date: asof,
                    exchange: exchange.to_string(),
                    net_in,
                    unlock_proximity: proximity,
                });
            }
            rows.push(ExchangeFlow {
                time_window: window.label.clone(),
                asof_date: asof,
                exchange: ExchangeFlow::ALL_EXCHANGES.to_string(),
                net_in: all,
                unlock_proximity: proximity,
            });
        }
        rows
    }
}

/// Position of `date` relative to the nearest scheduled unlock
///
/// `pre` when an unlock falls within `days` after `date`, `post` when one
/// fell within `days` before it (the unlock day itself is `post`). The closer
/// unlock wins; a tie goes to `post`.
pub fn unlock_proximity(date: NaiveDate, unlock_dates: &BTreeSet<NaiveDate>, days: i64) -> UnlockProximity {
    let since = unlock_dates
        .range(..=date)
        .next_back()
        .map(|u| (date - *u).num_days())
        .filter(|d| *d <= days);
    let until = unlock_dates
        .range((Bound::Excluded(date), Bound::Unbounded))
        .next()
        .map(|u| (*u - date).num_days())
        .filter(|d| *d <= days);

    match (since, until) {
        (Some(s), Some(u)) if u < s => UnlockProximity::Pre,
        (Some(_), _) => UnlockProximity::Post,
        (None, Some(_)) => UnlockProximity::Pre,
        (None, None) => UnlockProximity::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Transfer, TransferSource};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn label(address: &str, label: &str) -> AddressLabel {
        AddressLabel {
            address: address.to_string(),
            label: label.to_string(),
            category: "cex".to_string(),
            confidence: "high".to_string(),
            rationale: "seed list".to_string(),
            source: "manual".to_string(),
        }
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

    fn engine() -> ExchangeFlowEngine {
        ExchangeFlowEngine::new(
            &[
                label("0xbin1", "CEX:Binance"),
                label("0xbin2", "CEX:Binance"),
                label("0xokx", "CEX:OKX"),
            ],
            &["cex".to_string()],
        )
    }

    #[test]
    fn nets_inflow_against_outflow_per_window() {
        let engine = engine();
        let daily = engine.daily_net(&[
            dated("2026-01-01", "0xuser", "0xbin1", 100),
            dated("2026-01-03", "0xbin2", "0xuser", 30),
            dated("2026-01-03", "0xbin1", "0xbin2", 50),
            dated("2026-01-03", "0xokx", "0xbin1", 20),
        ]);
        let rows = engine.flows(
            d("2026-01-03"),
            &[TimeWindow::days(1), TimeWindow::days(3)],
            &daily,
            UnlockProximity::None,
        );
        let find = |w: &str, e: &str| {
            rows.iter()
                .find(|r| r.time_window == w && r.exchange == e)
                .map(|r| r.net_in)
                .unwrap()
        };
        assert_eq!(find("1d", "Binance"), Decimal::from(-10));
        assert_eq!(find("1d", "OKX"), Decimal::from(-20));
        assert_eq!(find("1d", "ALL"), Decimal::from(-30));
        assert_eq!(find("3d", "Binance"), Decimal::from(90));
        assert_eq!(find("3d", "ALL"), Decimal::from(70));
        assert_eq!(rows.len(), 6);
    }

    #[test]
    fn proximity_prefers_the_closer_unlock() {
        let unlocks: BTreeSet<NaiveDate> = [d("2026-02-10"), d("2026-02-16")].into_iter().collect();
        assert_eq!(unlock_proximity(d("2026-02-10"), &unlocks, 3), UnlockProximity::Post);
        assert_eq!(unlock_proximity(d("2026-02-08"), &unlocks, 3), UnlockProximity::Pre);
        assert_eq!(unlock_proximity(d("2026-02-15"), &unlocks, 3), UnlockProximity::Pre);
        assert_eq!(unlock_proximity(d("2026-02-13"), &unlocks, 3), UnlockProximity::Post);
        assert_eq!(unlock_proximity(d("2026-02-01"), &unlocks, 3), UnlockProximity::None);
        assert_eq!(unlock_proximity(d("2026-02-01"), &BTreeSet::new(), 3), UnlockProximity::None);
    }
}
