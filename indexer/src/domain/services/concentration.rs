use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::models::{ConcentrationPoint, TopHolder};

/// Top-holder ranking and inequality metrics over one day's balances
pub struct ConcentrationEngine;

impl ConcentrationEngine {
    /// Top `n` positive balances, balance descending then address ascending
    pub fn top_holders<'a>(
        asof: NaiveDate,
        holders: impl IntoIterator<Item = (&'a str, Decimal)>,
        n: usize,
    ) -> Vec<TopHolder> {
        let mut ranked: Vec<(&str, Decimal)> = holders
            .into_iter()
            .filter(|(_, b)| *b > Decimal::ZERO)
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        ranked
            .into_iter()
            .take(n)
            .enumerate()
            .map(|(i, (address, balance))| TopHolder {
                asof_date: asof,
                rank: i as u32 + 1,
                address: address.to_string(),
                balance,
            })
            .collect()
    }

    /// Metrics over the circulating holders' balances; the spike flag is left unset
    pub fn measure(date: NaiveDate, balances: impl IntoIterator<Item = Decimal>) -> ConcentrationPoint {
        let mut sorted: Vec<Decimal> = balances
            .into_iter()
            .filter(|b| *b > Decimal::ZERO)
            .collect();
        sorted.sort_by(|a, b| b.cmp(a));

        let total: Decimal = sorted.iter().copied().sum();
        if sorted.is_empty() || total.is_zero() {
            return ConcentrationPoint {
                date,
                top10_share: 0.0,
                top50_share: 0.0,
                hhi: 0.0,
                gini: 0.0,
                holder_count: 0,
                spike_flag: false,
            };
        }

        let top_share = |k: usize| -> f64 {
            let top: Decimal = sorted.iter().take(k).copied().sum();
            ratio(top, total)
        };

        let shares: Vec<f64> = sorted.iter().map(|b| ratio(*b, total)).collect();
        let hhi: f64 = shares.iter().map(|s| s * s).sum();

        ConcentrationPoint {
            date,
            top10_share: top_share(10),
            top50_share: top_share(50),
            hhi: hhi.min(1.0),
            gini: gini(&shares),
            holder_count: sorted.len() as u64,
            spike_flag: false,
        }
    }

    /// Whether top10 share or HHI exceeds its average over `trailing` by more than `threshold`
    pub fn is_spike(current: &ConcentrationPoint, trailing: &[ConcentrationPoint], threshold: f64) -> bool {
        if trailing.is_empty() {
            return false;
        }
        let n = trailing.len() as f64;
        let avg_top10 = trailing.iter().map(|p| p.top10_share).sum::<f64>() / n;
        let avg_hhi = trailing.iter().map(|p| p.hhi).sum::<f64>() / n;
        current.top10_share - avg_top10 > threshold || current.hhi - avg_hhi > threshold
    }
}

fn ratio(part: Decimal, total: Decimal) -> f64 {
    (part / total).to_f64().unwrap_or(0.0)
}

/// Gini coefficient of a distribution given as shares summing to one
///
/// Uses the sorted-cumulative form `Σ (2i - n - 1)·x_i / n` over ascending
/// shares, clamped to [0, 1]; fewer than two holders give 0.
pub fn gini(shares: &[f64]) -> f64 {
    let n = shares.len();
    if n < 2 {
        return 0.0;
    }
    let mut ascending = shares.to_vec();
    ascending.sort_by(|a, b| a.total_cmp(b));
    let total: f64 = ascending.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    let n_f = n as f64;
    let weighted: f64 = ascending
        .iter()
        .enumerate()
        .map(|(i, x)| (2.0 * (i as f64 + 1.0) - n_f - 1.0) * x)
        .sum();
    (weighted / (n_f * total)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn ranks_by_balance_then_address() {
        let holders = vec![
            ("0xc", Decimal::from(5)),
            ("0xb", Decimal::from(9)),
            ("0xa", Decimal::from(5)),
            ("0xd", Decimal::ZERO),
        ];
        let top = ConcentrationEngine::top_holders(d("2026-01-01"), holders, 10);
        let order: Vec<&str> = top.iter().map(|h| h.address.as_str()).collect();
        assert_eq!(order, vec!["0xb", "0xa", "0xc"]);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[2].rank, 3);
    }

    #[test]
    fn equal_holders_have_minimal_concentration() {
        let point = ConcentrationEngine::measure(d("2026-01-01"), vec![Decimal::from(10); 100]);
        assert!((point.top10_share - 0.1).abs() < 1e-9);
        assert!((point.top50_share - 0.5).abs() < 1e-9);
        assert!((point.hhi - 0.01).abs() < 1e-9);
        assert!(point.gini.abs() < 1e-9);
        assert_eq!(point.holder_count, 100);
    }

    #[test]
    fn single_holder_is_fully_concentrated() {
        let point = ConcentrationEngine::measure(d("2026-01-01"), vec![Decimal::from(42), Decimal::ZERO]);
        assert_eq!(point.top10_share, 1.0);
        assert!((point.hhi - 1.0).abs() < 1e-9);
        assert_eq!(point.gini, 0.0);
        assert_eq!(point.holder_count, 1);
    }

    #[test]
    fn skewed_distribution_respects_bounds() {
        let mut balances: Vec<Decimal> = (1..=80).map(Decimal::from).collect();
        balances.push(Decimal::from(10_000));
        let point = ConcentrationEngine::measure(d("2026-01-01"), balances);
        let n = point.holder_count as f64;
        assert!(point.top10_share <= point.top50_share);
        assert!(point.top50_share <= 1.0);
        assert!(point.hhi >= 1.0 / n - 1e-12 && point.hhi <= 1.0);
        assert!(point.gini > 0.5 && point.gini <= 1.0);
    }

    #[test]
    fn spike_compares_against_trailing_average() {
        let base = ConcentrationEngine::measure(d("2026-01-01"), vec![Decimal::from(10); 100]);
        let mut current = base.clone();
        current.top10_share = base.top10_share + 0.2;

        assert!(!ConcentrationEngine::is_spike(&current, &[], 0.05));
        assert!(ConcentrationEngine::is_spike(&current, &[base.clone(), base.clone()], 0.05));
        assert!(!ConcentrationEngine::is_spike(&base, &[base.clone()], 0.05));
    }
}
