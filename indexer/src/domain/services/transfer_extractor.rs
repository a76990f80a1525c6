use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::domain::models::{Trace, Transaction, Transfer, TransferSource};

/// Turns transactions and their call traces into canonical transfer rows
pub struct TransferExtractor;

impl TransferExtractor {
    /// Transfers of one transaction, sorted by idx
    ///
    /// idx 0 is the transaction's own value, kept only when it moved value,
    /// did not fail and has a recipient. Trace rows keep their trace index;
    /// reverted and zero-value frames are dropped.
    pub fn extract(tx: &Transaction, traces: &[Trace]) -> Vec<Transfer> {
        let mut rows: BTreeMap<u32, Transfer> = BTreeMap::new();

        if tx.value > Decimal::ZERO && tx.succeeded() {
            if let Some(to) = tx.recipient() {
                rows.insert(
                    0,
                    Transfer {
                        block_number: tx.block_number,
                        tx_hash: tx.hash.clone(),
                        idx: 0,
                        from: tx.from.clone(),
                        to: to.to_string(),
                        value: tx.value,
                        source: TransferSource::TopLevel,
                    },
                );
            }
        }

        // A failed transaction rolls back every internal movement too
        if tx.succeeded() {
            for trace in traces.iter().filter(|t| t.tx_hash == tx.hash) {
                if trace.reverted || trace.value <= Decimal::ZERO || trace.trace_index == 0 {
                    continue;
                }
                let Some(to) = trace.to.as_ref() else {
                    continue;
                };
                rows.entry(trace.trace_index).or_insert_with(|| Transfer {
                    block_number: tx.block_number,
                    tx_hash: tx.hash.clone(),
                    idx: trace.trace_index,
                    from: trace.from.clone(),
                    to: to.clone(),
                    value: trace.value,
                    source: TransferSource::Trace,
                });
            }
        }

        rows.into_values().collect()
    }

    /// Transfers of a whole block, in transaction order
    pub fn extract_all(transactions: &[Transaction], traces: &[Trace]) -> Vec<Transfer> {
        let mut by_tx: HashMap<&str, Vec<Trace>> = HashMap::new();
        for trace in traces {
            by_tx.entry(trace.tx_hash.as_str()).or_default().push(trace.clone());
        }

        transactions
            .iter()
            .flat_map(|tx| {
                let tx_traces = by_tx.get(tx.hash.as_str()).map(Vec::as_slice).unwrap_or(&[]);
                Self::extract(tx, tx_traces)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(value: u64, success: Option<bool>) -> Transaction {
        Transaction {
            hash: "0xt1".to_string(),
            block_number: 7,
            from: "0xa".to_string(),
            to: Some("0xb".to_string()),
            value: Decimal::from(value),
            success,
            gas_used: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            created_contract: None,
        }
    }

    fn trace(index: u32, value: u64, reverted: bool) -> Trace {
        Trace {
            tx_hash: "0xt1".to_string(),
            trace_index: index,
            from: "0xb".to_string(),
            to: Some(format!("0xc{}", index)),
            value: Decimal::from(value),
            reverted,
        }
    }

    #[test]
    fn top_level_and_trace_movements_are_indexed() {
        let rows = TransferExtractor::extract(&tx(100, Some(true)), &[trace(2, 5, false), trace(1, 10, false)]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().map(|r| r.idx).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(rows[0].source, TransferSource::TopLevel);
        assert_eq!(rows[0].to, "0xb");
        assert_eq!(rows[1].source, TransferSource::Trace);
        assert_eq!(rows[1].to, "0xc1");
    }

    #[test]
    fn zero_value_and_failed_transactions_are_skipped() {
        assert!(TransferExtractor::extract(&tx(0, Some(true)), &[]).is_empty());
        assert!(TransferExtractor::extract(&tx(100, Some(false)), &[trace(1, 5, false)]).is_empty());
    }

    #[test]
    fn unknown_status_counts_as_success() {
        let rows = TransferExtractor::extract(&tx(100, None), &[]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn reverted_and_empty_frames_are_excluded() {
        let rows = TransferExtractor::extract(
            &tx(0, Some(true)),
            &[trace(1, 5, true), trace(2, 0, false), trace(3, 7, false)],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].idx, 3);
    }

    #[test]
    fn contract_creation_pays_the_created_contract() {
        let mut creation = tx(50, Some(true));
        creation.to = None;
        assert!(TransferExtractor::extract(&creation, &[]).is_empty());

        creation.created_contract = Some("0xnew".to_string());
        let rows = TransferExtractor::extract(&creation, &[]);
        assert_eq!(rows[0].to, "0xnew");
    }

    #[test]
    fn duplicate_trace_indices_collapse() {
        let rows = TransferExtractor::extract(&tx(0, Some(true)), &[trace(1, 5, false), trace(1, 5, false)]);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            TransferExtractor::extract(&tx(0, Some(true)), &[trace(1, 5, false), trace(1, 5, false)]),
            rows
        );
    }
}
