//! Assembles fetched blocks into a validated, committable batch

use std::collections::HashSet;

use crate::domain::errors::IngestError;
use crate::domain::models::Block;
use crate::domain::services::TransferExtractor;
use crate::infrastructure::ledger::FetchedBlock;
use crate::infrastructure::persistence::LedgerBatch;

/// Validates chain linkage and row ownership, then extracts transfers
pub struct BatchBuilder<'a> {
    /// Stored block right below the batch, if any
    anchor: Option<&'a Block>,
    start: u64,
}

impl<'a> BatchBuilder<'a> {
    pub fn new(start: u64, anchor: Option<&'a Block>) -> Self {
        Self { anchor, start }
    }

    pub fn build(&self, fetched: Vec<FetchedBlock>) -> Result<LedgerBatch, IngestError> {
        let mut batch = LedgerBatch::default();
        let mut previous: Option<Block> = self.anchor.cloned();

        for (offset, item) in fetched.into_iter().enumerate() {
            let expected_height = self.start + offset as u64;
            let block = &item.block;
            if block.number != expected_height {
                return Err(IngestError::DataIntegrity(format!(
                    "expected block {}, provider returned {}",
                    expected_height, block.number
                )));
            }
            if let Some(parent) = previous.as_ref() {
                if !block.extends(parent) {
                    return Err(IngestError::ReorgDetected {
                        height: block.number,
                        expected: parent.hash.clone(),
                        actual: block.parent_hash.clone(),
                    });
                }
            }

            let mut hashes: HashSet<&str> = HashSet::with_capacity(item.transactions.len());
            for tx in &item.transactions {
                if tx.block_number != block.number {
                    return Err(IngestError::DataIntegrity(format!(
                        "transaction {} claims block {} inside block {}",
                        tx.hash, tx.block_number, block.number
                    )));
                }
                hashes.insert(tx.hash.as_str());
            }
            if let Some(orphan) = item.traces.iter().find(|t| !hashes.contains(t.tx_hash.as_str())) {
                return Err(IngestError::DataIntegrity(format!(
                    "trace {}:{} has no transaction in block {}",
                    orphan.tx_hash, orphan.trace_index, block.number
                )));
            }

            batch
                .transfers
                .extend(TransferExtractor::extract_all(&item.transactions, &item.traces));
            previous = Some(item.block.clone());
            batch.blocks.push(item.block);
            batch.transactions.extend(item.transactions);
            batch.traces.extend(item.traces);
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Trace, Transaction};
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn block(number: u64, parent: &str) -> Block {
        Block::new(
            number,
            format!("0xh{}", number),
            parent.to_string(),
            Utc.timestamp_opt(1_700_000_000 + number as i64 * 12, 0).unwrap(),
        )
    }

    fn fetched(number: u64, parent: &str) -> FetchedBlock {
        FetchedBlock {
            block: block(number, parent),
            transactions: vec![Transaction {
                hash: format!("0xt{}", number),
                block_number: number,
                from: "0xa".to_string(),
                to: Some("0xb".to_string()),
                value: Decimal::from(5),
                success: Some(true),
                gas_used: Some(21_000),
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
                created_contract: None,
            }],
            traces: vec![],
        }
    }

    #[test]
    fn linked_blocks_build_a_batch() {
        let anchor = block(9, "0xh8");
        let batch = BatchBuilder::new(10, Some(&anchor))
            .build(vec![fetched(10, "0xh9"), fetched(11, "0xh10")])
            .unwrap();
        assert_eq!(batch.blocks.len(), 2);
        assert_eq!(batch.transfers.len(), 2);
    }

    #[test]
    fn anchor_mismatch_is_a_reorg() {
        let anchor = block(9, "0xh8");
        let err = BatchBuilder::new(10, Some(&anchor))
            .build(vec![fetched(10, "0xother")])
            .unwrap_err();
        assert!(matches!(err, IngestError::ReorgDetected { height: 10, .. }));
    }

    #[test]
    fn broken_internal_linkage_is_a_reorg() {
        let err = BatchBuilder::new(10, None)
            .build(vec![fetched(10, "0xh9"), fetched(11, "0xnope")])
            .unwrap_err();
        assert!(err.is_reorg());
    }

    #[test]
    fn stray_trace_is_an_integrity_error() {
        let mut item = fetched(10, "0xh9");
        item.traces.push(Trace {
            tx_hash: "0xunknown".to_string(),
            trace_index: 1,
            from: "0xa".to_string(),
            to: Some("0xb".to_string()),
            value: Decimal::ONE,
            reverted: false,
        });
        let err = BatchBuilder::new(10, None).build(vec![item]).unwrap_err();
        assert!(matches!(err, IngestError::DataIntegrity(_)));
    }
}
