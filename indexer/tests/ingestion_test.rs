mod common;

use rust_decimal::Decimal;

use common::{Harness, ScriptedChain};
use holder_indexer::application::indexer::BatchBuilder;
use holder_indexer::domain::errors::IngestError;
use holder_indexer::domain::models::{SyncState, TransferSource};
use holder_indexer::infrastructure::persistence::LedgerStore;

#[tokio::test]
async fn basic_transfer_is_extracted_and_checkpointed() {
    let chain = ScriptedChain::new();
    chain.mine(2);
    chain.mine_with(&[("0xa1", "0xb2", 100)]);
    chain.mine(5);
    let harness = Harness::new(chain.clone());

    let summary = harness.engine(4).backfill(0, None).await.unwrap();
    assert_eq!(summary.blocks, 9);
    assert_eq!(summary.transfers, 1);
    assert_eq!(summary.last_processed_block, Some(8));

    let transfers = harness.store.transfers_between(0, 8).await.unwrap();
    assert_eq!(transfers.len(), 1);
    let transfer = &transfers[0];
    assert_eq!(transfer.block_number, 3);
    assert_eq!(transfer.idx, 0);
    assert_eq!(transfer.from, "0xa1");
    assert_eq!(transfer.to, "0xb2");
    assert_eq!(transfer.value, Decimal::from(100));
    assert_eq!(transfer.source, TransferSource::TopLevel);

    let checkpoint = harness
        .store
        .get_sync_state(SyncState::BACKFILL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.last_processed_block, 8);
    assert_eq!(checkpoint.last_processed_hash, Some(chain.hash_at(8)));
}

#[tokio::test]
async fn replaying_a_committed_range_changes_nothing() {
    let chain = ScriptedChain::new();
    for i in 0..10 {
        chain.mine_with(&[("0xa1", "0xb2", 10 + i), ("0xb2", "0xc3", 1)]);
    }
    let harness = Harness::new(chain.clone());
    harness.engine(3).backfill(0, None).await.unwrap();

    let blocks = harness.store.blocks_between(0, 10).await.unwrap();
    let transactions = harness.store.transactions_between(0, 10).await.unwrap();
    let transfers = harness.store.transfers_between(0, 10).await.unwrap();

    // Re-fetch and re-commit blocks 4..=7 as a crashed run would
    let client = harness.client();
    let mut fetched = Vec::new();
    for height in 4..=7 {
        fetched.push(client.fetch_block(height).await.unwrap());
    }
    let anchor = harness.store.get_block(3).await.unwrap();
    let batch = BatchBuilder::new(4, anchor.as_ref()).build(fetched).unwrap();
    harness
        .store
        .commit_batch(&batch, &SyncState::new("replay", 7, Some(chain.hash_at(7))))
        .await
        .unwrap();

    assert_eq!(harness.store.blocks_between(0, 10).await.unwrap(), blocks);
    assert_eq!(harness.store.transactions_between(0, 10).await.unwrap(), transactions);
    assert_eq!(harness.store.transfers_between(0, 10).await.unwrap(), transfers);
    assert_eq!(transfers.len(), 20);
}

#[tokio::test]
async fn failed_commit_keeps_the_checkpoint_and_resumes() {
    let chain = ScriptedChain::new();
    chain.mine(12);
    let harness = Harness::new(chain.clone());
    let engine = harness.engine(5);

    engine.backfill(0, Some(4)).await.unwrap();
    assert_eq!(harness.checkpoint(SyncState::BACKFILL).await, Some(4));

    harness.store.fail_next_commit();
    let err = engine.backfill(0, Some(12)).await.unwrap_err();
    match err {
        IngestError::BatchFailed { start, end, cause } => {
            assert_eq!((start, end), (5, 9));
            assert!(matches!(*cause, IngestError::Store(_)));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(harness.checkpoint(SyncState::BACKFILL).await, Some(4));
    assert_eq!(harness.store.latest_block().await.unwrap().unwrap().number, 4);

    let summary = engine.backfill(0, Some(12)).await.unwrap();
    assert_eq!(summary.blocks, 8);
    assert_eq!(harness.checkpoint(SyncState::BACKFILL).await, Some(12));
}

#[tokio::test]
async fn transient_fetch_failures_are_retried() {
    let chain = ScriptedChain::new();
    chain.mine(6);
    let harness = Harness::new(chain.clone());

    chain.fail_next_fetches(1);
    let summary = harness.engine(10).backfill(0, None).await.unwrap();
    assert_eq!(summary.last_processed_block, Some(6));
}

#[tokio::test]
async fn shutdown_stops_before_the_next_batch() {
    let chain = ScriptedChain::new();
    chain.mine(10);
    let harness = Harness::new(chain);
    harness.shutdown.send(true).unwrap();

    let err = harness.engine(2).backfill(0, None).await.unwrap_err();
    assert!(matches!(err, IngestError::Cancelled));
    assert!(harness
        .store
        .get_sync_state(SyncState::BACKFILL)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn live_cycle_continues_from_the_stored_chain() {
    let chain = ScriptedChain::new();
    chain.mine(5);
    let harness = Harness::new(chain.clone());
    let engine = harness.engine(4);

    engine.backfill(0, None).await.unwrap();
    chain.mine(3);

    let summary = engine.run_live_cycle().await.unwrap();
    assert_eq!(summary.blocks, 3);
    assert_eq!(summary.last_processed_block, Some(8));

    let idle = engine.run_live_cycle().await.unwrap();
    assert_eq!(idle.blocks, 0);
    assert_eq!(idle.last_processed_block, Some(8));
}

#[tokio::test]
async fn earlier_range_is_ingested_after_a_later_one() {
    let chain = ScriptedChain::new();
    for i in 1..=20 {
        chain.mine_with(&[("0xa1", "0xb2", i)]);
    }
    let harness = Harness::new(chain.clone());
    let engine = harness.engine(4);

    let later = engine.backfill(10, None).await.unwrap();
    assert_eq!(later.blocks, 11);
    assert_eq!(later.last_processed_block, Some(20));

    let earlier = engine.backfill(0, Some(9)).await.unwrap();
    assert_eq!(earlier.blocks, 10);
    assert_eq!(earlier.transfers, 9);
    assert_eq!(earlier.last_processed_block, Some(20));

    // The checkpoint does not move back for the earlier range
    assert_eq!(harness.checkpoint(SyncState::BACKFILL).await, Some(20));
    for height in 0..=20 {
        let stored = harness.store.get_block(height).await.unwrap();
        assert_eq!(stored.map(|b| b.hash), Some(chain.hash_at(height)), "height {}", height);
    }
    assert_eq!(harness.store.transfers_between(0, 20).await.unwrap().len(), 20);

    let rerun = engine.backfill(0, None).await.unwrap();
    assert_eq!(rerun.blocks, 0);
    assert_eq!(rerun.last_processed_block, Some(20));
}

#[tokio::test]
async fn gap_between_ranges_is_filled_without_refetching() {
    let chain = ScriptedChain::new();
    chain.mine(20);
    let harness = Harness::new(chain.clone());
    let engine = harness.engine(4);

    engine.backfill(0, Some(4)).await.unwrap();
    engine.backfill(12, Some(20)).await.unwrap();
    assert!(harness.store.get_block(8).await.unwrap().is_none());

    let summary = engine.backfill(0, Some(20)).await.unwrap();
    assert_eq!(summary.blocks, 7);
    assert_eq!(harness.store.blocks_between(0, 20).await.unwrap().len(), 21);
    assert_eq!(harness.checkpoint(SyncState::BACKFILL).await, Some(20));
}
