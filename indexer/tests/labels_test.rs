mod common;

use common::{Harness, ScriptedChain};
use holder_indexer::application::inputs::StaticInputLoader;
use holder_indexer::domain::errors::ConfigError;
use holder_indexer::domain::models::TokenUnits;
use holder_indexer::infrastructure::persistence::DerivedStore;

const SEED: &str = "\
# exchange hot wallets
0xAAAA000000000000000000000000000000000001 Binance
0xaaaa000000000000000000000000000000000002

0xaaaa000000000000000000000000000000000003 OKX
";

/// 60 wallets each sending 3 * 10^20 base units to one deposit address
fn fan_in_chain() -> std::sync::Arc<ScriptedChain> {
    let chain = ScriptedChain::new();
    let senders: Vec<String> = (0..60).map(|i| format!("0x5e{:02}", i)).collect();
    for sender in &senders {
        chain.mine_with(&[(sender.as_str(), "0xdeadbeef", 300_000_000_000_000_000_000)]);
    }
    chain
}

#[tokio::test]
async fn seed_list_and_heuristics_are_loaded() {
    let harness = Harness::new(fan_in_chain());
    harness.engine(25).backfill(0, None).await.unwrap();
    let loader = StaticInputLoader::new(harness.ledger(), harness.derived(), TokenUnits::new(18));

    let summary = loader.seed_labels_from(SEED).await.unwrap();
    assert_eq!(summary.seeded, 3);
    assert_eq!(summary.heuristic, 1);

    let labels = harness.store.labels().await.unwrap();
    let binance = labels
        .iter()
        .find(|l| l.address == "0xaaaa000000000000000000000000000000000001")
        .unwrap();
    assert_eq!(binance.label, "CEX:Binance");
    assert_eq!(binance.category, "cex");
    assert_eq!(binance.source, "manual");

    let untagged = labels
        .iter()
        .find(|l| l.address == "0xaaaa000000000000000000000000000000000002")
        .unwrap();
    assert_eq!(untagged.label, "CEX:Exchange");

    let fan_in = labels.iter().find(|l| l.address == "0xdeadbeef").unwrap();
    assert_eq!(fan_in.label, "FanIn");
    assert_eq!(fan_in.category, "unknown");
    assert_eq!(fan_in.confidence, "low");
    assert_eq!(fan_in.source, "heuristic");

    // A second pass never overrides existing labels
    let again = loader.seed_labels_from(SEED).await.unwrap();
    assert_eq!(again.heuristic, 0);
}

#[tokio::test]
async fn malformed_seed_line_is_rejected() {
    let harness = Harness::new(ScriptedChain::new());
    let loader = StaticInputLoader::new(harness.ledger(), harness.derived(), TokenUnits::new(18));

    let err = loader.seed_labels_from("not-an-address Binance\n").await.unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    assert!(harness.store.labels().await.unwrap().is_empty());
}
