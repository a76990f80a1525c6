mod common;

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use common::{day, ingest_config, Harness, ScriptedChain};
use holder_indexer::application::derivation::RecomputeScope;
use holder_indexer::application::query::{QueryFilter, QueryService};
use holder_indexer::domain::models::{
    AddressLabel, DateRange, DerivationComponent, ExchangeFlow, HolderFlagKind,
};
use holder_indexer::infrastructure::persistence::DerivedStore;

fn label(address: &str, label: &str, category: &str) -> AddressLabel {
    AddressLabel {
        address: address.to_string(),
        label: label.to_string(),
        category: category.to_string(),
        confidence: "high".to_string(),
        rationale: "test".to_string(),
        source: "manual".to_string(),
    }
}

/// Foundation distribution followed by a few days of trading; blocks are
/// six hours apart starting 2026-02-10
fn distribution_chain() -> std::sync::Arc<ScriptedChain> {
    let chain = ScriptedChain::new();
    chain.mine_with(&[("0xf0", "0xa1", 1000), ("0xf0", "0xb2", 500), ("0xf0", "0xc3", 250)]);
    chain.mine_with(&[("0xa1", "0xb2", 100)]);
    chain.mine_to(4);
    chain.mine_with(&[("0xb2", "0xd4", 50), ("0xc3", "0xc3", 10)]);
    chain.mine_to(8);
    chain.mine_with(&[("0xa1", "0xe5", 300), ("0xe5", "0xcex", 120)]);
    chain.mine_to(12);
    chain.mine_with(&[("0xd4", "0xa1", 20), ("0xcex", "0xb2", 40)]);
    chain.mine_to(20);
    chain
}

async fn labeled_harness(chain: std::sync::Arc<ScriptedChain>) -> Harness {
    let harness = Harness::new(chain);
    harness
        .store
        .upsert_labels(&[
            label("0xf0", "Foundation", "foundation"),
            label("0xcex", "CEX:Example", "cex"),
        ])
        .await
        .unwrap();
    harness
}

#[tokio::test]
async fn incremental_runs_match_a_full_recompute() {
    let chain = distribution_chain();
    let harness = labeled_harness(chain).await;
    let engine = harness.engine(4);
    let pipeline = harness.pipeline();
    let components = [
        DerivationComponent::Balances,
        DerivationComponent::Supply,
        DerivationComponent::Concentration,
    ];

    engine.backfill(0, Some(10)).await.unwrap();
    pipeline.run(&components, RecomputeScope::Incremental).await.unwrap();
    assert_eq!(
        harness.store.get_cursor(DerivationComponent::Balances).await.unwrap(),
        Some(day("2026-02-11"))
    );

    engine.backfill(0, None).await.unwrap();
    let runs = pipeline.run(&components, RecomputeScope::Incremental).await.unwrap();
    assert!(runs.iter().all(|r| r.span.map(|s| s.after) == Some(Some(day("2026-02-11")))));

    let everything = DateRange::all();
    let balances = harness.store.daily_balances(everything, None).await.unwrap();
    let supply = harness.store.supply(everything).await.unwrap();
    let concentration = harness.store.concentration(everything).await.unwrap();
    let top = harness.store.top_holders(everything, None).await.unwrap();

    pipeline.run(&components, RecomputeScope::All).await.unwrap();
    assert_eq!(harness.store.daily_balances(everything, None).await.unwrap(), balances);
    assert_eq!(harness.store.supply(everything).await.unwrap(), supply);
    assert_eq!(harness.store.concentration(everything).await.unwrap(), concentration);
    assert_eq!(harness.store.top_holders(everything, None).await.unwrap(), top);
    assert_eq!(
        harness.store.get_cursor(DerivationComponent::Balances).await.unwrap(),
        Some(day("2026-02-14"))
    );
}

#[tokio::test]
async fn balances_are_conserved_day_over_day() {
    let harness = labeled_harness(distribution_chain()).await;
    harness.engine(8).backfill(0, None).await.unwrap();
    harness
        .pipeline()
        .run(&[DerivationComponent::Balances], RecomputeScope::All)
        .await
        .unwrap();

    let rows = harness.store.daily_balances(DateRange::all(), None).await.unwrap();
    assert!(!rows.is_empty());

    let mut running: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut per_day: BTreeMap<_, Decimal> = BTreeMap::new();
    for row in &rows {
        assert_ne!(row.net_flow, Decimal::ZERO, "sparse rows only");
        let previous = running.entry(row.address.clone()).or_default();
        assert_eq!(row.cumulative_balance, *previous + row.net_flow, "{:?}", row);
        *previous = row.cumulative_balance;
        *per_day.entry(row.date).or_default() += row.net_flow;
    }
    assert!(per_day.values().all(|net| net.is_zero()));

    // The self-transfer never shows up as activity
    let c3: Vec<_> = rows.iter().filter(|r| r.address == "0xc3").collect();
    assert_eq!(c3.len(), 1);
    assert_eq!(c3[0].cumulative_balance, Decimal::from(250));
}

#[tokio::test]
async fn concentration_stays_within_bounds() {
    let harness = labeled_harness(distribution_chain()).await;
    harness.engine(8).backfill(0, None).await.unwrap();
    harness
        .pipeline()
        .run(&DerivationComponent::ALL, RecomputeScope::All)
        .await
        .unwrap();

    let points = harness.store.concentration(DateRange::all()).await.unwrap();
    assert_eq!(points.len(), 5);
    for point in &points {
        assert!(point.top10_share <= point.top50_share + 1e-9);
        assert!(point.top50_share <= 1.0 + 1e-9);
        if point.holder_count > 0 {
            assert!(point.hhi >= 1.0 / point.holder_count as f64 - 1e-9);
            assert!(point.hhi <= 1.0 + 1e-9);
            assert!((0.0..=1.0).contains(&point.gini));
        }
    }

    // The foundation address never counts as a circulating holder
    let first = &points[0];
    assert_eq!(first.date, day("2026-02-10"));
    assert_eq!(first.holder_count, 3);

    let supply = harness.store.supply(DateRange::all()).await.unwrap();
    assert!(supply
        .iter()
        .all(|p| p.circulating + p.locked == p.total_supply));

    let flows = harness.store.exchange_flows(DateRange::all()).await.unwrap();
    let all_1d: Vec<_> = flows
        .iter()
        .filter(|f| f.exchange == ExchangeFlow::ALL_EXCHANGES && f.time_window == "1d")
        .collect();
    assert_eq!(all_1d.len(), 5);
    let on = |date: &str| all_1d.iter().find(|f| f.asof_date == day(date)).unwrap().net_in;
    assert_eq!(on("2026-02-12"), Decimal::from(120));
    assert_eq!(on("2026-02-13"), Decimal::from(-40));
}

#[tokio::test]
async fn query_surface_filters_by_address_and_range() {
    let harness = labeled_harness(distribution_chain()).await;
    harness.engine(8).backfill(0, None).await.unwrap();
    harness
        .pipeline()
        .run(&[DerivationComponent::Balances], RecomputeScope::All)
        .await
        .unwrap();
    let query = QueryService::new(harness.ledger(), harness.derived());

    let a1 = query.balance_at("0xA1", day("2026-02-12")).await.unwrap().unwrap();
    assert_eq!(a1.cumulative_balance, Decimal::from(600));

    let filter = QueryFilter::new(DateRange::between(day("2026-02-12"), day("2026-02-13")))
        .for_address("0xa1");
    let transfers = query.transfers(&filter).await.unwrap();
    assert_eq!(transfers.len(), 2);
    assert!(transfers
        .iter()
        .all(|t| t.transfer.from == "0xa1" || t.transfer.to == "0xa1"));

    let states = query.sync_states().await.unwrap();
    assert_eq!(states.len(), 1);
    let cursors = query.cursors().await.unwrap();
    assert_eq!(cursors[0], (DerivationComponent::Balances, Some(day("2026-02-14"))));
    assert!(cursors[1..].iter().all(|(_, cursor)| cursor.is_none()));
}

#[tokio::test]
async fn dependent_components_wait_for_balances() {
    let harness = labeled_harness(distribution_chain()).await;
    harness.engine(8).backfill(0, None).await.unwrap();

    let runs = harness
        .pipeline()
        .run(&[DerivationComponent::Supply], RecomputeScope::Incremental)
        .await
        .unwrap();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].span.is_none());
    assert!(harness.store.supply(DateRange::all()).await.unwrap().is_empty());
}

/// Every derived table, for comparing two runs
async fn derived_snapshot(harness: &Harness) -> String {
    let everything = DateRange::all();
    let store = &harness.store;
    format!(
        "{:?}\n{:?}\n{:?}\n{:?}\n{:?}\n{:?}",
        store.daily_balances(everything, None).await.unwrap(),
        store.supply(everything).await.unwrap(),
        store.concentration(everything).await.unwrap(),
        store.top_holders(everything, None).await.unwrap(),
        store.holder_flags(everything, None).await.unwrap(),
        store.exchange_flows(everything).await.unwrap(),
    )
}

#[tokio::test]
async fn history_backfilled_below_the_cursors_is_derived_again() {
    let harness = labeled_harness(distribution_chain()).await;
    let pipeline = harness.pipeline();

    let mut live = ingest_config(4);
    live.start_block = 10;
    harness.engine_with(live).run_live_cycle().await.unwrap();
    pipeline
        .run(&DerivationComponent::ALL, RecomputeScope::Incremental)
        .await
        .unwrap();
    assert_eq!(
        harness.store.get_cursor(DerivationComponent::Balances).await.unwrap(),
        Some(day("2026-02-14"))
    );

    harness.engine(4).backfill(0, Some(9)).await.unwrap();
    for component in DerivationComponent::ALL {
        let cursor = harness.store.get_cursor(component).await.unwrap();
        assert!(cursor.map_or(true, |c| c < day("2026-02-10")), "{:?}", component);
    }

    pipeline
        .run(&DerivationComponent::ALL, RecomputeScope::Incremental)
        .await
        .unwrap();
    let incremental = derived_snapshot(&harness).await;

    let b2 = harness
        .store
        .daily_balances(DateRange::all(), Some("0xb2"))
        .await
        .unwrap();
    assert_eq!(b2.first().map(|r| r.date), Some(day("2026-02-10")));
    assert!(b2.iter().all(|r| r.cumulative_balance > Decimal::ZERO));

    pipeline
        .run(&DerivationComponent::ALL, RecomputeScope::All)
        .await
        .unwrap();
    assert_eq!(derived_snapshot(&harness).await, incremental);
}

#[tokio::test]
async fn gap_in_stored_heights_holds_back_the_horizon() {
    let harness = labeled_harness(distribution_chain()).await;
    let engine = harness.engine(4);
    engine.backfill(0, Some(5)).await.unwrap();
    engine.backfill(12, Some(20)).await.unwrap();

    // Block 5 is the last of the unbroken prefix, on 2026-02-11
    assert_eq!(harness.pipeline().horizon().await.unwrap(), Some(day("2026-02-10")));

    engine.backfill(0, None).await.unwrap();
    assert_eq!(harness.pipeline().horizon().await.unwrap(), Some(day("2026-02-14")));
}

#[tokio::test]
async fn flags_and_flows_match_a_full_recompute_and_overwrite_in_place() {
    let harness = labeled_harness(distribution_chain()).await;
    let engine = harness.engine(4);
    let pipeline = harness.pipeline();
    let components = [
        DerivationComponent::Balances,
        DerivationComponent::Flows,
        DerivationComponent::Flags,
    ];

    engine.backfill(0, Some(10)).await.unwrap();
    pipeline.run(&components, RecomputeScope::Incremental).await.unwrap();
    engine.backfill(0, None).await.unwrap();
    pipeline.run(&components, RecomputeScope::Incremental).await.unwrap();

    let everything = DateRange::all();
    let flags = harness.store.holder_flags(everything, None).await.unwrap();
    let flows = harness.store.exchange_flows(everything).await.unwrap();

    // 0xc3 only ever received (its self-transfer is not an outflow)
    assert!(flags.iter().any(|f| f.address == "0xc3"
        && f.flag == HolderFlagKind::NeverSold
        && f.time_window == "7d"
        && f.asof_date == day("2026-02-14")));

    pipeline.run(&components, RecomputeScope::All).await.unwrap();
    assert_eq!(harness.store.holder_flags(everything, None).await.unwrap(), flags);
    assert_eq!(harness.store.exchange_flows(everything).await.unwrap(), flows);

    // Recomputing again rewrites the same keys instead of adding rows
    pipeline.run(&components, RecomputeScope::All).await.unwrap();
    assert_eq!(harness.store.holder_flags(everything, None).await.unwrap().len(), flags.len());
    assert_eq!(harness.store.exchange_flows(everything).await.unwrap().len(), flows.len());
}
