//! Criterion benchmarks for ledger hot paths.
//!
//! Benchmarks:
//! 1. ICR index maintenance (insert, reinsert, remove)
//! 2. Opening positions through the position manager
//! 3. Redemption traversal across many positions

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use cdp_core::domain::SortKey;
use cdp_core::engine::SortedPositions;
use cdp_core::math::PRECISION;
use cdp_core::{
    AccountId, AssetId, InMemoryBank, ManageRequest, ManagerConfig, ManualPriceFeed,
    PositionManager, SurplusBonusSplit,
};

const P: u128 = PRECISION;

// ── Helpers ──────────────────────────────────────────────────────────

fn manager_with_positions(n: usize) -> (PositionManager, InMemoryBank) {
    let bank = InMemoryBank::new();
    let gov = AccountId::from("gov");
    let eth = AssetId::from("ETH");
    let mut manager =
        PositionManager::new(ManagerConfig::new(gov.clone()), Box::new(bank.clone())).unwrap();
    manager
        .add_collateral_token(
            &gov,
            eth.clone(),
            Arc::new(ManualPriceFeed::with_price(eth.clone(), P)),
            Arc::new(SurplusBonusSplit::default()),
        )
        .unwrap();

    for i in 0..n {
        let owner = AccountId::new(format!("owner-{i}"));
        let collateral = (150 + (i as u128 % 200)) * P;
        bank.fund_collateral(&owner, &eth, collateral);
        manager
            .manage_position(&owner, ManageRequest::open(eth.clone(), owner.clone(), collateral, 100 * P))
            .unwrap();
    }
    (manager, bank)
}

// ── 1. ICR index ─────────────────────────────────────────────────────

fn bench_sorted_positions(c: &mut Criterion) {
    let mut group = c.benchmark_group("sorted_positions");
    for n in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("insert_reinsert", n), &n, |b, &n| {
            let owners: Vec<AccountId> = (0..n).map(|i| AccountId::new(format!("o{i}"))).collect();
            b.iter(|| {
                let mut sorted = SortedPositions::new();
                for (i, owner) in owners.iter().enumerate() {
                    let key = SortKey {
                        nominal_ratio: (i as u128 * 7_919) % 1_000 * P,
                        sequence: i as u64,
                    };
                    sorted.insert(owner.clone(), key);
                }
                for (i, owner) in owners.iter().enumerate().step_by(3) {
                    let key = SortKey {
                        nominal_ratio: (i as u128 * 104_729) % 1_000 * P,
                        sequence: i as u64,
                    };
                    sorted.insert(owner.clone(), key);
                }
                black_box(sorted.first().cloned())
            });
        });
    }
    group.finish();
}

// ── 2. Opening positions ─────────────────────────────────────────────

fn bench_open_positions(c: &mut Criterion) {
    c.bench_function("open_500_positions", |b| {
        b.iter(|| black_box(manager_with_positions(500)));
    });
}

// ── 3. Redemption traversal ──────────────────────────────────────────

fn bench_redemption(c: &mut Criterion) {
    let mut group = c.benchmark_group("redemption");
    group.sample_size(20);
    for n in [100usize, 500] {
        group.bench_with_input(BenchmarkId::new("redeem_half", n), &n, |b, &n| {
            b.iter_batched(
                || manager_with_positions(n),
                |(mut manager, bank)| {
                    let redeemer = AccountId::from("owner-0");
                    let amount = bank.stable_balance(&redeemer);
                    black_box(manager.redeem(&redeemer, &AssetId::from("ETH"), amount, P).ok())
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sorted_positions, bench_open_positions, bench_redemption);
criterion_main!(benches);
