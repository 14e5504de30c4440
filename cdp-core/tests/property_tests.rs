//! Property tests for ledger invariants.
//!
//! Uses proptest to verify:
//! 1. Split summation: liquidator + protocol == total collateral
//! 2. Token rounding: a mint never credits less than requested, and a full
//!    burn always clears the holder
//! 3. Share accounting and solvency: position shares sum to token totals,
//!    custody covers collateral supply and circulating debt asset stays within
//!    recorded debt, after any sequence of operations, whether each operation
//!    succeeds or fails

use std::sync::Arc;

use proptest::prelude::*;

use cdp_core::math::PRECISION;
use cdp_core::{
    AccountId, AssetId, InMemoryBank, ManageRequest, ManagerConfig, ManualPriceFeed,
    PositionManager, SplitLiquidationCollateral, SurplusBonusSplit,
};

const P: u128 = PRECISION;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_amount() -> impl Strategy<Value = u128> {
    1u128..1_000_000_000_000_000_000_000_000
}

fn arb_price() -> impl Strategy<Value = u128> {
    1_000_000_000_000u128..1_000_000_000_000_000_000_000_000
}

fn arb_rate() -> impl Strategy<Value = u128> {
    0u128..=P
}

#[derive(Debug, Clone)]
enum Op {
    Open { who: usize, collateral: u128, debt: u128 },
    AddCollateral { who: usize, amount: u128 },
    Withdraw { who: usize, amount: u128 },
    Borrow { who: usize, amount: u128 },
    Repay { who: usize, amount: u128 },
    Close { who: usize },
    Redeem { who: usize, amount: u128 },
    Liquidate { who: usize, target: usize },
    SetPrice { price: u128 },
    AccrueInterest { bump: u128 },
}

fn arb_op() -> impl Strategy<Value = Op> {
    let who = 0usize..4;
    let units = 1u128..500;
    prop_oneof![
        (who.clone(), units.clone(), units.clone()).prop_map(|(who, c, d)| Op::Open {
            who,
            collateral: c * P,
            debt: d * P / 2,
        }),
        (who.clone(), units.clone()).prop_map(|(who, a)| Op::AddCollateral { who, amount: a * P }),
        (who.clone(), units.clone()).prop_map(|(who, a)| Op::Withdraw { who, amount: a * P / 3 }),
        (who.clone(), units.clone()).prop_map(|(who, a)| Op::Borrow { who, amount: a * P / 4 }),
        (who.clone(), units.clone()).prop_map(|(who, a)| Op::Repay { who, amount: a * P / 5 }),
        who.clone().prop_map(|who| Op::Close { who }),
        (who.clone(), units.clone()).prop_map(|(who, a)| Op::Redeem { who, amount: a * P / 2 }),
        (who.clone(), who).prop_map(|(who, target)| Op::Liquidate { who, target }),
        (50u128..300).prop_map(|p| Op::SetPrice { price: p * P / 100 }),
        (0u128..50).prop_map(|b| Op::AccrueInterest { bump: b * P / 1_000 }),
    ]
}

fn apply(
    manager: &mut PositionManager,
    bank: &InMemoryBank,
    feed: &ManualPriceFeed,
    accounts: &[AccountId],
    op: &Op,
) {
    let eth = AssetId::from("ETH");
    // Results are ignored: failures must leave state consistent too.
    let _ = match op {
        Op::Open { who, collateral, debt } => {
            let owner = &accounts[*who];
            bank.fund_collateral(owner, &eth, *collateral);
            manager
                .manage_position(owner, ManageRequest::open(eth, owner.clone(), *collateral, *debt))
                .map(|_| ())
        }
        Op::AddCollateral { who, amount } => {
            let owner = &accounts[*who];
            bank.fund_collateral(owner, &eth, *amount);
            manager
                .manage_position(owner, ManageRequest::add_collateral(eth, owner.clone(), *amount))
                .map(|_| ())
        }
        Op::Withdraw { who, amount } => {
            let owner = &accounts[*who];
            manager
                .manage_position(owner, ManageRequest::withdraw_collateral(eth, owner.clone(), *amount))
                .map(|_| ())
        }
        Op::Borrow { who, amount } => {
            let owner = &accounts[*who];
            manager
                .manage_position(owner, ManageRequest::borrow(eth, owner.clone(), *amount))
                .map(|_| ())
        }
        Op::Repay { who, amount } => {
            let owner = &accounts[*who];
            manager
                .manage_position(owner, ManageRequest::repay(eth, owner.clone(), *amount))
                .map(|_| ())
        }
        Op::Close { who } => {
            let owner = &accounts[*who];
            manager
                .manage_position(owner, ManageRequest::close(eth, owner.clone()))
                .map(|_| ())
        }
        Op::Redeem { who, amount } => manager
            .redeem(&accounts[*who], &eth, *amount, P)
            .map(|_| ()),
        Op::Liquidate { who, target } => manager
            .liquidate(&accounts[*who], &accounts[*target], &eth)
            .map(|_| ()),
        Op::SetPrice { price } => {
            feed.set_price(eth, *price);
            Ok(())
        }
        Op::AccrueInterest { bump } => {
            let index = manager.debt_token(&eth).map(|t| t.index()).unwrap_or(P);
            manager
                .set_debt_index(&AccountId::from("gov"), &eth, index + *bump)
                .map(|_| ())
        }
    };
}

// ── 1. Split summation ───────────────────────────────────────────────

proptest! {
    #[test]
    fn split_portions_sum_to_total(
        total in arb_amount(),
        debt in 0u128..1_000_000_000_000_000_000_000_000,
        price in arb_price(),
        bonus in arb_rate(),
        reward in arb_rate(),
    ) {
        let policy = SurplusBonusSplit::new(bonus, reward).unwrap();
        let split = policy.split(total, debt, price).unwrap();
        prop_assert_eq!(split.liquidator + split.protocol, total);
        prop_assert!(split.liquidator <= total);
    }
}

// ── 2. Token rounding ────────────────────────────────────────────────

proptest! {
    /// Opening with C and D credits exactly C and D at unit indexes, and
    /// closing returns every wei.
    #[test]
    fn open_then_close_is_exact(collateral in 2u128..1_000_000, debt in 1u128..1_000) {
        let bank = InMemoryBank::new();
        let feed = Arc::new(ManualPriceFeed::with_price(AssetId::from("ETH"), P));
        let mut manager = PositionManager::new(
            ManagerConfig::new(AccountId::from("gov")),
            Box::new(bank.clone()),
        ).unwrap();
        manager.add_collateral_token(
            &AccountId::from("gov"),
            AssetId::from("ETH"),
            feed,
            Arc::new(SurplusBonusSplit::default()),
        ).unwrap();

        let alice = AccountId::from("alice");
        let eth = AssetId::from("ETH");
        let (collateral, debt) = (collateral * P, debt * P);
        prop_assume!(collateral >= debt * 2);
        bank.fund_collateral(&alice, &eth, collateral);
        manager.manage_position(&alice, ManageRequest::open(eth.clone(), alice.clone(), collateral, debt)).unwrap();

        let (collateral_token, debt_token) = manager.collateral_tokens_for(&eth).unwrap();
        prop_assert_eq!(collateral_token.balance_of(&alice), collateral);
        prop_assert_eq!(debt_token.balance_of(&alice), debt);

        manager.manage_position(&alice, ManageRequest::close(eth.clone(), alice.clone())).unwrap();
        prop_assert_eq!(bank.collateral_balance(&alice, &eth), collateral);
        prop_assert_eq!(bank.stable_supply(), 0);
    }
}

// ── 3. Share accounting ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ledger_stays_consistent_and_solvent_across_random_operations(ops in prop::collection::vec(arb_op(), 1..40)) {
        let bank = InMemoryBank::new();
        let feed = Arc::new(ManualPriceFeed::with_price(AssetId::from("ETH"), P));
        let mut manager = PositionManager::new(
            ManagerConfig::new(AccountId::from("gov")),
            Box::new(bank.clone()),
        ).unwrap();
        manager.add_collateral_token(
            &AccountId::from("gov"),
            AssetId::from("ETH"),
            feed.clone(),
            Arc::new(SurplusBonusSplit::default()),
        ).unwrap();
        let accounts: Vec<AccountId> = ["a", "b", "c", "d"].into_iter().map(AccountId::from).collect();

        let eth = AssetId::from("ETH");
        for op in &ops {
            apply(&mut manager, &bank, &feed, &accounts, op);
            let violations = manager.check_invariants();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);
            let (collateral_token, debt_token) = manager.collateral_tokens_for(&eth).unwrap();
            prop_assert!(collateral_token.total_supply() <= bank.custody(&eth));
            prop_assert!(bank.stable_supply() <= debt_token.total_supply());
        }
    }
}
