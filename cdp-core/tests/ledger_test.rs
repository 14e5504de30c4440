//! Integration tests for the shared `Ledger` handle.
//!
//! Tests:
//! 1. Re-entrant calls from a collaborator are refused and the outer call rolls back
//! 2. A failing transfer mid-operation reverts earlier transfers
//! 3. A panicking price feed leaves no trace and the ledger stays usable
//! 4. The handle works across threads

mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use cdp_core::{
    AccountId, AssetBank, AssetId, BankError, ErrorKind, InMemoryBank, Ledger, ManageRequest,
    ManagerConfig, ManualPriceFeed, PositionManager, PriceFeed, PriceFeedError, SurplusBonusSplit,
};
use common::*;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

/// Bank that calls back into the ledger while a deposit is in flight.
struct ReentrantBank {
    inner: InMemoryBank,
    ledger: Arc<OnceLock<Ledger>>,
    observed: Arc<Mutex<Vec<ErrorKind>>>,
}

impl AssetBank for ReentrantBank {
    fn deposit_collateral(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u128,
    ) -> Result<(), BankError> {
        if let Some(ledger) = self.ledger.get() {
            let nested = ledger.manage_position(
                from,
                ManageRequest::add_collateral(asset.clone(), from.clone(), 1),
            );
            if let Err(err) = nested {
                self.observed.lock().unwrap().push(err.kind());
                return Err(BankError::Rejected(err.to_string()));
            }
        }
        self.inner.deposit_collateral(asset, from, amount)
    }

    fn withdraw_collateral(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), BankError> {
        self.inner.withdraw_collateral(asset, to, amount)
    }

    fn mint_debt(&mut self, to: &AccountId, amount: u128) -> Result<(), BankError> {
        self.inner.mint_debt(to, amount)
    }

    fn burn_debt(&mut self, from: &AccountId, amount: u128) -> Result<(), BankError> {
        self.inner.burn_debt(from, amount)
    }

    fn custody_of(&self, asset: &AssetId) -> u128 {
        self.inner.custody(asset)
    }

    fn debt_asset_supply(&self) -> u128 {
        self.inner.stable_supply()
    }
}

/// Bank whose stablecoin mint always fails.
struct MintRefusingBank {
    inner: InMemoryBank,
}

impl AssetBank for MintRefusingBank {
    fn deposit_collateral(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u128,
    ) -> Result<(), BankError> {
        self.inner.deposit_collateral(asset, from, amount)
    }

    fn withdraw_collateral(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), BankError> {
        self.inner.withdraw_collateral(asset, to, amount)
    }

    fn mint_debt(&mut self, _to: &AccountId, _amount: u128) -> Result<(), BankError> {
        Err(BankError::Rejected("mint paused".into()))
    }

    fn burn_debt(&mut self, from: &AccountId, amount: u128) -> Result<(), BankError> {
        self.inner.burn_debt(from, amount)
    }

    fn custody_of(&self, asset: &AssetId) -> u128 {
        self.inner.custody(asset)
    }

    fn debt_asset_supply(&self) -> u128 {
        self.inner.stable_supply()
    }
}

/// Feed that panics on the first read after being armed.
struct FlakyFeed {
    armed: AtomicBool,
}

impl PriceFeed for FlakyFeed {
    fn get_price(&self, _asset: &AssetId) -> Result<u128, PriceFeedError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            panic!("price source crashed");
        }
        Ok(P)
    }

    fn name(&self) -> &str {
        "FlakyFeed"
    }
}

fn manager_with(bank: Box<dyn AssetBank>) -> PositionManager {
    let mut manager = PositionManager::new(ManagerConfig::new(gov()), bank).unwrap();
    manager
        .add_collateral_token(
            &gov(),
            eth(),
            Arc::new(ManualPriceFeed::with_price(eth(), P)),
            Arc::new(SurplusBonusSplit::default()),
        )
        .unwrap();
    manager
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[test]
fn reentrant_call_is_refused_and_outer_call_rolls_back() {
    let funds = InMemoryBank::new();
    let cell = Arc::new(OnceLock::new());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let bank = ReentrantBank {
        inner: funds.clone(),
        ledger: cell.clone(),
        observed: observed.clone(),
    };
    let ledger = Ledger::new(manager_with(Box::new(bank)));
    assert!(cell.set(ledger.clone()).is_ok());

    let alice = account("alice");
    funds.fund_collateral(&alice, &eth(), 200 * P);
    let err = ledger
        .manage_position(&alice, ManageRequest::open(eth(), alice.clone(), 200 * P, 100 * P))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert_eq!(*observed.lock().unwrap(), vec![ErrorKind::Reentrancy]);
    let position = ledger
        .inspect(|pm| pm.position(&alice, &eth()).unwrap())
        .unwrap();
    assert!(position.is_none());
    assert_eq!(funds.collateral_balance(&alice, &eth()), 200 * P);
    assert_eq!(funds.stable_supply(), 0);
    assert!(ledger.inspect(|pm| pm.check_invariants()).unwrap().is_empty());
}

#[test]
fn failed_mint_reverts_the_deposit() {
    let funds = InMemoryBank::new();
    let mut manager = manager_with(Box::new(MintRefusingBank {
        inner: funds.clone(),
    }));
    let alice = account("alice");
    funds.fund_collateral(&alice, &eth(), 200 * P);

    let err = manager
        .manage_position(&alice, ManageRequest::open(eth(), alice.clone(), 200 * P, 100 * P))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Collaborator);
    assert_eq!(funds.collateral_balance(&alice, &eth()), 200 * P);
    assert_eq!(funds.custody(&eth()), 0);
    let (collateral_token, debt_token) = manager.collateral_tokens_for(&eth()).unwrap();
    assert_eq!(collateral_token.total_shares(), 0);
    assert_eq!(debt_token.total_shares(), 0);
    assert!(manager.check_invariants().is_empty());
}

#[test]
fn panicking_feed_rolls_back_and_ledger_recovers() {
    let funds = InMemoryBank::new();
    let feed = Arc::new(FlakyFeed {
        armed: AtomicBool::new(true),
    });
    let mut manager = PositionManager::new(ManagerConfig::new(gov()), Box::new(funds.clone())).unwrap();
    manager
        .add_collateral_token(&gov(), eth(), feed.clone(), Arc::new(SurplusBonusSplit::default()))
        .unwrap();
    let ledger = Ledger::new(manager);
    let alice = account("alice");
    funds.fund_collateral(&alice, &eth(), 400 * P);

    // the price is read after both tokens have been minted
    let crashed = panic::catch_unwind(AssertUnwindSafe(|| {
        ledger.manage_position(&alice, ManageRequest::open(eth(), alice.clone(), 200 * P, 100 * P))
    }));
    assert!(crashed.is_err());

    let snapshot = ledger.snapshot().unwrap();
    let asset = snapshot.asset(&eth()).unwrap();
    assert!(asset.positions.is_empty());
    assert_eq!(asset.total_collateral, 0);
    assert_eq!(asset.total_debt, 0);
    assert_eq!(funds.custody(&eth()), 0);
    assert_eq!(funds.stable_supply(), 0);
    assert_eq!(funds.collateral_balance(&alice, &eth()), 400 * P);
    assert!(ledger.inspect(|pm| pm.check_invariants()).unwrap().is_empty());

    // the feed is disarmed and the poisoned lock no longer blocks callers
    ledger
        .manage_position(&alice, ManageRequest::open(eth(), alice.clone(), 200 * P, 100 * P))
        .unwrap();
    assert_eq!(funds.custody(&eth()), 200 * P);
    assert_eq!(funds.stable_supply(), 100 * P);
}

#[test]
fn sequential_calls_from_other_threads_succeed() {
    let funds = InMemoryBank::new();
    let ledger = Ledger::new(manager_with(Box::new(funds.clone())));
    let names = ["alice", "bob", "carol"];
    for name in names {
        funds.fund_collateral(&account(name), &eth(), 200 * P);
    }

    for name in names {
        let handle = ledger.clone();
        std::thread::spawn(move || {
            let owner = account(name);
            handle
                .manage_position(&owner, ManageRequest::open(eth(), owner.clone(), 200 * P, 100 * P))
                .unwrap();
        })
        .join()
        .unwrap();
    }

    let snapshot = ledger.snapshot().unwrap();
    assert_eq!(snapshot.asset(&eth()).unwrap().positions.len(), 3);
    assert_eq!(funds.stable_supply(), 300 * P);
}

#[test]
fn whitelisting_through_the_ledger() {
    let ledger = Ledger::new(manager_with(Box::new(InMemoryBank::new())));
    ledger
        .whitelist_delegate(&account("alice"), &account("bob"), true)
        .unwrap();
    let whitelisted = ledger
        .inspect(|pm| pm.is_delegate_whitelisted(&account("alice"), &account("bob")))
        .unwrap();
    assert!(whitelisted);
}
