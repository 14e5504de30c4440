//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cdp_core::{
    AccountId, AssetId, InMemoryBank, ManageRequest, ManagerConfig, ManualPriceFeed,
    PositionManager, PositionUpdate, SurplusBonusSplit, PRECISION,
};

pub const P: u128 = PRECISION;

pub fn gov() -> AccountId {
    AccountId::from("gov")
}

pub fn treasury() -> AccountId {
    AccountId::from("treasury")
}

pub fn eth() -> AssetId {
    AssetId::from("ETH")
}

pub fn account(name: &str) -> AccountId {
    AccountId::from(name)
}

/// A manager with one registered asset (ETH) priced at `price`, plus
/// observer handles on the bank and the feed.
pub struct Fixture {
    pub manager: PositionManager,
    pub bank: InMemoryBank,
    pub feed: Arc<ManualPriceFeed>,
}

pub fn setup(price: u128) -> Fixture {
    let bank = InMemoryBank::new();
    let feed = Arc::new(ManualPriceFeed::with_price(eth(), price));

    let mut config = ManagerConfig::new(gov());
    config.fee_recipient = Some(treasury());
    let mut manager =
        PositionManager::new(config, Box::new(bank.clone())).expect("valid config");
    manager
        .add_collateral_token(
            &gov(),
            eth(),
            feed.clone(),
            Arc::new(SurplusBonusSplit::default()),
        )
        .expect("register ETH");

    Fixture {
        manager,
        bank,
        feed,
    }
}

impl Fixture {
    pub fn fund(&self, who: &AccountId, amount: u128) {
        self.bank.fund_collateral(who, &eth(), amount);
    }

    /// Fund `who` and open a position of `collateral` / `debt` (whole units).
    pub fn open(&mut self, who: &str, collateral: u128, debt: u128) -> PositionUpdate {
        let owner = account(who);
        self.fund(&owner, collateral * P);
        self.manager
            .manage_position(
                &owner,
                ManageRequest::open(eth(), owner.clone(), collateral * P, debt * P),
            )
            .expect("open position")
    }

    pub fn set_price(&self, price: u128) {
        self.feed.set_price(eth(), price);
    }

    pub fn collateral(&self, who: &str) -> u128 {
        self.manager
            .asset(&eth())
            .map(|a| a.collateral_of(&account(who)))
            .unwrap_or(0)
    }

    pub fn debt(&self, who: &str) -> u128 {
        self.manager
            .asset(&eth())
            .map(|a| a.debt_of(&account(who)))
            .unwrap_or(0)
    }

    pub fn wallet(&self, who: &str) -> u128 {
        self.bank.collateral_balance(&account(who), &eth())
    }

    pub fn stable(&self, who: &str) -> u128 {
        self.bank.stable_balance(&account(who))
    }

    pub fn assert_healthy(&self) {
        let violations = self.manager.check_invariants();
        assert!(violations.is_empty(), "invariant violations: {violations:?}");
    }
}
