//! Per-asset state: configuration, the two indexable tokens, positions and
//! the ICR-ordered index.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::{AccountId, AssetId, Position, PositionStatus, PositionView};
use crate::indexable_token::{IndexableToken, TokenCheckpoint, TokenSide};
use crate::math::collateral_ratio;
use crate::price_feed::{PriceFeed, PriceFeedError};
use crate::split::SplitLiquidationCollateral;

use super::sorted::SortedPositions;

/// A registered collateral asset and everything the ledger tracks for it.
pub struct CollateralAsset {
    id: AssetId,
    price_feed: Arc<dyn PriceFeed>,
    split_policy: Arc<dyn SplitLiquidationCollateral>,
    enabled: bool,
    min_debt: u128,
    collateral_token: IndexableToken,
    debt_token: IndexableToken,
    positions: HashMap<AccountId, Position>,
    sorted: SortedPositions,
    next_sequence: u64,
}

impl fmt::Debug for CollateralAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollateralAsset")
            .field("id", &self.id)
            .field("price_feed", &self.price_feed.name())
            .field("split_policy", &self.split_policy.name())
            .field("enabled", &self.enabled)
            .field("min_debt", &self.min_debt)
            .field("collateral_token", &self.collateral_token)
            .field("debt_token", &self.debt_token)
            .field("positions", &self.positions.len())
            .finish()
    }
}

impl CollateralAsset {
    pub(crate) fn new(
        id: AssetId,
        price_feed: Arc<dyn PriceFeed>,
        split_policy: Arc<dyn SplitLiquidationCollateral>,
    ) -> Self {
        Self {
            collateral_token: IndexableToken::new(format!("{id}-collateral"), TokenSide::Collateral),
            debt_token: IndexableToken::new(format!("{id}-debt"), TokenSide::Debt),
            id,
            price_feed,
            split_policy,
            enabled: true,
            min_debt: 0,
            positions: HashMap::new(),
            sorted: SortedPositions::new(),
            next_sequence: 0,
        }
    }

    pub fn id(&self) -> &AssetId {
        &self.id
    }

    pub fn price_feed(&self) -> &Arc<dyn PriceFeed> {
        &self.price_feed
    }

    pub fn split_policy(&self) -> &Arc<dyn SplitLiquidationCollateral> {
        &self.split_policy
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn min_debt(&self) -> u128 {
        self.min_debt
    }

    pub fn collateral_token(&self) -> &IndexableToken {
        &self.collateral_token
    }

    pub fn debt_token(&self) -> &IndexableToken {
        &self.debt_token
    }

    pub fn sorted(&self) -> &SortedPositions {
        &self.sorted
    }

    pub fn position(&self, owner: &AccountId) -> Option<&Position> {
        self.positions.get(owner)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn open_positions(&self) -> usize {
        self.positions.len()
    }

    /// Current price from the asset's feed.
    pub fn price(&self) -> Result<u128, PriceFeedError> {
        self.price_feed.get_price(&self.id)
    }

    pub fn collateral_of(&self, owner: &AccountId) -> u128 {
        self.collateral_token.balance_of(owner)
    }

    pub fn debt_of(&self, owner: &AccountId) -> u128 {
        self.debt_token.balance_of(owner)
    }

    pub fn icr_at(&self, owner: &AccountId, price: u128) -> u128 {
        collateral_ratio(self.collateral_of(owner), self.debt_of(owner), price)
    }

    /// Resolved view of `owner`'s position; `price` fills in the ICR.
    pub fn view(&self, owner: &AccountId, price: Option<u128>) -> Option<PositionView> {
        let position = self.positions.get(owner)?;
        let collateral = self.collateral_of(owner);
        let debt = self.debt_of(owner);
        Some(PositionView {
            owner: owner.clone(),
            asset: self.id.clone(),
            collateral,
            debt,
            collateral_shares: position.collateral_shares,
            debt_shares: position.debt_shares,
            icr: price.map(|p| collateral_ratio(collateral, debt, p)),
        })
    }

    /// Views of every open position from lowest to highest ICR.
    pub fn views_by_icr(&self, price: Option<u128>) -> Vec<PositionView> {
        self.sorted
            .iter()
            .filter_map(|(_, owner)| self.view(owner, price))
            .collect()
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub(crate) fn set_min_debt(&mut self, min_debt: u128) {
        self.min_debt = min_debt;
    }

    pub(crate) fn set_split_policy(&mut self, policy: Arc<dyn SplitLiquidationCollateral>) {
        self.split_policy = policy;
    }

    pub(crate) fn collateral_token_mut(&mut self) -> &mut IndexableToken {
        &mut self.collateral_token
    }

    pub(crate) fn debt_token_mut(&mut self) -> &mut IndexableToken {
        &mut self.debt_token
    }

    /// Bring `owner`'s position record and index entry in line with the
    /// token shares. A position with no shares on either side is removed.
    pub(crate) fn sync_position(&mut self, owner: &AccountId) -> PositionStatus {
        let collateral_shares = self.collateral_token.shares_of(owner);
        let debt_shares = self.debt_token.shares_of(owner);

        if collateral_shares == 0 && debt_shares == 0 {
            self.positions.remove(owner);
            self.sorted.remove(owner);
            return PositionStatus::Closed;
        }

        if !self.positions.contains_key(owner) {
            let position = Position::new(owner.clone(), self.id.clone(), self.next_sequence);
            self.next_sequence += 1;
            self.positions.insert(owner.clone(), position);
        }
        if let Some(position) = self.positions.get_mut(owner) {
            position.collateral_shares = collateral_shares;
            position.debt_shares = debt_shares;
            self.sorted.insert(owner.clone(), position.sort_key());
        }
        PositionStatus::Active
    }

    pub(crate) fn checkpoint(&self) -> AssetCheckpoint {
        AssetCheckpoint {
            collateral: self.collateral_token.checkpoint(),
            debt: self.debt_token.checkpoint(),
            positions: Vec::new(),
            next_sequence: self.next_sequence,
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: AssetCheckpoint) {
        self.collateral_token.restore(checkpoint.collateral);
        self.debt_token.restore(checkpoint.debt);
        for (owner, position) in checkpoint.positions {
            match position {
                Some(position) => {
                    self.sorted.insert(owner.clone(), position.sort_key());
                    self.positions.insert(owner, position);
                }
                None => {
                    self.sorted.remove(&owner);
                    self.positions.remove(&owner);
                }
            }
        }
        self.next_sequence = checkpoint.next_sequence;
    }
}

/// Saved asset state: both token checkpoints, plus the prior record of each
/// position touched since the checkpoint was taken.
#[derive(Debug)]
pub(crate) struct AssetCheckpoint {
    collateral: TokenCheckpoint,
    debt: TokenCheckpoint,
    positions: Vec<(AccountId, Option<Position>)>,
    next_sequence: u64,
}

impl AssetCheckpoint {
    /// Record `owner`'s state before it is first modified.
    pub(crate) fn touch(&mut self, asset: &CollateralAsset, owner: &AccountId) {
        if self.positions.iter().any(|(o, _)| o == owner) {
            return;
        }
        self.collateral.record(&asset.collateral_token, owner);
        self.debt.record(&asset.debt_token, owner);
        self.positions
            .push((owner.clone(), asset.positions.get(owner).cloned()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PRECISION;
    use crate::price_feed::ManualPriceFeed;
    use crate::split::SurplusBonusSplit;

    fn eth_asset() -> CollateralAsset {
        CollateralAsset::new(
            AssetId::from("ETH"),
            Arc::new(ManualPriceFeed::with_price("ETH".into(), PRECISION)),
            Arc::new(SurplusBonusSplit::default()),
        )
    }

    #[test]
    fn sync_creates_updates_and_removes_positions() {
        let mut asset = eth_asset();
        let alice = AccountId::from("alice");

        asset.collateral_token_mut().mint(&alice, 2 * PRECISION).unwrap();
        asset.debt_token_mut().mint(&alice, PRECISION).unwrap();
        assert_eq!(asset.sync_position(&alice), PositionStatus::Active);
        assert_eq!(asset.position(&alice).unwrap().sequence, 0);
        assert!(asset.sorted().contains(&alice));

        asset.collateral_token_mut().burn_all(&alice);
        asset.debt_token_mut().burn_all(&alice);
        assert_eq!(asset.sync_position(&alice), PositionStatus::Closed);
        assert!(asset.position(&alice).is_none());
        assert!(asset.sorted().is_empty());
    }

    #[test]
    fn restore_undoes_touched_positions() {
        let mut asset = eth_asset();
        let (alice, bob) = (AccountId::from("alice"), AccountId::from("bob"));
        asset.collateral_token_mut().mint(&alice, 2 * PRECISION).unwrap();
        asset.debt_token_mut().mint(&alice, PRECISION).unwrap();
        asset.sync_position(&alice);

        let mut checkpoint = asset.checkpoint();
        checkpoint.touch(&asset, &alice);
        checkpoint.touch(&asset, &bob);
        asset.collateral_token_mut().burn_all(&alice);
        asset.debt_token_mut().burn_all(&alice);
        asset.sync_position(&alice);
        asset.collateral_token_mut().mint(&bob, 5 * PRECISION).unwrap();
        asset.debt_token_mut().mint(&bob, PRECISION).unwrap();
        asset.sync_position(&bob);

        asset.restore(checkpoint);
        assert_eq!(asset.collateral_of(&alice), 2 * PRECISION);
        assert!(asset.position(&bob).is_none());
        assert_eq!(asset.sorted().owners(), vec![alice]);
        assert!(asset.sorted().is_consistent());
    }

    #[test]
    fn views_follow_icr_order() {
        let mut asset = eth_asset();
        for (name, collateral) in [("rich", 5u128), ("poor", 2), ("mid", 3)] {
            let owner = AccountId::from(name);
            asset
                .collateral_token_mut()
                .mint(&owner, collateral * PRECISION)
                .unwrap();
            asset.debt_token_mut().mint(&owner, PRECISION).unwrap();
            asset.sync_position(&owner);
        }
        let owners: Vec<_> = asset
            .views_by_icr(Some(PRECISION))
            .into_iter()
            .map(|v| v.owner.to_string())
            .collect();
        assert_eq!(owners, vec!["poor", "mid", "rich"]);
    }
}
