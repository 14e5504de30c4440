//! Serializable ledger state and invariant checks.

use serde::Serialize;

use crate::domain::{AccountId, AssetId, PositionView};
use crate::governance::{DelegateEntry, FeeParameters};

use super::manager::PositionManager;

/// Full ledger state for reporting and digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSnapshot {
    pub governance_owner: AccountId,
    pub fee_recipient: AccountId,
    pub minimum_collateral_ratio: u128,
    pub fees: FeeParameters,
    pub delegates: Vec<DelegateEntry>,
    pub assets: Vec<AssetSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetSnapshot {
    pub asset: AssetId,
    pub enabled: bool,
    pub min_debt: u128,
    pub price_feed: String,
    pub split_policy: String,
    pub price: Option<u128>,
    pub collateral_index: u128,
    pub debt_index: u128,
    pub total_collateral: u128,
    pub total_debt: u128,
    /// Ascending ICR.
    pub positions: Vec<PositionView>,
}

impl LedgerSnapshot {
    pub fn asset(&self, asset: &AssetId) -> Option<&AssetSnapshot> {
        self.assets.iter().find(|a| &a.asset == asset)
    }
}

/// A broken ledger invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    pub asset: Option<AssetId>,
    pub description: String,
}

impl InvariantViolation {
    fn new(asset: Option<&AssetId>, description: impl Into<String>) -> Self {
        Self {
            asset: asset.cloned(),
            description: description.into(),
        }
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.asset {
            Some(asset) => write!(f, "[{asset}] {}", self.description),
            None => f.write_str(&self.description),
        }
    }
}

impl PositionManager {
    pub fn snapshot(&self) -> LedgerSnapshot {
        let assets = self
            .assets
            .values()
            .map(|book| {
                let price = book.price().ok();
                AssetSnapshot {
                    asset: book.id().clone(),
                    enabled: book.is_enabled(),
                    min_debt: book.min_debt(),
                    price_feed: book.price_feed().name().to_string(),
                    split_policy: book.split_policy().name().to_string(),
                    price,
                    collateral_index: book.collateral_token().index(),
                    debt_index: book.debt_token().index(),
                    total_collateral: book.collateral_token().total_supply(),
                    total_debt: book.debt_token().total_supply(),
                    positions: book.views_by_icr(price),
                }
            })
            .collect();

        LedgerSnapshot {
            governance_owner: self.owner.clone(),
            fee_recipient: self.fee_recipient.clone(),
            minimum_collateral_ratio: self.minimum_collateral_ratio,
            fees: self.fees,
            delegates: self.delegates.entries(),
            assets,
        }
    }

    /// Check the structural and solvency invariants of every asset. Empty
    /// means healthy.
    ///
    /// Solvency: custody of each asset covers its collateral token supply, and
    /// the debt asset in circulation never exceeds the debt recorded against
    /// positions.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        if !self.fees.is_within_bounds() {
            violations.push(InvariantViolation::new(None, "fee parameters out of bounds"));
        }

        for book in self.assets.values() {
            let id = Some(book.id());
            let (collateral_token, debt_token) = (book.collateral_token(), book.debt_token());

            let mut collateral_shares = 0u128;
            let mut debt_shares = 0u128;
            for position in book.positions() {
                collateral_shares = collateral_shares.saturating_add(position.collateral_shares);
                debt_shares = debt_shares.saturating_add(position.debt_shares);
                if !position.is_open() {
                    violations.push(InvariantViolation::new(
                        id,
                        format!("position of {} is stored but not open", position.owner),
                    ));
                }
                if collateral_token.shares_of(&position.owner) != position.collateral_shares
                    || debt_token.shares_of(&position.owner) != position.debt_shares
                {
                    violations.push(InvariantViolation::new(
                        id,
                        format!("position of {} disagrees with token shares", position.owner),
                    ));
                }
                if book.sorted().key_of(&position.owner) != Some(position.sort_key()) {
                    violations.push(InvariantViolation::new(
                        id,
                        format!("ICR index key of {} is stale", position.owner),
                    ));
                }
            }

            if collateral_shares != collateral_token.total_shares() {
                violations.push(InvariantViolation::new(
                    id,
                    format!(
                        "collateral shares {collateral_shares} != token total {}",
                        collateral_token.total_shares()
                    ),
                ));
            }
            if debt_shares != debt_token.total_shares() {
                violations.push(InvariantViolation::new(
                    id,
                    format!(
                        "debt shares {debt_shares} != token total {}",
                        debt_token.total_shares()
                    ),
                ));
            }
            if collateral_token.holder_count() != book.open_positions()
                || debt_token.holder_count() != book.open_positions()
            {
                violations.push(InvariantViolation::new(id, "token holder without a position"));
            }
            if !book.sorted().is_consistent() || book.sorted().len() != book.open_positions() {
                violations.push(InvariantViolation::new(id, "ICR index out of sync"));
            }

            let custody = self.bank.custody_of(book.id());
            if collateral_token.total_supply() > custody {
                violations.push(InvariantViolation::new(
                    id,
                    format!(
                        "collateral supply {} exceeds custody {custody}",
                        collateral_token.total_supply()
                    ),
                ));
            }
        }

        let total_debt = self
            .assets
            .values()
            .fold(0u128, |sum, book| sum.saturating_add(book.debt_token().total_supply()));
        let circulating = self.bank.debt_asset_supply();
        if circulating > total_debt {
            violations.push(InvariantViolation::new(
                None,
                format!("debt asset supply {circulating} exceeds total debt {total_debt}"),
            ));
        }
        violations
    }
}
