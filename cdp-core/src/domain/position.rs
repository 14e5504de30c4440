//! Position record and its ICR ordering key.

use serde::{Deserialize, Serialize};

use super::ids::{AccountId, AssetId};
use crate::math::nominal_ratio;

/// One owner's collateral-plus-debt record for a single collateral asset.
///
/// Holds token *shares*, not amounts: balances follow from the asset's
/// indexable tokens, so an index change rescales every position at once.
/// An open position always has both share counts nonzero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub owner: AccountId,
    pub asset: AssetId,
    pub collateral_shares: u128,
    pub debt_shares: u128,
    /// Creation order within the asset; breaks ICR ties (older first).
    pub sequence: u64,
}

impl Position {
    pub fn new(owner: AccountId, asset: AssetId, sequence: u64) -> Self {
        Self {
            owner,
            asset,
            collateral_shares: 0,
            debt_shares: 0,
            sequence,
        }
    }

    pub fn is_open(&self) -> bool {
        self.collateral_shares > 0 && self.debt_shares > 0
    }

    pub fn is_closed(&self) -> bool {
        self.collateral_shares == 0 && self.debt_shares == 0
    }

    /// Ordering key for the ICR index.
    ///
    /// The share ratio orders positions exactly like their ICRs do: every
    /// position of an asset sees the same price and the same pair of indexes.
    pub fn sort_key(&self) -> SortKey {
        SortKey {
            nominal_ratio: nominal_ratio(self.collateral_shares, self.debt_shares),
            sequence: self.sequence,
        }
    }
}

/// Key of the ICR-ordered index: ascending ratio, then creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub nominal_ratio: u128,
    pub sequence: u64,
}

/// Lifecycle state reported after a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionStatus {
    Active,
    Closed,
}

/// Read-side view of a position with balances resolved through the indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionView {
    pub owner: AccountId,
    pub asset: AssetId,
    pub collateral: u128,
    pub debt: u128,
    pub collateral_shares: u128,
    pub debt_shares: u128,
    /// `None` when no price was available at read time.
    pub icr: Option<u128>,
}
