//! Indexable token: rebasing balances backed by a monotonic index.
//!
//! Each holder owns *shares*; the balance is `shares * index / PRECISION`.
//! Advancing the index rescales every holder's balance in O(1) without touching
//! individual records. This is how interest accrual and redistribution of a
//! liquidated position are applied to all positions of an asset at once.
//!
//! Every conversion between amounts and shares rounds in the ledger's favour,
//! and which way that is depends on the [`TokenSide`]: a collateral holder is
//! never credited more than it deposited, a debtor never owes less than it
//! borrowed.
//!
//! Only the position manager mutates tokens: the mutators are crate-private.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AccountId;
use crate::math::{self, MathError, Rounding, PRECISION};

/// Errors from indexable token operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("{symbol}: burn of {requested} exceeds balance {available} of {holder}")]
    InsufficientBalance {
        symbol: String,
        holder: AccountId,
        requested: u128,
        available: u128,
    },

    #[error("{symbol}: index may not decrease ({current} -> {proposed})")]
    IndexDecrease {
        symbol: String,
        current: u128,
        proposed: u128,
    },

    #[error("{0}: index must be nonzero")]
    ZeroIndex(String),

    #[error("{symbol}: {source}")]
    Math {
        symbol: String,
        #[source]
        source: MathError,
    },
}

/// Which side of a position a token records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSide {
    /// Balances and minted shares round down, burned shares round up.
    Collateral,
    /// Balances and minted shares round up, burned shares round down.
    Debt,
}

impl TokenSide {
    fn balance_rounding(self) -> Rounding {
        match self {
            TokenSide::Collateral => Rounding::Down,
            TokenSide::Debt => Rounding::Up,
        }
    }

    fn mint_rounding(self) -> Rounding {
        self.balance_rounding()
    }

    fn burn_rounding(self) -> Rounding {
        match self {
            TokenSide::Collateral => Rounding::Up,
            TokenSide::Debt => Rounding::Down,
        }
    }
}

/// Rebasing balance representation for one side (collateral or debt) of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexableToken {
    symbol: String,
    side: TokenSide,
    index: u128,
    total_shares: u128,
    shares: HashMap<AccountId, u128>,
}

/// Saved token state for rollback: index, total shares and the prior share
/// count of every holder touched since the checkpoint was taken.
#[derive(Debug, Clone)]
pub(crate) struct TokenCheckpoint {
    index: u128,
    total_shares: u128,
    holders: Vec<(AccountId, Option<u128>)>,
}

impl TokenCheckpoint {
    pub(crate) fn record(&mut self, token: &IndexableToken, holder: &AccountId) {
        if self.holders.iter().any(|(h, _)| h == holder) {
            return;
        }
        self.holders
            .push((holder.clone(), token.shares.get(holder).copied()));
    }
}

impl IndexableToken {
    /// A fresh token with `index == PRECISION` (balances equal shares).
    pub fn new(symbol: impl Into<String>, side: TokenSide) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            index: PRECISION,
            total_shares: 0,
            shares: HashMap::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> TokenSide {
        self.side
    }

    pub fn index(&self) -> u128 {
        self.index
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn shares_of(&self, holder: &AccountId) -> u128 {
        self.shares.get(holder).copied().unwrap_or(0)
    }

    pub fn holder_count(&self) -> usize {
        self.shares.len()
    }

    /// Iterate over `(holder, shares)` pairs in unspecified order.
    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, u128)> {
        self.shares.iter().map(|(h, s)| (h, *s))
    }

    /// `shares(holder) * index / PRECISION`, rounded per side.
    pub fn balance_of(&self, holder: &AccountId) -> u128 {
        self.amount_for_shares(self.shares_of(holder))
    }

    /// `total_shares * index / PRECISION`, rounded per side.
    pub fn total_supply(&self) -> u128 {
        self.amount_for_shares(self.total_shares)
    }

    /// Amount represented by `shares` at the current index.
    pub fn amount_for_shares(&self, shares: u128) -> u128 {
        math::mul_div(shares, self.index, PRECISION, self.side.balance_rounding())
            .unwrap_or(u128::MAX)
    }

    /// Shares representing `amount` at the current index.
    pub fn shares_for_amount(&self, amount: u128, rounding: Rounding) -> Result<u128, TokenError> {
        math::mul_div(amount, PRECISION, self.index, rounding).map_err(|source| self.math_error(source))
    }

    /// Mint `amount` to `holder`; creates `amount * PRECISION / index` shares,
    /// rounded down for collateral and up for debt.
    pub(crate) fn mint(&mut self, holder: &AccountId, amount: u128) -> Result<u128, TokenError> {
        if amount == 0 {
            return Ok(0);
        }
        let minted = self.shares_for_amount(amount, self.side.mint_rounding())?;
        if minted == 0 {
            return Ok(0);
        }
        let total = self
            .total_shares
            .checked_add(minted)
            .ok_or_else(|| self.math_error(MathError::Overflow))?;
        let entry = self.shares.entry(holder.clone()).or_insert(0);
        // Holder shares never exceed total shares, so this cannot overflow.
        *entry += minted;
        self.total_shares = total;
        Ok(minted)
    }

    /// Burn `amount` from `holder`; destroys `amount * PRECISION / index`
    /// shares, rounded up for collateral and down for debt. Burning the whole
    /// balance (or `u128::MAX`) destroys every share.
    pub(crate) fn burn(&mut self, holder: &AccountId, amount: u128) -> Result<u128, TokenError> {
        if amount == u128::MAX {
            return Ok(self.burn_all(holder));
        }
        if amount == 0 {
            return Ok(0);
        }
        let available = self.balance_of(holder);
        if amount > available {
            return Err(TokenError::InsufficientBalance {
                symbol: self.symbol.clone(),
                holder: holder.clone(),
                requested: amount,
                available,
            });
        }
        if amount == available {
            return Ok(self.burn_all(holder));
        }
        let held = self.shares_of(holder);
        // amount < balance bounds the share count by held on either side.
        let burned = self
            .shares_for_amount(amount, self.side.burn_rounding())?
            .min(held);
        self.remove_shares(holder, burned);
        Ok(burned)
    }

    /// Burn every share held by `holder`, returning the number burned.
    pub(crate) fn burn_all(&mut self, holder: &AccountId) -> u128 {
        let held = self.shares_of(holder);
        self.remove_shares(holder, held);
        held
    }

    /// Advance the index. The index is monotonically non-decreasing.
    pub(crate) fn set_index(&mut self, index: u128) -> Result<(), TokenError> {
        if index == 0 {
            return Err(TokenError::ZeroIndex(self.symbol.clone()));
        }
        if index < self.index {
            return Err(TokenError::IndexDecrease {
                symbol: self.symbol.clone(),
                current: self.index,
                proposed: index,
            });
        }
        self.index = index;
        Ok(())
    }

    pub(crate) fn checkpoint(&self) -> TokenCheckpoint {
        TokenCheckpoint {
            index: self.index,
            total_shares: self.total_shares,
            holders: Vec::new(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: TokenCheckpoint) {
        self.index = checkpoint.index;
        self.total_shares = checkpoint.total_shares;
        for (holder, shares) in checkpoint.holders {
            match shares {
                Some(s) => {
                    self.shares.insert(holder, s);
                }
                None => {
                    self.shares.remove(&holder);
                }
            }
        }
    }

    fn remove_shares(&mut self, holder: &AccountId, shares: u128) {
        if shares == 0 {
            return;
        }
        if let Some(entry) = self.shares.get_mut(holder) {
            *entry -= shares;
            if *entry == 0 {
                self.shares.remove(holder);
            }
        }
        self.total_shares -= shares;
    }

    fn math_error(&self, source: MathError) -> TokenError {
        TokenError::Math {
            symbol: self.symbol.clone(),
            source,
        }
    }
}
