//! Asset bank collaborator and the transfer journal.
//!
//! The bank owns the actual movement of base assets: collateral moves between
//! wallets and protocol custody, the pegged debt asset is minted and burned.
//! The position manager records every transfer it makes in a
//! [`TransferJournal`] so a failed operation can hand everything back.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::domain::{AccountId, AssetId};

/// Errors from the asset bank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("{account} holds {available} {asset}, needs {requested}")]
    InsufficientCollateral {
        account: AccountId,
        asset: AssetId,
        requested: u128,
        available: u128,
    },

    #[error("custody holds {available} {asset}, needs {requested}")]
    InsufficientCustody {
        asset: AssetId,
        requested: u128,
        available: u128,
    },

    #[error("{account} holds {available} stablecoin, needs {requested}")]
    InsufficientStable {
        account: AccountId,
        requested: u128,
        available: u128,
    },

    #[error("balance overflow")]
    Overflow,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Transfer primitives for collateral and the pegged debt asset.
pub trait AssetBank: Send {
    /// Move `amount` of `asset` from `from`'s wallet into protocol custody.
    fn deposit_collateral(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u128,
    ) -> Result<(), BankError>;

    /// Move `amount` of `asset` from protocol custody to `to`'s wallet.
    fn withdraw_collateral(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), BankError>;

    fn mint_debt(&mut self, to: &AccountId, amount: u128) -> Result<(), BankError>;

    fn burn_debt(&mut self, from: &AccountId, amount: u128) -> Result<(), BankError>;

    /// Collateral of `asset` currently held in protocol custody.
    fn custody_of(&self, asset: &AssetId) -> u128;

    /// Outstanding supply of the pegged debt asset.
    fn debt_asset_supply(&self) -> u128;
}

/// A single collaborator transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transfer {
    DepositCollateral {
        asset: AssetId,
        account: AccountId,
        amount: u128,
    },
    WithdrawCollateral {
        asset: AssetId,
        account: AccountId,
        amount: u128,
    },
    MintDebt {
        account: AccountId,
        amount: u128,
    },
    BurnDebt {
        account: AccountId,
        amount: u128,
    },
}

impl Transfer {
    pub fn amount(&self) -> u128 {
        match self {
            Transfer::DepositCollateral { amount, .. }
            | Transfer::WithdrawCollateral { amount, .. }
            | Transfer::MintDebt { amount, .. }
            | Transfer::BurnDebt { amount, .. } => *amount,
        }
    }

    /// The transfer that undoes this one.
    pub fn inverse(&self) -> Transfer {
        match self.clone() {
            Transfer::DepositCollateral {
                asset,
                account,
                amount,
            } => Transfer::WithdrawCollateral {
                asset,
                account,
                amount,
            },
            Transfer::WithdrawCollateral {
                asset,
                account,
                amount,
            } => Transfer::DepositCollateral {
                asset,
                account,
                amount,
            },
            Transfer::MintDebt { account, amount } => Transfer::BurnDebt { account, amount },
            Transfer::BurnDebt { account, amount } => Transfer::MintDebt { account, amount },
        }
    }

    fn apply(&self, bank: &mut dyn AssetBank) -> Result<(), BankError> {
        match self {
            Transfer::DepositCollateral {
                asset,
                account,
                amount,
            } => bank.deposit_collateral(asset, account, *amount),
            Transfer::WithdrawCollateral {
                asset,
                account,
                amount,
            } => bank.withdraw_collateral(asset, account, *amount),
            Transfer::MintDebt { account, amount } => bank.mint_debt(account, *amount),
            Transfer::BurnDebt { account, amount } => bank.burn_debt(account, *amount),
        }
    }
}

/// Ordered record of the transfers completed during one operation.
#[derive(Debug, Default)]
pub struct TransferJournal {
    completed: Vec<Transfer>,
}

impl TransferJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perform `transfer` and record it. Zero-amount transfers are skipped.
    pub fn execute(&mut self, bank: &mut dyn AssetBank, transfer: Transfer) -> Result<(), BankError> {
        if transfer.amount() == 0 {
            return Ok(());
        }
        transfer.apply(bank)?;
        self.completed.push(transfer);
        Ok(())
    }

    pub fn completed(&self) -> &[Transfer] {
        &self.completed
    }

    /// Undo every recorded transfer in reverse order.
    pub fn revert(self, bank: &mut dyn AssetBank) {
        for transfer in self.completed.into_iter().rev() {
            if let Err(error) = transfer.inverse().apply(bank) {
                warn!(?transfer, %error, "failed to revert transfer");
            }
        }
    }
}

#[derive(Debug, Default)]
struct BankState {
    collateral: HashMap<(AccountId, AssetId), u128>,
    custody: HashMap<AssetId, u128>,
    stable: HashMap<AccountId, u128>,
    stable_supply: u128,
}

/// In-memory bank. Clones share the same balances, so a test or runner can
/// keep a handle for inspection after moving one into the position manager.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBank {
    state: Arc<Mutex<BankState>>,
}

impl InMemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BankState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Credit `amount` of `asset` to `account`'s wallet from outside the system.
    pub fn fund_collateral(&self, account: &AccountId, asset: &AssetId, amount: u128) {
        let mut state = self.state();
        let balance = state
            .collateral
            .entry((account.clone(), asset.clone()))
            .or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    pub fn collateral_balance(&self, account: &AccountId, asset: &AssetId) -> u128 {
        self.state()
            .collateral
            .get(&(account.clone(), asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn custody(&self, asset: &AssetId) -> u128 {
        self.state().custody.get(asset).copied().unwrap_or(0)
    }

    pub fn stable_balance(&self, account: &AccountId) -> u128 {
        self.state().stable.get(account).copied().unwrap_or(0)
    }

    pub fn stable_supply(&self) -> u128 {
        self.state().stable_supply
    }

    /// Every stablecoin holder with a nonzero balance, sorted by account.
    pub fn stable_holders(&self) -> Vec<(AccountId, u128)> {
        let mut holders: Vec<_> = self
            .state()
            .stable
            .iter()
            .filter(|(_, b)| **b > 0)
            .map(|(a, b)| (a.clone(), *b))
            .collect();
        holders.sort();
        holders
    }
}

impl AssetBank for InMemoryBank {
    fn deposit_collateral(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        amount: u128,
    ) -> Result<(), BankError> {
        let mut state = self.state();
        let key = (from.clone(), asset.clone());
        let available = state.collateral.get(&key).copied().unwrap_or(0);
        if available < amount {
            return Err(BankError::InsufficientCollateral {
                account: from.clone(),
                asset: asset.clone(),
                requested: amount,
                available,
            });
        }
        let custody = state.custody.get(asset).copied().unwrap_or(0);
        let custody = custody.checked_add(amount).ok_or(BankError::Overflow)?;
        state.collateral.insert(key, available - amount);
        state.custody.insert(asset.clone(), custody);
        Ok(())
    }

    fn withdraw_collateral(
        &mut self,
        asset: &AssetId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), BankError> {
        let mut state = self.state();
        let available = state.custody.get(asset).copied().unwrap_or(0);
        if available < amount {
            return Err(BankError::InsufficientCustody {
                asset: asset.clone(),
                requested: amount,
                available,
            });
        }
        let key = (to.clone(), asset.clone());
        let balance = state.collateral.get(&key).copied().unwrap_or(0);
        let balance = balance.checked_add(amount).ok_or(BankError::Overflow)?;
        state.custody.insert(asset.clone(), available - amount);
        state.collateral.insert(key, balance);
        Ok(())
    }

    fn mint_debt(&mut self, to: &AccountId, amount: u128) -> Result<(), BankError> {
        let mut state = self.state();
        let supply = state
            .stable_supply
            .checked_add(amount)
            .ok_or(BankError::Overflow)?;
        let balance = state.stable.get(to).copied().unwrap_or(0);
        // A holder's balance is bounded by the supply.
        state.stable.insert(to.clone(), balance + amount);
        state.stable_supply = supply;
        Ok(())
    }

    fn burn_debt(&mut self, from: &AccountId, amount: u128) -> Result<(), BankError> {
        let mut state = self.state();
        let available = state.stable.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(BankError::InsufficientStable {
                account: from.clone(),
                requested: amount,
                available,
            });
        }
        state.stable.insert(from.clone(), available - amount);
        state.stable_supply -= amount;
        Ok(())
    }

    fn custody_of(&self, asset: &AssetId) -> u128 {
        self.custody(asset)
    }

    fn debt_asset_supply(&self) -> u128 {
        self.stable_supply()
    }
}
