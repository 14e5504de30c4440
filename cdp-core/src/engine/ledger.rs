//! Shared handle to a [`PositionManager`] with an "operation in progress"
//! guard.
//!
//! Every call enters with `try_lock`. A call that arrives while another is
//! running (including one made from inside a collaborator during that
//! operation) fails immediately instead of blocking.
//!
//! A collaborator panic poisons the lock. Mutating operations restore their
//! checkpoint before the panic leaves the manager, so the next call clears
//! the poison and continues from the rolled-back state.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use tracing::warn;

use crate::domain::{AccountId, AssetId};

use super::error::PositionManagerError;
use super::liquidation::LiquidationOutcome;
use super::manager::{ManageRequest, PositionManager, PositionUpdate};
use super::redemption::RedemptionOutcome;
use super::snapshot::LedgerSnapshot;

#[derive(Debug, Clone)]
pub struct Ledger {
    inner: Arc<Mutex<PositionManager>>,
}

impl Ledger {
    pub fn new(manager: PositionManager) -> Self {
        Self {
            inner: Arc::new(Mutex::new(manager)),
        }
    }

    fn enter(&self) -> Result<MutexGuard<'_, PositionManager>, PositionManagerError> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(PositionManagerError::OperationInProgress),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("ledger lock poisoned by a panicked operation, resuming from its rollback");
                self.inner.clear_poison();
                Ok(poisoned.into_inner())
            }
        }
    }

    /// Run a mutating operation under the guard.
    pub fn execute<T>(
        &self,
        operation: impl FnOnce(&mut PositionManager) -> Result<T, PositionManagerError>,
    ) -> Result<T, PositionManagerError> {
        let mut manager = self.enter()?;
        operation(&mut *manager)
    }

    /// Read the manager under the guard.
    pub fn inspect<T>(
        &self,
        read: impl FnOnce(&PositionManager) -> T,
    ) -> Result<T, PositionManagerError> {
        let manager = self.enter()?;
        Ok(read(&*manager))
    }

    pub fn manage_position(
        &self,
        caller: &AccountId,
        request: ManageRequest,
    ) -> Result<PositionUpdate, PositionManagerError> {
        self.execute(|pm| pm.manage_position(caller, request))
    }

    pub fn redeem(
        &self,
        caller: &AccountId,
        asset: &AssetId,
        debt_amount: u128,
        max_fee_percentage: u128,
    ) -> Result<RedemptionOutcome, PositionManagerError> {
        self.execute(|pm| pm.redeem(caller, asset, debt_amount, max_fee_percentage))
    }

    pub fn liquidate(
        &self,
        caller: &AccountId,
        owner: &AccountId,
        asset: &AssetId,
    ) -> Result<LiquidationOutcome, PositionManagerError> {
        self.execute(|pm| pm.liquidate(caller, owner, asset))
    }

    pub fn whitelist_delegate(
        &self,
        caller: &AccountId,
        delegate: &AccountId,
        enabled: bool,
    ) -> Result<(), PositionManagerError> {
        self.execute(|pm| {
            pm.whitelist_delegate(caller, delegate, enabled);
            Ok(())
        })
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, PositionManagerError> {
        self.inspect(PositionManager::snapshot)
    }
}
