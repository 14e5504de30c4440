//! All-or-nothing execution of one ledger operation.
//!
//! State changes are checkpointed lazily (per touched owner) and collaborator
//! transfers are journaled. On error, or if a collaborator panics, the journal
//! is reverted in reverse order and the asset is restored to its checkpoint.
//! A panic is resumed after the rollback.

use std::panic::{self, AssertUnwindSafe};

use tracing::{error, warn};

use crate::bank::{AssetBank, Transfer, TransferJournal};
use crate::domain::AccountId;

use super::asset::{AssetCheckpoint, CollateralAsset};
use super::error::PositionManagerError;

pub(crate) struct Transaction {
    checkpoint: AssetCheckpoint,
    journal: TransferJournal,
}

impl Transaction {
    fn begin(asset: &CollateralAsset) -> Self {
        Self {
            checkpoint: asset.checkpoint(),
            journal: TransferJournal::new(),
        }
    }

    /// Must be called before `owner`'s shares or position are modified.
    pub(crate) fn touch(&mut self, asset: &CollateralAsset, owner: &AccountId) {
        self.checkpoint.touch(asset, owner);
    }

    pub(crate) fn transfer(
        &mut self,
        bank: &mut dyn AssetBank,
        transfer: Transfer,
    ) -> Result<(), PositionManagerError> {
        self.journal.execute(bank, transfer)?;
        Ok(())
    }

    fn rollback(self, asset: &mut CollateralAsset, bank: &mut dyn AssetBank) {
        self.journal.revert(bank);
        asset.restore(self.checkpoint);
    }
}

/// Run `operation` against `asset` and `bank`; on error or panic undo
/// everything it did.
pub(crate) fn atomically<T, F>(
    asset: &mut CollateralAsset,
    bank: &mut dyn AssetBank,
    operation: F,
) -> Result<T, PositionManagerError>
where
    F: FnOnce(&mut Transaction, &mut CollateralAsset, &mut dyn AssetBank) -> Result<T, PositionManagerError>,
{
    let mut tx = Transaction::begin(asset);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        operation(&mut tx, &mut *asset, &mut *bank)
    }));
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => {
            warn!(asset = %asset.id(), %error, "operation failed, rolling back");
            tx.rollback(asset, bank);
            Err(error)
        }
        Err(payload) => {
            error!(asset = %asset.id(), "operation panicked, rolling back");
            tx.rollback(asset, bank);
            panic::resume_unwind(payload)
        }
    }
}
