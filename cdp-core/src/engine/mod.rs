//! Position management engine.
//!
//! - `manager`: construction, governance setters, manage, reads
//! - `redemption` / `liquidation`: the two ways a position is unwound by others
//! - `asset` / `sorted`: per-asset state and the ICR-ordered index
//! - `transaction`: checkpoint + transfer journal rollback
//! - `ledger`: shared handle with the re-entrancy guard

pub mod asset;
pub mod error;
pub mod ledger;
pub mod liquidation;
pub mod manager;
pub mod redemption;
pub mod snapshot;
pub mod sorted;
mod transaction;

pub use asset::CollateralAsset;
pub use error::{ErrorKind, PositionManagerError};
pub use ledger::Ledger;
pub use liquidation::{LiquidationMode, LiquidationOutcome};
pub use manager::{
    ManageRequest, ManagerConfig, PositionManager, PositionUpdate, DEFAULT_MINIMUM_COLLATERAL_RATIO,
};
pub use redemption::{RedemptionOutcome, RedemptionStep};
pub use snapshot::{AssetSnapshot, InvariantViolation, LedgerSnapshot};
pub use sorted::SortedPositions;
