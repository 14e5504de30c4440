//! CDP Core: fixed-point math, indexable tokens, liquidation split, fee
//! governance and the position manager.
//!
//! This crate contains the accounting engine of the ledger:
//! - 18-decimal fixed-point arithmetic with explicit rounding
//! - Rebasing (indexable) collateral and debt tokens
//! - Pluggable liquidation collateral split policy
//! - Bounded fee parameters and per-owner delegate approvals
//! - ICR-ordered position index
//! - Position manager: manage, redeem, liquidate, governance
//! - `Ledger` handle with the "operation in progress" guard
//! - Price feed and asset bank collaborator traits with in-memory implementations

pub mod bank;
pub mod domain;
pub mod engine;
pub mod governance;
pub mod indexable_token;
pub mod math;
pub mod price_feed;
pub mod split;

pub use bank::{AssetBank, BankError, InMemoryBank, Transfer, TransferJournal};
pub use domain::{AccountId, AssetId, Position, PositionStatus, PositionView};
pub use engine::{
    ErrorKind, Ledger, LedgerSnapshot, LiquidationMode, LiquidationOutcome, ManageRequest,
    ManagerConfig, PositionManager, PositionManagerError, PositionUpdate, RedemptionOutcome,
};
pub use indexable_token::{IndexableToken, TokenError, TokenSide};
pub use math::PRECISION;
pub use price_feed::{ManualPriceFeed, PriceFeed, PriceFeedError};
pub use split::{CollateralSplit, SplitLiquidationCollateral, SurplusBonusSplit};
