//! Position manager errors and their coarse classification.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bank::BankError;
use crate::domain::{AccountId, AssetId};
use crate::governance::FeeParameterError;
use crate::indexable_token::TokenError;
use crate::math::MathError;
use crate::price_feed::PriceFeedError;

/// Coarse error class reported to callers and asserted by scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authorization,
    ParameterRange,
    State,
    FeeExceeded,
    Reentrancy,
    Collaborator,
    Arithmetic,
}

#[derive(Debug, Error)]
pub enum PositionManagerError {
    // ── Authorization ──
    #[error("caller is not owner: {caller}")]
    NotOwner { caller: AccountId },

    #[error("{caller} is not a whitelisted delegate of {owner}")]
    DelegateNotWhitelisted { caller: AccountId, owner: AccountId },

    // ── Parameter range ──
    #[error(transparent)]
    FeeParameter(#[from] FeeParameterError),

    #[error("split liquidation collateral policy must be set")]
    SplitPolicyMissing,

    #[error("max fee percentage {0} exceeds 100%")]
    InvalidMaxFeePercentage(u128),

    #[error("minimum collateral ratio {0} must exceed 100%")]
    InvalidMinimumCollateralRatio(u128),

    // ── State ──
    #[error("unknown collateral asset {0}")]
    UnknownAsset(AssetId),

    #[error("collateral asset {0} is already registered")]
    AssetAlreadyRegistered(AssetId),

    #[error("collateral asset {0} is disabled")]
    CollateralDisabled(AssetId),

    #[error("no position for {owner} in {asset}")]
    PositionNotFound { owner: AccountId, asset: AssetId },

    #[error("position must have both collateral and debt, or neither")]
    InvalidPosition,

    #[error("debt {debt} below minimum {minimum}")]
    DebtBelowMinimum { debt: u128, minimum: u128 },

    #[error("collateral ratio {icr} below minimum {minimum}")]
    InsufficientCollateralRatio { icr: u128, minimum: u128 },

    #[error("position is not liquidatable: collateral ratio {icr} >= {minimum}")]
    PositionNotLiquidatable { icr: u128, minimum: u128 },

    #[error("cannot redistribute the last position of {0}")]
    CannotRedistributeLastPosition(AssetId),

    #[error("no debt could be redeemed")]
    NothingToRedeem,

    #[error("amount must be nonzero")]
    ZeroAmount,

    #[error("split of {total} returned {liquidator} + {protocol}")]
    InvalidSplit {
        total: u128,
        liquidator: u128,
        protocol: u128,
    },

    #[error("decrease of {requested} exceeds balance {available}")]
    AmountExceedsBalance { requested: u128, available: u128 },

    // ── Fee exceeded ──
    #[error("fee rate {fee_rate} exceeds max fee percentage {max_fee_percentage}")]
    FeeExceeded {
        fee_rate: u128,
        max_fee_percentage: u128,
    },

    // ── Reentrancy ──
    #[error("operation in progress")]
    OperationInProgress,

    // ── Collaborators ──
    #[error("price feed: {0}")]
    PriceFeed(#[from] PriceFeedError),

    #[error("asset bank: {0}")]
    Bank(#[from] BankError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Math(#[from] MathError),
}

impl PositionManagerError {
    pub fn kind(&self) -> ErrorKind {
        use PositionManagerError::*;
        match self {
            NotOwner { .. } | DelegateNotWhitelisted { .. } => ErrorKind::Authorization,
            FeeParameter(_)
            | SplitPolicyMissing
            | InvalidMaxFeePercentage(_)
            | InvalidMinimumCollateralRatio(_) => ErrorKind::ParameterRange,
            UnknownAsset(_)
            | AssetAlreadyRegistered(_)
            | CollateralDisabled(_)
            | PositionNotFound { .. }
            | InvalidPosition
            | DebtBelowMinimum { .. }
            | InsufficientCollateralRatio { .. }
            | PositionNotLiquidatable { .. }
            | CannotRedistributeLastPosition(_)
            | NothingToRedeem
            | ZeroAmount
            | InvalidSplit { .. }
            | AmountExceedsBalance { .. } => ErrorKind::State,
            FeeExceeded { .. } => ErrorKind::FeeExceeded,
            OperationInProgress => ErrorKind::Reentrancy,
            PriceFeed(_) | Bank(_) => ErrorKind::Collaborator,
            Token(TokenError::IndexDecrease { .. } | TokenError::ZeroIndex(_)) => {
                ErrorKind::ParameterRange
            }
            Token(TokenError::InsufficientBalance { .. }) => ErrorKind::State,
            Token(TokenError::Math { .. }) | Math(_) => ErrorKind::Arithmetic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_representative_errors() {
        assert_eq!(
            PositionManagerError::NotOwner {
                caller: "mallory".into()
            }
            .kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            PositionManagerError::SplitPolicyMissing.kind(),
            ErrorKind::ParameterRange
        );
        assert_eq!(PositionManagerError::NothingToRedeem.kind(), ErrorKind::State);
        assert_eq!(
            PositionManagerError::OperationInProgress.kind(),
            ErrorKind::Reentrancy
        );
        assert_eq!(
            PositionManagerError::from(TokenError::ZeroIndex("ETH-d".into())).kind(),
            ErrorKind::ParameterRange
        );
        assert_eq!(
            PositionManagerError::from(MathError::Overflow).kind(),
            ErrorKind::Arithmetic
        );
    }

    #[test]
    fn reentrancy_message_is_operation_in_progress() {
        assert_eq!(
            PositionManagerError::OperationInProgress.to_string(),
            "operation in progress"
        );
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::FeeExceeded).unwrap();
        assert_eq!(json, "\"fee_exceeded\"");
    }
}
