//! Global fee parameters and their governance bounds.

use serde::Serialize;
use thiserror::Error;

use crate::math::{ONE_HUNDRED_PERCENT, PRECISION};

/// Upper bound of the borrowing spread: 1%.
pub const MAX_BORROWING_SPREAD: u128 = PRECISION / 100;

/// Lower bound of the redemption spread: 0.25%.
pub const MIN_REDEMPTION_SPREAD: u128 = PRECISION / 10_000 * 25;

/// Upper bound of the redemption spread: 100%.
pub const MAX_REDEMPTION_SPREAD: u128 = ONE_HUNDRED_PERCENT;

/// Upper bound of the redemption rebate: 100%.
pub const MAX_REDEMPTION_REBATE: u128 = ONE_HUNDRED_PERCENT;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeParameterError {
    #[error("borrowing spread {value} exceeds maximum {max}")]
    BorrowingSpread { value: u128, max: u128 },

    #[error("redemption spread {value} outside [{min}, {max}]")]
    RedemptionSpread { value: u128, min: u128, max: u128 },

    #[error("redemption rebate {value} exceeds maximum {max}")]
    RedemptionRebate { value: u128, max: u128 },
}

/// Borrowing spread, redemption spread and redemption rebate.
///
/// Fields are private: every write goes through a setter that checks the
/// bounds, so a value outside them is never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeParameters {
    borrowing_spread: u128,
    redemption_spread: u128,
    redemption_rebate: u128,
}

impl Default for FeeParameters {
    fn default() -> Self {
        Self {
            borrowing_spread: 0,
            redemption_spread: MIN_REDEMPTION_SPREAD,
            redemption_rebate: 0,
        }
    }
}

impl FeeParameters {
    pub fn new(
        borrowing_spread: u128,
        redemption_spread: u128,
        redemption_rebate: u128,
    ) -> Result<Self, FeeParameterError> {
        let mut fees = Self::default();
        fees.set_borrowing_spread(borrowing_spread)?;
        fees.set_redemption_spread(redemption_spread)?;
        fees.set_redemption_rebate(redemption_rebate)?;
        Ok(fees)
    }

    pub fn borrowing_spread(&self) -> u128 {
        self.borrowing_spread
    }

    pub fn redemption_spread(&self) -> u128 {
        self.redemption_spread
    }

    pub fn redemption_rebate(&self) -> u128 {
        self.redemption_rebate
    }

    pub fn set_borrowing_spread(&mut self, value: u128) -> Result<(), FeeParameterError> {
        if value > MAX_BORROWING_SPREAD {
            return Err(FeeParameterError::BorrowingSpread {
                value,
                max: MAX_BORROWING_SPREAD,
            });
        }
        self.borrowing_spread = value;
        Ok(())
    }

    pub fn set_redemption_spread(&mut self, value: u128) -> Result<(), FeeParameterError> {
        if !(MIN_REDEMPTION_SPREAD..=MAX_REDEMPTION_SPREAD).contains(&value) {
            return Err(FeeParameterError::RedemptionSpread {
                value,
                min: MIN_REDEMPTION_SPREAD,
                max: MAX_REDEMPTION_SPREAD,
            });
        }
        self.redemption_spread = value;
        Ok(())
    }

    pub fn set_redemption_rebate(&mut self, value: u128) -> Result<(), FeeParameterError> {
        if value > MAX_REDEMPTION_REBATE {
            return Err(FeeParameterError::RedemptionRebate {
                value,
                max: MAX_REDEMPTION_REBATE,
            });
        }
        self.redemption_rebate = value;
        Ok(())
    }

    pub fn is_within_bounds(&self) -> bool {
        self.borrowing_spread <= MAX_BORROWING_SPREAD
            && (MIN_REDEMPTION_SPREAD..=MAX_REDEMPTION_SPREAD).contains(&self.redemption_spread)
            && self.redemption_rebate <= MAX_REDEMPTION_REBATE
    }
}
