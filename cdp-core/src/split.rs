//! Liquidation collateral split policies.
//!
//! A policy divides the collateral seized from a liquidated position between
//! the liquidator and the protocol. Every policy must satisfy
//! `liquidator + protocol == total_collateral`; the position manager rejects
//! any result that does not.

use serde::{Deserialize, Serialize};

use crate::math::{self, MathError, ONE_HUNDRED_PERCENT};

/// Result of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralSplit {
    pub liquidator: u128,
    pub protocol: u128,
}

impl CollateralSplit {
    /// `None` on overflow, which a conforming policy never produces.
    pub fn total(&self) -> Option<u128> {
        self.liquidator.checked_add(self.protocol)
    }
}

/// Pluggable policy dividing seized collateral.
pub trait SplitLiquidationCollateral: Send + Sync {
    /// Split `total_collateral` given the debt it secured (in debt units) and
    /// the collateral price.
    fn split(
        &self,
        total_collateral: u128,
        total_debt_value: u128,
        price: u128,
    ) -> Result<CollateralSplit, MathError>;

    /// Policy name (for logging and snapshots)
    fn name(&self) -> &str;
}

/// Default policy.
///
/// - Collateral worth more than the debt: the liquidator gets collateral
///   matching the debt plus `bonus_rate` of the surplus.
/// - Otherwise: the liquidator gets `redistributor_reward_rate` of the
///   collateral.
///
/// The protocol receives the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurplusBonusSplit {
    bonus_rate: u128,
    redistributor_reward_rate: u128,
}

impl SurplusBonusSplit {
    pub const DEFAULT_BONUS_RATE: u128 = ONE_HUNDRED_PERCENT / 10;
    pub const DEFAULT_REDISTRIBUTOR_REWARD_RATE: u128 = ONE_HUNDRED_PERCENT / 200;

    /// Both rates must be at most 100%.
    pub fn new(bonus_rate: u128, redistributor_reward_rate: u128) -> Option<Self> {
        if bonus_rate > ONE_HUNDRED_PERCENT || redistributor_reward_rate > ONE_HUNDRED_PERCENT {
            return None;
        }
        Some(Self {
            bonus_rate,
            redistributor_reward_rate,
        })
    }

    pub fn bonus_rate(&self) -> u128 {
        self.bonus_rate
    }

    pub fn redistributor_reward_rate(&self) -> u128 {
        self.redistributor_reward_rate
    }
}

impl Default for SurplusBonusSplit {
    fn default() -> Self {
        Self {
            bonus_rate: Self::DEFAULT_BONUS_RATE,
            redistributor_reward_rate: Self::DEFAULT_REDISTRIBUTOR_REWARD_RATE,
        }
    }
}

impl SplitLiquidationCollateral for SurplusBonusSplit {
    fn split(
        &self,
        total_collateral: u128,
        total_debt_value: u128,
        price: u128,
    ) -> Result<CollateralSplit, MathError> {
        if price == 0 {
            return Err(MathError::DivisionByZero);
        }

        let collateral_value = math::mul_down(total_collateral, price).unwrap_or(u128::MAX);
        let liquidator = if collateral_value > total_debt_value {
            let matching = math::div_up(total_debt_value, price)?.min(total_collateral);
            let surplus = total_collateral - matching;
            matching + math::mul_down(surplus, self.bonus_rate)?
        } else {
            math::mul_down(total_collateral, self.redistributor_reward_rate)?
        };

        Ok(CollateralSplit {
            liquidator,
            protocol: total_collateral - liquidator,
        })
    }

    fn name(&self) -> &str {
        "SurplusBonusSplit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::PRECISION;

    #[test]
    fn surplus_split_pays_matching_collateral_plus_bonus() {
        let policy = SurplusBonusSplit::default();
        // 10 ETH at 150 securing 1000: matching = 6.666..67, surplus = 3.333..33
        let split = policy
            .split(10 * PRECISION, 1_000 * PRECISION, 150 * PRECISION)
            .unwrap();
        let matching = 6_666_666_666_666_666_667;
        let surplus = 10 * PRECISION - matching;
        assert_eq!(split.liquidator, matching + surplus / 10);
        assert_eq!(split.total(), Some(10 * PRECISION));
    }

    #[test]
    fn underwater_split_pays_redistributor_reward() {
        let policy = SurplusBonusSplit::default();
        let split = policy
            .split(10 * PRECISION, 2_000 * PRECISION, 100 * PRECISION)
            .unwrap();
        assert_eq!(split.liquidator, PRECISION / 20); // 0.5% of 10
        assert_eq!(split.protocol, 10 * PRECISION - PRECISION / 20);
    }

    #[test]
    fn exactly_covered_debt_counts_as_underwater() {
        let policy = SurplusBonusSplit::default();
        let split = policy
            .split(10 * PRECISION, 1_000 * PRECISION, 100 * PRECISION)
            .unwrap();
        assert_eq!(split.liquidator, PRECISION / 20);
    }

    #[test]
    fn zero_price_is_rejected() {
        let policy = SurplusBonusSplit::default();
        assert_eq!(
            policy.split(PRECISION, PRECISION, 0),
            Err(MathError::DivisionByZero)
        );
    }

    #[test]
    fn rates_above_one_hundred_percent_are_rejected() {
        assert!(SurplusBonusSplit::new(ONE_HUNDRED_PERCENT + 1, 0).is_none());
        assert!(SurplusBonusSplit::new(0, ONE_HUNDRED_PERCENT + 1).is_none());
        assert!(SurplusBonusSplit::new(ONE_HUNDRED_PERCENT, ONE_HUNDRED_PERCENT).is_some());
    }

    #[test]
    fn full_bonus_gives_everything_to_the_liquidator() {
        let policy = SurplusBonusSplit::new(ONE_HUNDRED_PERCENT, 0).unwrap();
        let split = policy
            .split(10 * PRECISION, 100 * PRECISION, 100 * PRECISION)
            .unwrap();
        assert_eq!(split.liquidator, 10 * PRECISION);
        assert_eq!(split.protocol, 0);
    }
}
