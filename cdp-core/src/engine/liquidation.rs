//! Liquidation of positions below the minimum collateral ratio.
//!
//! - Regular: collateral is worth more than the debt. The liquidator repays
//!   the debt and receives its split portion; the protocol portion goes to the
//!   fee recipient.
//! - Redistribution: collateral is worth the debt or less. The liquidator pays
//!   nothing and receives its portion; the debt and the protocol portion of the
//!   collateral are spread over the remaining positions by advancing both
//!   token indexes.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bank::Transfer;
use crate::domain::{AccountId, AssetId};
use crate::math::{self, Rounding, PRECISION};

use super::error::PositionManagerError;
use super::manager::PositionManager;
use super::transaction::atomically;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiquidationMode {
    Regular,
    Redistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOutcome {
    pub owner: AccountId,
    pub asset: AssetId,
    pub mode: LiquidationMode,
    pub price: u128,
    pub collateral_seized: u128,
    pub debt_cleared: u128,
    pub liquidator_collateral: u128,
    pub protocol_collateral: u128,
}

impl PositionManager {
    /// Liquidate `owner`'s position in `asset`. Requires ICR below the minimum
    /// collateral ratio.
    pub fn liquidate(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        asset: &AssetId,
    ) -> Result<LiquidationOutcome, PositionManagerError> {
        let mcr = self.minimum_collateral_ratio;
        let recipient = self.fee_recipient.clone();
        let book = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))?;
        if book.position(owner).is_none() {
            return Err(PositionManagerError::PositionNotFound {
                owner: owner.clone(),
                asset: asset.clone(),
            });
        }

        let price = book.price()?;
        let collateral = book.collateral_of(owner);
        let debt = book.debt_of(owner);
        let icr = math::collateral_ratio(collateral, debt, price);
        if icr >= mcr {
            return Err(PositionManagerError::PositionNotLiquidatable { icr, minimum: mcr });
        }

        let split = book.split_policy().split(collateral, debt, price)?;
        if split.total() != Some(collateral) {
            return Err(PositionManagerError::InvalidSplit {
                total: collateral,
                liquidator: split.liquidator,
                protocol: split.protocol,
            });
        }

        let collateral_value = math::mul_down(collateral, price).unwrap_or(u128::MAX);
        let mode = if collateral_value > debt {
            LiquidationMode::Regular
        } else {
            LiquidationMode::Redistribution
        };
        if mode == LiquidationMode::Redistribution && book.open_positions() <= 1 {
            return Err(PositionManagerError::CannotRedistributeLastPosition(asset.clone()));
        }

        let outcome = atomically(book, self.bank.as_mut(), |tx, book, bank| {
            tx.touch(book, owner);
            book.collateral_token_mut().burn_all(owner);
            book.debt_token_mut().burn_all(owner);
            book.sync_position(owner);

            match mode {
                LiquidationMode::Regular => {
                    tx.transfer(
                        bank,
                        Transfer::BurnDebt {
                            account: caller.clone(),
                            amount: debt,
                        },
                    )?;
                    tx.transfer(
                        bank,
                        Transfer::WithdrawCollateral {
                            asset: asset.clone(),
                            account: recipient.clone(),
                            amount: split.protocol,
                        },
                    )?;
                }
                LiquidationMode::Redistribution => {
                    // Per-share increments: remaining debt grows by at least
                    // `debt`, remaining collateral by at most `split.protocol`.
                    let debt_step = math::mul_div(
                        debt,
                        PRECISION,
                        book.debt_token().total_shares(),
                        Rounding::Up,
                    )?;
                    let collateral_step = math::mul_div(
                        split.protocol,
                        PRECISION,
                        book.collateral_token().total_shares(),
                        Rounding::Down,
                    )?;
                    let debt_index = math::checked_add(book.debt_token().index(), debt_step)?;
                    let collateral_index =
                        math::checked_add(book.collateral_token().index(), collateral_step)?;
                    book.debt_token_mut().set_index(debt_index)?;
                    book.collateral_token_mut().set_index(collateral_index)?;
                }
            }

            tx.transfer(
                bank,
                Transfer::WithdrawCollateral {
                    asset: asset.clone(),
                    account: caller.clone(),
                    amount: split.liquidator,
                },
            )?;

            Ok(LiquidationOutcome {
                owner: owner.clone(),
                asset: asset.clone(),
                mode,
                price,
                collateral_seized: collateral,
                debt_cleared: debt,
                liquidator_collateral: split.liquidator,
                protocol_collateral: split.protocol,
            })
        })?;

        info!(
            caller = %caller,
            owner = %owner,
            asset = %asset,
            mode = ?outcome.mode,
            collateral = outcome.collateral_seized,
            debt = outcome.debt_cleared,
            liquidator_collateral = outcome.liquidator_collateral,
            "position liquidated"
        );
        Ok(outcome)
    }
}
