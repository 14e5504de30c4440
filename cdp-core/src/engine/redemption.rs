//! Redemption: exchange stablecoin for collateral at face value, taken from the
//! lowest-ICR positions first.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bank::Transfer;
use crate::domain::{AccountId, AssetId};
use crate::math;

use super::error::PositionManagerError;
use super::manager::{check_max_fee_percentage, PositionManager};
use super::transaction::atomically;

/// What happened to one position during a redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionStep {
    pub owner: AccountId,
    pub debt_redeemed: u128,
    /// Collateral worth `debt_redeemed` at the redemption price.
    pub collateral_redeemed: u128,
    pub fee: u128,
    /// Part of the fee left in the position.
    pub rebate: u128,
    pub closed: bool,
    /// Collateral sent back to the owner when the position closed.
    pub collateral_returned: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionOutcome {
    pub asset: AssetId,
    pub price: u128,
    pub debt_redeemed: u128,
    pub collateral_to_redeemer: u128,
    pub fee_to_recipient: u128,
    pub steps: Vec<RedemptionStep>,
}

impl PositionManager {
    /// Redeem up to `debt_amount` stablecoin from `caller` against the
    /// positions of `asset`, lowest ICR first.
    ///
    /// Positions below the minimum collateral ratio are skipped. Traversal
    /// stops at a position whose partial redemption would leave its debt below
    /// the asset's minimum debt.
    pub fn redeem(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        debt_amount: u128,
        max_fee_percentage: u128,
    ) -> Result<RedemptionOutcome, PositionManagerError> {
        check_max_fee_percentage(max_fee_percentage)?;
        if debt_amount == 0 {
            return Err(PositionManagerError::ZeroAmount);
        }
        let spread = self.fees.redemption_spread();
        let rebate_rate = self.fees.redemption_rebate();
        self.asset(asset)?;
        if spread > max_fee_percentage {
            return Err(PositionManagerError::FeeExceeded {
                fee_rate: spread,
                max_fee_percentage,
            });
        }

        let mcr = self.minimum_collateral_ratio;
        let recipient = self.fee_recipient.clone();
        let book = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))?;
        let price = book.price()?;

        let outcome = atomically(book, self.bank.as_mut(), |tx, book, bank| {
            let mut remaining = debt_amount;
            let mut steps = Vec::new();
            let mut collateral_to_redeemer = 0u128;
            let mut fee_to_recipient = 0u128;

            for owner in book.sorted().owners() {
                if remaining == 0 {
                    break;
                }
                let collateral = book.collateral_of(&owner);
                let debt = book.debt_of(&owner);
                let icr = math::collateral_ratio(collateral, debt, price);
                if icr < mcr {
                    debug!(owner = %owner, icr, "skipping position below minimum ratio");
                    continue;
                }

                let debt_redeemed = remaining.min(debt);
                let full = debt_redeemed == debt;
                if !full && debt - debt_redeemed < book.min_debt() {
                    debug!(owner = %owner, "partial redemption would leave dust debt, stopping");
                    break;
                }

                let gross = math::div_down(debt_redeemed, price)?.min(collateral);
                let fee = math::mul_up(gross, spread)?;
                let rebate = math::mul_down(fee, rebate_rate)?;
                let removed = gross - rebate;
                if !full && removed >= collateral {
                    break;
                }

                tx.touch(book, &owner);
                let mut collateral_returned = 0;
                if full {
                    book.debt_token_mut().burn_all(&owner);
                    collateral_returned = collateral - removed;
                    book.collateral_token_mut().burn_all(&owner);
                } else {
                    book.debt_token_mut().burn(&owner, debt_redeemed)?;
                    book.collateral_token_mut().burn(&owner, removed)?;
                }
                book.sync_position(&owner);

                debug!(
                    owner = %owner,
                    debt_redeemed,
                    collateral = gross,
                    fee,
                    rebate,
                    closed = full,
                    "position redeemed"
                );
                collateral_to_redeemer = math::checked_add(collateral_to_redeemer, gross - fee)?;
                fee_to_recipient = math::checked_add(fee_to_recipient, fee - rebate)?;
                remaining -= debt_redeemed;
                steps.push(RedemptionStep {
                    owner,
                    debt_redeemed,
                    collateral_redeemed: gross,
                    fee,
                    rebate,
                    closed: full,
                    collateral_returned,
                });
            }

            let debt_redeemed = debt_amount - remaining;
            if debt_redeemed == 0 {
                return Err(PositionManagerError::NothingToRedeem);
            }

            tx.transfer(
                bank,
                Transfer::BurnDebt {
                    account: caller.clone(),
                    amount: debt_redeemed,
                },
            )?;
            tx.transfer(
                bank,
                Transfer::WithdrawCollateral {
                    asset: asset.clone(),
                    account: caller.clone(),
                    amount: collateral_to_redeemer,
                },
            )?;
            tx.transfer(
                bank,
                Transfer::WithdrawCollateral {
                    asset: asset.clone(),
                    account: recipient.clone(),
                    amount: fee_to_recipient,
                },
            )?;
            for step in steps.iter().filter(|s| s.closed) {
                tx.transfer(
                    bank,
                    Transfer::WithdrawCollateral {
                        asset: asset.clone(),
                        account: step.owner.clone(),
                        amount: step.collateral_returned,
                    },
                )?;
            }

            Ok(RedemptionOutcome {
                asset: asset.clone(),
                price,
                debt_redeemed,
                collateral_to_redeemer,
                fee_to_recipient,
                steps,
            })
        })?;

        info!(
            caller = %caller,
            asset = %asset,
            debt_redeemed = outcome.debt_redeemed,
            collateral = outcome.collateral_to_redeemer,
            fee = outcome.fee_to_recipient,
            positions = outcome.steps.len(),
            "redemption completed"
        );
        Ok(outcome)
    }
}
