//! The position manager.
//!
//! Owns every registered collateral asset, the fee parameters and the
//! delegate registry, and moves base assets through an [`AssetBank`].
//!
//! Every mutating call:
//! 1. checks authorization and parameter ranges,
//! 2. reads the price at most once,
//! 3. mutates tokens and positions, then settles transfers (pulls before pushes),
//! 4. rolls everything back if any step fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bank::{AssetBank, Transfer};
use crate::domain::{AccountId, AssetId, PositionStatus, PositionView};
use crate::governance::{DelegateRegistry, FeeParameters};
use crate::indexable_token::IndexableToken;
use crate::math::{self, collateral_ratio, Rounding, ONE_HUNDRED_PERCENT, PRECISION};
use crate::price_feed::PriceFeed;
use crate::split::SplitLiquidationCollateral;

use super::asset::CollateralAsset;
use super::error::PositionManagerError;
use super::transaction::atomically;

/// Default minimum collateral ratio: 110%.
pub const DEFAULT_MINIMUM_COLLATERAL_RATIO: u128 = PRECISION / 10 * 11;

/// Construction parameters.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub governance_owner: AccountId,
    /// Defaults to the governance owner.
    pub fee_recipient: Option<AccountId>,
    pub minimum_collateral_ratio: u128,
    pub fees: FeeParameters,
}

impl ManagerConfig {
    pub fn new(governance_owner: AccountId) -> Self {
        Self {
            governance_owner,
            fee_recipient: None,
            minimum_collateral_ratio: DEFAULT_MINIMUM_COLLATERAL_RATIO,
            fees: FeeParameters::default(),
        }
    }
}

/// Arguments of [`PositionManager::manage_position`].
///
/// A decrease delta of `u128::MAX` means the entire balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageRequest {
    pub asset: AssetId,
    pub owner: AccountId,
    pub collateral_delta: u128,
    pub is_collateral_increase: bool,
    pub debt_delta: u128,
    pub is_debt_increase: bool,
    pub max_fee_percentage: u128,
}

impl ManageRequest {
    fn base(asset: AssetId, owner: AccountId) -> Self {
        Self {
            asset,
            owner,
            collateral_delta: 0,
            is_collateral_increase: true,
            debt_delta: 0,
            is_debt_increase: true,
            max_fee_percentage: ONE_HUNDRED_PERCENT,
        }
    }

    /// Deposit `collateral` and borrow `debt`.
    pub fn open(asset: AssetId, owner: AccountId, collateral: u128, debt: u128) -> Self {
        Self {
            collateral_delta: collateral,
            debt_delta: debt,
            ..Self::base(asset, owner)
        }
    }

    /// Repay all debt and withdraw all collateral.
    pub fn close(asset: AssetId, owner: AccountId) -> Self {
        Self {
            collateral_delta: u128::MAX,
            is_collateral_increase: false,
            debt_delta: u128::MAX,
            is_debt_increase: false,
            ..Self::base(asset, owner)
        }
    }

    pub fn add_collateral(asset: AssetId, owner: AccountId, amount: u128) -> Self {
        Self {
            collateral_delta: amount,
            ..Self::base(asset, owner)
        }
    }

    pub fn withdraw_collateral(asset: AssetId, owner: AccountId, amount: u128) -> Self {
        Self {
            collateral_delta: amount,
            is_collateral_increase: false,
            ..Self::base(asset, owner)
        }
    }

    pub fn borrow(asset: AssetId, owner: AccountId, amount: u128) -> Self {
        Self {
            debt_delta: amount,
            ..Self::base(asset, owner)
        }
    }

    pub fn repay(asset: AssetId, owner: AccountId, amount: u128) -> Self {
        Self {
            debt_delta: amount,
            is_debt_increase: false,
            ..Self::base(asset, owner)
        }
    }

    pub fn with_max_fee_percentage(mut self, max_fee_percentage: u128) -> Self {
        self.max_fee_percentage = max_fee_percentage;
        self
    }

    fn increases_anything(&self) -> bool {
        (self.is_collateral_increase && self.collateral_delta > 0)
            || (self.is_debt_increase && self.debt_delta > 0)
    }
}

/// Result of a successful manage call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub collateral: u128,
    pub debt: u128,
    pub borrowing_fee: u128,
    pub status: PositionStatus,
}

pub struct PositionManager {
    pub(super) owner: AccountId,
    pub(super) fee_recipient: AccountId,
    pub(super) minimum_collateral_ratio: u128,
    pub(super) fees: FeeParameters,
    pub(super) delegates: DelegateRegistry,
    pub(super) assets: BTreeMap<AssetId, CollateralAsset>,
    pub(super) bank: Box<dyn AssetBank>,
}

impl std::fmt::Debug for PositionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionManager")
            .field("owner", &self.owner)
            .field("fee_recipient", &self.fee_recipient)
            .field("minimum_collateral_ratio", &self.minimum_collateral_ratio)
            .field("fees", &self.fees)
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}

impl PositionManager {
    pub fn new(config: ManagerConfig, bank: Box<dyn AssetBank>) -> Result<Self, PositionManagerError> {
        if config.minimum_collateral_ratio <= ONE_HUNDRED_PERCENT {
            return Err(PositionManagerError::InvalidMinimumCollateralRatio(
                config.minimum_collateral_ratio,
            ));
        }
        let fee_recipient = config
            .fee_recipient
            .unwrap_or_else(|| config.governance_owner.clone());

        info!(
            owner = %config.governance_owner,
            fee_recipient = %fee_recipient,
            mcr = config.minimum_collateral_ratio,
            "position manager created"
        );
        Ok(Self {
            owner: config.governance_owner,
            fee_recipient,
            minimum_collateral_ratio: config.minimum_collateral_ratio,
            fees: config.fees,
            delegates: DelegateRegistry::new(),
            assets: BTreeMap::new(),
            bank,
        })
    }

    // ── Governance ──

    pub fn owner(&self) -> &AccountId {
        &self.owner
    }

    pub fn fee_recipient(&self) -> &AccountId {
        &self.fee_recipient
    }

    pub fn minimum_collateral_ratio(&self) -> u128 {
        self.minimum_collateral_ratio
    }

    pub fn fees(&self) -> &FeeParameters {
        &self.fees
    }

    pub(super) fn ensure_owner(&self, caller: &AccountId) -> Result<(), PositionManagerError> {
        if caller != &self.owner {
            return Err(PositionManagerError::NotOwner {
                caller: caller.clone(),
            });
        }
        Ok(())
    }

    pub fn add_collateral_token(
        &mut self,
        caller: &AccountId,
        asset: AssetId,
        price_feed: Arc<dyn PriceFeed>,
        split_policy: Arc<dyn SplitLiquidationCollateral>,
    ) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        if self.assets.contains_key(&asset) {
            return Err(PositionManagerError::AssetAlreadyRegistered(asset));
        }
        info!(
            asset = %asset,
            price_feed = price_feed.name(),
            split_policy = split_policy.name(),
            "collateral asset registered"
        );
        let book = CollateralAsset::new(asset.clone(), price_feed, split_policy);
        self.assets.insert(asset, book);
        Ok(())
    }

    pub fn set_borrowing_spread(&mut self, caller: &AccountId, value: u128) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        self.fees.set_borrowing_spread(value)?;
        info!(value, "borrowing spread updated");
        Ok(())
    }

    pub fn borrowing_spread(&self) -> u128 {
        self.fees.borrowing_spread()
    }

    pub fn set_redemption_spread(&mut self, caller: &AccountId, value: u128) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        self.fees.set_redemption_spread(value)?;
        info!(value, "redemption spread updated");
        Ok(())
    }

    pub fn redemption_spread(&self) -> u128 {
        self.fees.redemption_spread()
    }

    pub fn set_redemption_rebate(&mut self, caller: &AccountId, value: u128) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        self.fees.set_redemption_rebate(value)?;
        info!(value, "redemption rebate updated");
        Ok(())
    }

    pub fn redemption_rebate(&self) -> u128 {
        self.fees.redemption_rebate()
    }

    /// Replace the liquidation split policy of `asset`. `None` is rejected.
    pub fn set_split_liquidation_collateral(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        policy: Option<Arc<dyn SplitLiquidationCollateral>>,
    ) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        let policy = policy.ok_or(PositionManagerError::SplitPolicyMissing)?;
        let book = self.asset_mut(asset)?;
        info!(asset = %asset, policy = policy.name(), "split policy updated");
        book.set_split_policy(policy);
        Ok(())
    }

    pub fn split_liquidation_collateral(
        &self,
        asset: &AssetId,
    ) -> Result<Arc<dyn SplitLiquidationCollateral>, PositionManagerError> {
        Ok(Arc::clone(self.asset(asset)?.split_policy()))
    }

    pub fn set_fee_recipient(&mut self, caller: &AccountId, recipient: AccountId) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        info!(recipient = %recipient, "fee recipient updated");
        self.fee_recipient = recipient;
        Ok(())
    }

    /// Disabled assets accept only reductions.
    pub fn set_collateral_enabled(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        enabled: bool,
    ) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        self.asset_mut(asset)?.set_enabled(enabled);
        info!(asset = %asset, enabled, "collateral asset toggled");
        Ok(())
    }

    pub fn set_min_debt(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        min_debt: u128,
    ) -> Result<(), PositionManagerError> {
        self.ensure_owner(caller)?;
        self.asset_mut(asset)?.set_min_debt(min_debt);
        info!(asset = %asset, min_debt, "minimum debt updated");
        Ok(())
    }

    /// Accrue interest by advancing the debt index of `asset`.
    ///
    /// The debt added to positions is minted as stablecoin to the fee
    /// recipient, rounded down. Returns the interest minted.
    pub fn set_debt_index(
        &mut self,
        caller: &AccountId,
        asset: &AssetId,
        index: u128,
    ) -> Result<u128, PositionManagerError> {
        self.ensure_owner(caller)?;
        let recipient = self.fee_recipient.clone();
        let book = self
            .assets
            .get_mut(asset)
            .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))?;

        let interest = atomically(book, self.bank.as_mut(), |tx, book, bank| {
            let previous = book.debt_token().index();
            book.debt_token_mut().set_index(index)?;
            let interest = math::mul_div(
                book.debt_token().total_shares(),
                index - previous,
                PRECISION,
                Rounding::Down,
            )?;
            tx.transfer(
                bank,
                Transfer::MintDebt {
                    account: recipient.clone(),
                    amount: interest,
                },
            )?;
            Ok(interest)
        })?;
        info!(asset = %asset, index, interest, "debt index advanced");
        Ok(interest)
    }

    // ── Delegates ──

    /// Enable or disable `delegate` for the caller's own positions.
    pub fn whitelist_delegate(&mut self, caller: &AccountId, delegate: &AccountId, enabled: bool) {
        if self.delegates.set(caller, delegate, enabled) {
            info!(owner = %caller, delegate = %delegate, enabled, "delegate updated");
        }
    }

    pub fn is_delegate_whitelisted(&self, owner: &AccountId, delegate: &AccountId) -> bool {
        self.delegates.is_whitelisted(owner, delegate)
    }

    pub(super) fn ensure_can_manage(&self, caller: &AccountId, owner: &AccountId) -> Result<(), PositionManagerError> {
        if caller == owner || self.delegates.is_whitelisted(owner, caller) {
            return Ok(());
        }
        Err(PositionManagerError::DelegateNotWhitelisted {
            caller: caller.clone(),
            owner: owner.clone(),
        })
    }

    // ── Positions ──

    /// Open, adjust or close `request.owner`'s position.
    ///
    /// Transfers settle with `caller`: it supplies deposited collateral and
    /// repaid stablecoin, and receives withdrawn collateral and borrowed
    /// stablecoin. The borrowing fee is added to the position's debt and
    /// minted to the fee recipient.
    pub fn manage_position(
        &mut self,
        caller: &AccountId,
        request: ManageRequest,
    ) -> Result<PositionUpdate, PositionManagerError> {
        self.ensure_can_manage(caller, &request.owner)?;
        check_max_fee_percentage(request.max_fee_percentage)?;

        let book = self.asset(&request.asset)?;
        if !book.is_enabled() && request.increases_anything() {
            return Err(PositionManagerError::CollateralDisabled(request.asset.clone()));
        }
        let spread = self.fees.borrowing_spread();
        if request.is_debt_increase && request.debt_delta > 0 && spread > request.max_fee_percentage {
            return Err(PositionManagerError::FeeExceeded {
                fee_rate: spread,
                max_fee_percentage: request.max_fee_percentage,
            });
        }

        let mcr = self.minimum_collateral_ratio;
        let recipient = self.fee_recipient.clone();
        let asset = request.asset.clone();
        let owner = request.owner.clone();
        let book = self
            .assets
            .get_mut(&asset)
            .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))?;

        let update = atomically(book, self.bank.as_mut(), |tx, book, bank| {
            tx.touch(book, &owner);

            let mut collateral_in = 0;
            let mut collateral_out = 0;
            if request.collateral_delta > 0 {
                if request.is_collateral_increase {
                    book.collateral_token_mut().mint(&owner, request.collateral_delta)?;
                    collateral_in = request.collateral_delta;
                } else {
                    let available = book.collateral_of(&owner);
                    collateral_out = resolve_decrease(request.collateral_delta, available)?;
                    book.collateral_token_mut().burn(&owner, collateral_out)?;
                }
            }

            let mut borrowed = 0;
            let mut repaid = 0;
            let mut borrowing_fee = 0;
            if request.debt_delta > 0 {
                if request.is_debt_increase {
                    borrowing_fee = math::mul_up(request.debt_delta, spread)?;
                    let total = math::checked_add(request.debt_delta, borrowing_fee)?;
                    book.debt_token_mut().mint(&owner, total)?;
                    borrowed = request.debt_delta;
                } else {
                    let available = book.debt_of(&owner);
                    repaid = resolve_decrease(request.debt_delta, available)?;
                    book.debt_token_mut().burn(&owner, repaid)?;
                }
            }

            let status = book.sync_position(&owner);
            let collateral = book.collateral_of(&owner);
            let debt = book.debt_of(&owner);
            if status == PositionStatus::Active {
                if collateral == 0 || debt == 0 {
                    return Err(PositionManagerError::InvalidPosition);
                }
                if debt < book.min_debt() {
                    return Err(PositionManagerError::DebtBelowMinimum {
                        debt,
                        minimum: book.min_debt(),
                    });
                }
                let price = book.price()?;
                let icr = collateral_ratio(collateral, debt, price);
                if icr < mcr {
                    return Err(PositionManagerError::InsufficientCollateralRatio { icr, minimum: mcr });
                }
            }

            let transfers = [
                Transfer::DepositCollateral {
                    asset: asset.clone(),
                    account: caller.clone(),
                    amount: collateral_in,
                },
                Transfer::BurnDebt {
                    account: caller.clone(),
                    amount: repaid,
                },
                Transfer::WithdrawCollateral {
                    asset: asset.clone(),
                    account: caller.clone(),
                    amount: collateral_out,
                },
                Transfer::MintDebt {
                    account: caller.clone(),
                    amount: borrowed,
                },
                Transfer::MintDebt {
                    account: recipient.clone(),
                    amount: borrowing_fee,
                },
            ];
            for transfer in transfers {
                tx.transfer(bank, transfer)?;
            }

            Ok(PositionUpdate {
                collateral,
                debt,
                borrowing_fee,
                status,
            })
        })?;

        info!(
            caller = %caller,
            owner = %owner,
            asset = %asset,
            collateral = update.collateral,
            debt = update.debt,
            fee = update.borrowing_fee,
            status = ?update.status,
            "position managed"
        );
        Ok(update)
    }

    // ── Reads ──

    pub fn assets(&self) -> impl Iterator<Item = &CollateralAsset> {
        self.assets.values()
    }

    pub fn asset(&self, asset: &AssetId) -> Result<&CollateralAsset, PositionManagerError> {
        self.assets
            .get(asset)
            .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))
    }

    fn asset_mut(&mut self, asset: &AssetId) -> Result<&mut CollateralAsset, PositionManagerError> {
        self.assets
            .get_mut(asset)
            .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))
    }

    /// `(collateral token, debt token)` of `asset`.
    pub fn collateral_tokens_for(
        &self,
        asset: &AssetId,
    ) -> Result<(&IndexableToken, &IndexableToken), PositionManagerError> {
        let book = self.asset(asset)?;
        Ok((book.collateral_token(), book.debt_token()))
    }

    pub fn debt_token(&self, asset: &AssetId) -> Result<&IndexableToken, PositionManagerError> {
        Ok(self.asset(asset)?.debt_token())
    }

    /// Resolved balances of `owner`'s position, `None` if it has none. The ICR
    /// is filled in when the price feed answers.
    pub fn position(&self, owner: &AccountId, asset: &AssetId) -> Result<Option<PositionView>, PositionManagerError> {
        let book = self.asset(asset)?;
        Ok(book.view(owner, book.price().ok()))
    }

    pub fn icr(&self, owner: &AccountId, asset: &AssetId) -> Result<u128, PositionManagerError> {
        let book = self.asset(asset)?;
        if book.position(owner).is_none() {
            return Err(PositionManagerError::PositionNotFound {
                owner: owner.clone(),
                asset: asset.clone(),
            });
        }
        let price = book.price()?;
        Ok(book.icr_at(owner, price))
    }

    /// Open positions of `asset` from lowest to highest ICR.
    pub fn positions_by_icr(&self, asset: &AssetId) -> Result<Vec<PositionView>, PositionManagerError> {
        let book = self.asset(asset)?;
        let views = book.views_by_icr(book.price().ok());
        debug!(asset = %asset, count = views.len(), "positions listed");
        Ok(views)
    }
}

pub(super) fn check_max_fee_percentage(max_fee_percentage: u128) -> Result<(), PositionManagerError> {
    if max_fee_percentage > ONE_HUNDRED_PERCENT {
        return Err(PositionManagerError::InvalidMaxFeePercentage(max_fee_percentage));
    }
    Ok(())
}

/// `u128::MAX` means everything; anything else must not exceed `available`.
fn resolve_decrease(requested: u128, available: u128) -> Result<u128, PositionManagerError> {
    if requested == u128::MAX {
        return Ok(available);
    }
    if requested > available {
        return Err(PositionManagerError::AmountExceedsBalance {
            requested,
            available,
        });
    }
    Ok(requested)
}
