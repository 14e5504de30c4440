//! Deterministic scenario runner.
//!
//! Builds a ledger from a [`LedgerConfig`], applies each scenario step
//! through the shared [`Ledger`] handle, checks ledger invariants after every
//! step, and returns a report with the final state and its digest.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use cdp_core::{
    AccountId, AssetId, ErrorKind, InMemoryBank, Ledger, LedgerSnapshot, LiquidationOutcome,
    ManageRequest, ManagerConfig, ManualPriceFeed, PositionManager, PositionManagerError,
    PositionUpdate, RedemptionOutcome, SplitLiquidationCollateral, PRECISION,
};

use crate::config::{ConfigError, Fixed, LedgerConfig};
use crate::fingerprint::{digest_of, state_digest};
use crate::scenario::{Action, Scenario, Step};

/// Current report schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Why a single step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Ledger(#[from] PositionManagerError),

    #[error("invalid step: {0}")]
    Invalid(String),
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Ledger(e) => e.kind(),
            StepError::Invalid(_) => ErrorKind::ParameterRange,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("step {index} ({op}) failed: {source}")]
    Unexpected {
        index: usize,
        op: &'static str,
        #[source]
        source: StepError,
    },

    #[error("step {index} ({op}) succeeded but {expected:?} was expected")]
    MissingFailure {
        index: usize,
        op: &'static str,
        expected: ErrorKind,
    },

    #[error("step {index} ({op}) failed with {actual:?}, expected {expected:?}: {message}")]
    WrongKind {
        index: usize,
        op: &'static str,
        expected: ErrorKind,
        actual: ErrorKind,
        message: String,
    },

    #[error("invariants broken after step {index} ({op}): {details}")]
    Invariant {
        index: usize,
        op: &'static str,
        details: String,
    },

    #[error(transparent)]
    Ledger(#[from] PositionManagerError),

    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// What a successful step produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    None,
    Position(PositionUpdate),
    Redemption(RedemptionOutcome),
    Liquidation(LiquidationOutcome),
    Interest { minted: u128 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepResult {
    Ok { output: StepOutput },
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub op: &'static str,
    pub expected: Option<ErrorKind>,
    pub result: StepResult,
}

/// Stablecoin holdings in the bank after a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StableSummary {
    pub supply: u128,
    pub holders: Vec<(AccountId, u128)>,
}

/// Everything a scenario run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub schema_version: u32,
    pub scenario: String,
    /// BLAKE3 of the scenario definition.
    pub scenario_digest: String,
    pub steps: Vec<StepRecord>,
    pub final_state: LedgerSnapshot,
    /// BLAKE3 of `final_state`.
    pub state_digest: String,
    pub stable: StableSummary,
}

impl ScenarioReport {
    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.result, StepResult::Failed { .. }))
            .count()
    }
}

/// A ledger wired to an in-memory bank and manual price feeds.
#[derive(Debug, Clone)]
pub struct LedgerHarness {
    ledger: Ledger,
    bank: InMemoryBank,
    feeds: BTreeMap<AssetId, Arc<ManualPriceFeed>>,
    governance_owner: AccountId,
}

impl LedgerHarness {
    pub fn build(config: &LedgerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let owner = config.governance_owner.clone();
        let bank = InMemoryBank::new();
        let manager_config = ManagerConfig {
            governance_owner: owner.clone(),
            fee_recipient: config.fee_recipient.clone(),
            minimum_collateral_ratio: config.minimum_collateral_ratio.value(),
            fees: config.fee_parameters()?,
        };
        let mut manager = PositionManager::new(manager_config, Box::new(bank.clone()))?;

        let mut feeds = BTreeMap::new();
        for asset in &config.assets {
            let feed = Arc::new(match asset.price {
                Some(price) => ManualPriceFeed::with_price(asset.id.clone(), price.value()),
                None => ManualPriceFeed::new(),
            });
            let split = asset.split.as_ref().unwrap_or(&config.split).policy()?;
            manager.add_collateral_token(&owner, asset.id.clone(), feed.clone(), Arc::new(split))?;
            if asset.min_debt.value() > 0 {
                manager.set_min_debt(&owner, &asset.id, asset.min_debt.value())?;
            }
            feeds.insert(asset.id.clone(), feed);
        }

        Ok(Self {
            ledger: Ledger::new(manager),
            bank,
            feeds,
            governance_owner: owner,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn bank(&self) -> &InMemoryBank {
        &self.bank
    }

    pub fn feed(&self, asset: &AssetId) -> Option<&Arc<ManualPriceFeed>> {
        self.feeds.get(asset)
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.feeds.keys()
    }

    pub fn governance_owner(&self) -> &AccountId {
        &self.governance_owner
    }

    fn governance_caller(&self, caller: &Option<AccountId>) -> AccountId {
        caller.clone().unwrap_or_else(|| self.governance_owner.clone())
    }

    /// Apply one action to the ledger.
    pub fn apply(&self, action: &Action) -> Result<StepOutput, StepError> {
        match action {
            Action::SetPrice { asset, price } => {
                let feed = self
                    .feeds
                    .get(asset)
                    .ok_or_else(|| PositionManagerError::UnknownAsset(asset.clone()))?;
                match price {
                    Some(price) if price.value() > 0 => feed.set_price(asset.clone(), price.value()),
                    Some(_) => return Err(StepError::Invalid(format!("zero price for {asset}"))),
                    None => feed.clear_price(asset),
                }
                Ok(StepOutput::None)
            }
            Action::Fund {
                account,
                asset,
                amount,
            } => {
                self.bank.fund_collateral(account, asset, amount.value());
                Ok(StepOutput::None)
            }
            Action::Open {
                caller,
                owner,
                asset,
                collateral,
                debt,
                max_fee,
            } => {
                let request =
                    ManageRequest::open(asset.clone(), owner.clone(), collateral.value(), debt.value());
                self.manage(caller, owner, request, *max_fee)
            }
            Action::Adjust {
                caller,
                owner,
                asset,
                collateral_delta,
                collateral_increase,
                debt_delta,
                debt_increase,
                max_fee,
            } => {
                let request = ManageRequest {
                    asset: asset.clone(),
                    owner: owner.clone(),
                    collateral_delta: collateral_delta.value(),
                    is_collateral_increase: *collateral_increase,
                    debt_delta: debt_delta.value(),
                    is_debt_increase: *debt_increase,
                    max_fee_percentage: PRECISION,
                };
                self.manage(caller, owner, request, *max_fee)
            }
            Action::Close {
                caller,
                owner,
                asset,
            } => {
                let request = ManageRequest::close(asset.clone(), owner.clone());
                self.manage(caller, owner, request, None)
            }
            Action::Redeem {
                caller,
                asset,
                amount,
                max_fee,
            } => {
                let max_fee = max_fee.map_or(PRECISION, |f| f.value());
                let outcome = self.ledger.redeem(caller, asset, amount.value(), max_fee)?;
                Ok(StepOutput::Redemption(outcome))
            }
            Action::Liquidate {
                caller,
                owner,
                asset,
            } => {
                let outcome = self.ledger.liquidate(caller, owner, asset)?;
                Ok(StepOutput::Liquidation(outcome))
            }
            Action::Whitelist {
                owner,
                delegate,
                enabled,
            } => {
                self.ledger.whitelist_delegate(owner, delegate, *enabled)?;
                Ok(StepOutput::None)
            }
            Action::SetBorrowingSpread { caller, value } => {
                let caller = self.governance_caller(caller);
                self.ledger
                    .execute(|pm| pm.set_borrowing_spread(&caller, value.value()))?;
                Ok(StepOutput::None)
            }
            Action::SetRedemptionSpread { caller, value } => {
                let caller = self.governance_caller(caller);
                self.ledger
                    .execute(|pm| pm.set_redemption_spread(&caller, value.value()))?;
                Ok(StepOutput::None)
            }
            Action::SetRedemptionRebate { caller, value } => {
                let caller = self.governance_caller(caller);
                self.ledger
                    .execute(|pm| pm.set_redemption_rebate(&caller, value.value()))?;
                Ok(StepOutput::None)
            }
            Action::SetSplitPolicy {
                caller,
                asset,
                split,
            } => {
                let caller = self.governance_caller(caller);
                let policy = match split {
                    Some(split) => Some(split.policy().map_err(|e| StepError::Invalid(e.to_string()))?),
                    None => None,
                };
                self.ledger.execute(|pm| {
                    pm.set_split_liquidation_collateral(
                        &caller,
                        asset,
                        policy.map(|p| Arc::new(p) as Arc<dyn SplitLiquidationCollateral>),
                    )
                })?;
                Ok(StepOutput::None)
            }
            Action::SetFeeRecipient { caller, recipient } => {
                let caller = self.governance_caller(caller);
                self.ledger
                    .execute(|pm| pm.set_fee_recipient(&caller, recipient.clone()))?;
                Ok(StepOutput::None)
            }
            Action::SetCollateralEnabled {
                caller,
                asset,
                enabled,
            } => {
                let caller = self.governance_caller(caller);
                self.ledger
                    .execute(|pm| pm.set_collateral_enabled(&caller, asset, *enabled))?;
                Ok(StepOutput::None)
            }
            Action::SetMinDebt {
                caller,
                asset,
                value,
            } => {
                let caller = self.governance_caller(caller);
                self.ledger
                    .execute(|pm| pm.set_min_debt(&caller, asset, value.value()))?;
                Ok(StepOutput::None)
            }
            Action::SetDebtIndex {
                caller,
                asset,
                index,
            } => {
                let caller = self.governance_caller(caller);
                let minted = self
                    .ledger
                    .execute(|pm| pm.set_debt_index(&caller, asset, index.value()))?;
                Ok(StepOutput::Interest { minted })
            }
        }
    }

    fn manage(
        &self,
        caller: &Option<AccountId>,
        owner: &AccountId,
        mut request: ManageRequest,
        max_fee: Option<Fixed>,
    ) -> Result<StepOutput, StepError> {
        if let Some(max_fee) = max_fee {
            request = request.with_max_fee_percentage(max_fee.value());
        }
        let caller = caller.as_ref().unwrap_or(owner);
        let update = self.ledger.manage_position(caller, request)?;
        Ok(StepOutput::Position(update))
    }

    /// Broken invariants, rendered one per line. Empty when the ledger is sound.
    pub fn invariant_report(&self) -> Result<String, PositionManagerError> {
        let violations = self.ledger.inspect(|pm| pm.check_invariants())?;
        Ok(violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "))
    }

    pub fn stable_summary(&self) -> StableSummary {
        StableSummary {
            supply: self.bank.stable_supply(),
            holders: self.bank.stable_holders(),
        }
    }
}

/// Run a scenario to completion.
///
/// Fails on the first step whose outcome differs from its expectation, and
/// on the first step after which a ledger invariant is broken.
pub fn run_scenario(scenario: &Scenario) -> Result<ScenarioReport, RunError> {
    let harness = LedgerHarness::build(&scenario.ledger)?;
    let scenario_digest = digest_of(scenario)?;
    info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        digest = %scenario_digest,
        "scenario started"
    );

    let mut records = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let record = run_step(&harness, index, step)?;
        let details = harness.invariant_report()?;
        if !details.is_empty() {
            return Err(RunError::Invariant {
                index,
                op: step.action.name(),
                details,
            });
        }
        records.push(record);
    }

    let final_state = harness.ledger().snapshot()?;
    let state_digest = state_digest(&final_state)?;
    let report = ScenarioReport {
        schema_version: SCHEMA_VERSION,
        scenario: scenario.name.clone(),
        scenario_digest,
        steps: records,
        final_state,
        state_digest,
        stable: harness.stable_summary(),
    };
    info!(
        scenario = %report.scenario,
        failed_steps = report.failed_steps(),
        state = %report.state_digest,
        "scenario finished"
    );
    Ok(report)
}

fn run_step(harness: &LedgerHarness, index: usize, step: &Step) -> Result<StepRecord, RunError> {
    let op = step.action.name();
    let result = harness.apply(&step.action);
    debug!(index, op, ok = result.is_ok(), "step applied");

    let result = match (result, step.expect) {
        (Ok(output), None) => StepResult::Ok { output },
        (Ok(_), Some(expected)) => return Err(RunError::MissingFailure { index, op, expected }),
        (Err(source), None) => return Err(RunError::Unexpected { index, op, source }),
        (Err(err), Some(expected)) => {
            let actual = err.kind();
            if actual != expected {
                return Err(RunError::WrongKind {
                    index,
                    op,
                    expected,
                    actual,
                    message: err.to_string(),
                });
            }
            StepResult::Failed {
                kind: actual,
                message: err.to_string(),
            }
        }
    };

    Ok(StepRecord {
        index,
        op,
        expected: step.expect,
        result,
    })
}
