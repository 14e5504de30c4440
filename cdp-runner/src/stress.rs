//! Seeded stress runs.
//!
//! Each run builds a fresh ledger from the same configuration and applies a
//! random but reproducible sequence of actions, checking ledger invariants
//! after every one. Runs execute in parallel; each run's RNG is seeded from
//! the master seed and the run index, so results do not depend on thread
//! count or scheduling.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cdp_core::{AccountId, AssetId, PriceFeed, PRECISION};

use crate::config::{ConfigError, Fixed, LedgerConfig};
use crate::fingerprint::{state_digest, sub_seed};
use crate::runner::{LedgerHarness, RunError};
use crate::scenario::Action;

const SEED_LABEL: &str = "stress";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StressConfig {
    pub master_seed: u64,
    pub runs: usize,
    /// Random actions per run.
    pub steps: usize,
    pub accounts: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            master_seed: 42,
            runs: 8,
            steps: 200,
            accounts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StressRun {
    pub index: usize,
    pub seed: u64,
    pub actions: usize,
    pub succeeded: usize,
    /// Failure counts by error kind.
    pub failures: BTreeMap<String, usize>,
    /// Step after which invariants first broke, if any.
    pub broken_at: Option<usize>,
    pub violations: Vec<String>,
    pub open_positions: usize,
    pub state_digest: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StressReport {
    pub config: StressConfig,
    pub runs: Vec<StressRun>,
}

impl StressReport {
    pub fn is_clean(&self) -> bool {
        self.runs.iter().all(|r| r.violations.is_empty())
    }

    pub fn total_actions(&self) -> usize {
        self.runs.iter().map(|r| r.actions).sum()
    }
}

/// Run `config.runs` seeded stress runs against `ledger` in parallel.
pub fn run_stress(ledger: &LedgerConfig, config: &StressConfig) -> Result<StressReport, RunError> {
    if ledger.assets.is_empty() {
        return Err(ConfigError::Invalid("stress runs need at least one collateral asset".into()).into());
    }
    if config.accounts == 0 {
        return Err(ConfigError::Invalid("stress runs need at least one account".into()).into());
    }

    let runs = (0..config.runs)
        .into_par_iter()
        .map(|index| run_one(ledger, config, index))
        .collect::<Result<Vec<_>, _>>()?;

    let report = StressReport {
        config: config.clone(),
        runs,
    };
    info!(
        runs = report.runs.len(),
        actions = report.total_actions(),
        clean = report.is_clean(),
        "stress finished"
    );
    Ok(report)
}

fn run_one(ledger: &LedgerConfig, config: &StressConfig, index: usize) -> Result<StressRun, RunError> {
    let seed = sub_seed(config.master_seed, SEED_LABEL, index as u64);
    let mut rng = StdRng::seed_from_u64(seed);
    let harness = LedgerHarness::build(ledger)?;
    let assets: Vec<AssetId> = harness.assets().cloned().collect();
    let accounts: Vec<AccountId> = (0..config.accounts)
        .map(|i| AccountId::new(format!("account-{i}")))
        .collect();

    let mut run = StressRun {
        index,
        seed,
        actions: 0,
        succeeded: 0,
        failures: BTreeMap::new(),
        broken_at: None,
        violations: Vec::new(),
        open_positions: 0,
        state_digest: String::new(),
    };

    for step in 0..config.steps {
        for action in random_actions(&mut rng, &harness, &assets, &accounts)? {
            run.actions += 1;
            match harness.apply(&action) {
                Ok(_) => run.succeeded += 1,
                Err(err) => *run.failures.entry(format!("{:?}", err.kind())).or_default() += 1,
            }
        }
        let violations = harness
            .ledger()
            .inspect(|pm| pm.check_invariants())?;
        if !violations.is_empty() {
            warn!(run = index, seed, step, count = violations.len(), "invariants broken");
            run.broken_at = Some(step);
            run.violations = violations.iter().map(ToString::to_string).collect();
            break;
        }
    }

    let snapshot = harness.ledger().snapshot()?;
    run.open_positions = snapshot.assets.iter().map(|a| a.positions.len()).sum();
    run.state_digest = state_digest(&snapshot)?;
    Ok(run)
}

/// Draw the next action. Opening and topping up also fund the wallet first.
fn random_actions(
    rng: &mut StdRng,
    harness: &LedgerHarness,
    assets: &[AssetId],
    accounts: &[AccountId],
) -> Result<Vec<Action>, RunError> {
    let asset = pick(rng, assets).clone();
    let owner = pick(rng, accounts).clone();
    let price = harness
        .feed(&asset)
        .and_then(|feed| feed.get_price(&asset).ok())
        .unwrap_or(PRECISION);

    let units = rng.gen_range(1u128..500) * PRECISION;
    let roll = rng.gen_range(0..100);
    let actions = match roll {
        0..=19 => {
            // debt between 33% and 80% of the collateral value
            let value = units / PRECISION * price;
            let debt = value / 100 * rng.gen_range(33u128..=80);
            vec![
                Action::Fund {
                    account: owner.clone(),
                    asset: asset.clone(),
                    amount: Fixed(units),
                },
                Action::Open {
                    caller: None,
                    owner,
                    asset,
                    collateral: Fixed(units),
                    debt: Fixed(debt),
                    max_fee: None,
                },
            ]
        }
        20..=29 => vec![
            Action::Fund {
                account: owner.clone(),
                asset: asset.clone(),
                amount: Fixed(units),
            },
            adjust(owner, asset, units, true, 0, false),
        ],
        30..=39 => vec![adjust(owner, asset, units / 4, false, 0, false)],
        40..=49 => vec![adjust(owner, asset, 0, false, units / 4, true)],
        50..=59 => vec![adjust(owner, asset, 0, false, units / 3, false)],
        60..=64 => vec![Action::Close {
            caller: None,
            owner,
            asset,
        }],
        65..=74 => {
            let balance = harness.bank().stable_balance(&owner);
            let amount = balance / rng.gen_range(1u128..=4);
            vec![Action::Redeem {
                caller: owner,
                asset,
                amount: Fixed(amount.max(1)),
                max_fee: None,
            }]
        }
        75..=84 => {
            let target = pick(rng, accounts).clone();
            vec![Action::Liquidate {
                caller: owner,
                owner: target,
                asset,
            }]
        }
        85..=92 => {
            let moved = price / 100 * rng.gen_range(80u128..=120);
            vec![Action::SetPrice {
                asset,
                price: Some(Fixed(moved.max(1))),
            }]
        }
        93..=96 => {
            let index = harness
                .ledger()
                .inspect(|pm| pm.debt_token(&asset).map(|t| t.index()))??;
            let bumped = index / 1_000 * rng.gen_range(1_000u128..=1_010);
            vec![Action::SetDebtIndex {
                caller: None,
                asset,
                index: Fixed(bumped.max(index)),
            }]
        }
        _ => {
            let delegate = pick(rng, accounts).clone();
            vec![Action::Whitelist {
                owner,
                delegate,
                enabled: rng.gen_bool(0.7),
            }]
        }
    };
    Ok(actions)
}

fn adjust(
    owner: AccountId,
    asset: AssetId,
    collateral: u128,
    collateral_increase: bool,
    debt: u128,
    debt_increase: bool,
) -> Action {
    Action::Adjust {
        caller: None,
        owner,
        asset,
        collateral_delta: Fixed(collateral),
        collateral_increase,
        debt_delta: Fixed(debt),
        debt_increase,
        max_fee: None,
    }
}

fn pick<'a, T>(rng: &mut StdRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}
