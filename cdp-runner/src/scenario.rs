//! Scenario files: a ledger configuration plus an ordered list of steps.
//!
//! ```toml
//! name = "open and redeem"
//!
//! [ledger]
//! governance_owner = "gov"
//! fee_recipient = "treasury"
//!
//! [[ledger.assets]]
//! id = "ETH"
//! price = "1"
//!
//! [[steps]]
//! op = "fund"
//! account = "alice"
//! asset = "ETH"
//! amount = "200"
//!
//! [[steps]]
//! op = "open"
//! owner = "alice"
//! asset = "ETH"
//! collateral = "200"
//! debt = "100"
//!
//! [[steps]]
//! op = "set_borrowing_spread"
//! caller = "alice"
//! value = "0.001"
//! expect = "authorization"
//! ```
//!
//! A step with `expect` must fail with that error kind. A step without it
//! must succeed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use cdp_core::{AccountId, AssetId, ErrorKind};

use crate::config::{ConfigError, Fixed, LedgerConfig, SplitConfig};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let scenario: Scenario = toml::from_str(content)?;
        scenario.ledger.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<ErrorKind>,
}

impl Step {
    pub fn new(action: Action) -> Self {
        Self { action, expect: None }
    }

    pub fn expecting(action: Action, kind: ErrorKind) -> Self {
        Self {
            action,
            expect: Some(kind),
        }
    }
}

/// One ledger interaction.
///
/// `caller` defaults to the position owner for position operations and to
/// the governance owner for governance operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Set the feed price, or make it unavailable when `price` is omitted.
    SetPrice {
        asset: AssetId,
        #[serde(default)]
        price: Option<Fixed>,
    },
    /// Credit collateral to an account's wallet.
    Fund {
        account: AccountId,
        asset: AssetId,
        amount: Fixed,
    },
    Open {
        #[serde(default)]
        caller: Option<AccountId>,
        owner: AccountId,
        asset: AssetId,
        collateral: Fixed,
        debt: Fixed,
        #[serde(default)]
        max_fee: Option<Fixed>,
    },
    Adjust {
        #[serde(default)]
        caller: Option<AccountId>,
        owner: AccountId,
        asset: AssetId,
        #[serde(default = "zero")]
        collateral_delta: Fixed,
        #[serde(default)]
        collateral_increase: bool,
        #[serde(default = "zero")]
        debt_delta: Fixed,
        #[serde(default)]
        debt_increase: bool,
        #[serde(default)]
        max_fee: Option<Fixed>,
    },
    Close {
        #[serde(default)]
        caller: Option<AccountId>,
        owner: AccountId,
        asset: AssetId,
    },
    Redeem {
        caller: AccountId,
        asset: AssetId,
        amount: Fixed,
        #[serde(default)]
        max_fee: Option<Fixed>,
    },
    Liquidate {
        caller: AccountId,
        owner: AccountId,
        asset: AssetId,
    },
    Whitelist {
        owner: AccountId,
        delegate: AccountId,
        enabled: bool,
    },
    SetBorrowingSpread {
        #[serde(default)]
        caller: Option<AccountId>,
        value: Fixed,
    },
    SetRedemptionSpread {
        #[serde(default)]
        caller: Option<AccountId>,
        value: Fixed,
    },
    SetRedemptionRebate {
        #[serde(default)]
        caller: Option<AccountId>,
        value: Fixed,
    },
    /// Replace the asset's split policy; omitting `split` submits no policy.
    SetSplitPolicy {
        #[serde(default)]
        caller: Option<AccountId>,
        asset: AssetId,
        #[serde(default)]
        split: Option<SplitConfig>,
    },
    SetFeeRecipient {
        #[serde(default)]
        caller: Option<AccountId>,
        recipient: AccountId,
    },
    SetCollateralEnabled {
        #[serde(default)]
        caller: Option<AccountId>,
        asset: AssetId,
        enabled: bool,
    },
    SetMinDebt {
        #[serde(default)]
        caller: Option<AccountId>,
        asset: AssetId,
        value: Fixed,
    },
    SetDebtIndex {
        #[serde(default)]
        caller: Option<AccountId>,
        asset: AssetId,
        index: Fixed,
    },
}

impl Action {
    /// The `op` tag, for logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Action::SetPrice { .. } => "set_price",
            Action::Fund { .. } => "fund",
            Action::Open { .. } => "open",
            Action::Adjust { .. } => "adjust",
            Action::Close { .. } => "close",
            Action::Redeem { .. } => "redeem",
            Action::Liquidate { .. } => "liquidate",
            Action::Whitelist { .. } => "whitelist",
            Action::SetBorrowingSpread { .. } => "set_borrowing_spread",
            Action::SetRedemptionSpread { .. } => "set_redemption_spread",
            Action::SetRedemptionRebate { .. } => "set_redemption_rebate",
            Action::SetSplitPolicy { .. } => "set_split_policy",
            Action::SetFeeRecipient { .. } => "set_fee_recipient",
            Action::SetCollateralEnabled { .. } => "set_collateral_enabled",
            Action::SetMinDebt { .. } => "set_min_debt",
            Action::SetDebtIndex { .. } => "set_debt_index",
        }
    }
}

fn zero() -> Fixed {
    Fixed(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdp_core::PRECISION;

    const SAMPLE: &str = r#"
name = "sample"

[ledger]
governance_owner = "gov"

[[ledger.assets]]
id = "ETH"
price = "1"

[[steps]]
op = "fund"
account = "alice"
asset = "ETH"
amount = "200"

[[steps]]
op = "open"
owner = "alice"
asset = "ETH"
collateral = "200"
debt = "100"

[[steps]]
op = "set_borrowing_spread"
caller = "alice"
value = "0.001"
expect = "authorization"

[[steps]]
op = "close"
owner = "alice"
asset = "ETH"
"#;

    #[test]
    fn parses_tagged_steps() {
        let scenario = Scenario::from_toml_str(SAMPLE).unwrap();
        assert_eq!(scenario.name, "sample");
        assert_eq!(scenario.steps.len(), 4);

        assert_eq!(
            scenario.steps[1],
            Step::new(Action::Open {
                caller: None,
                owner: AccountId::from("alice"),
                asset: AssetId::from("ETH"),
                collateral: Fixed(200 * PRECISION),
                debt: Fixed(100 * PRECISION),
                max_fee: None,
            })
        );
        assert_eq!(scenario.steps[2].expect, Some(ErrorKind::Authorization));
        assert_eq!(scenario.steps[2].action.name(), "set_borrowing_spread");
        assert_eq!(scenario.steps[3].expect, None);
    }

    #[test]
    fn unknown_op_is_rejected() {
        let content = r#"
name = "bad"
[ledger]
governance_owner = "gov"
[[steps]]
op = "teleport"
"#;
        assert!(Scenario::from_toml_str(content).is_err());
    }

    #[test]
    fn adjust_defaults_to_no_change() {
        let content = r#"
name = "adjust"
[ledger]
governance_owner = "gov"
[[steps]]
op = "adjust"
owner = "alice"
asset = "ETH"
debt_delta = "5"
debt_increase = true
"#;
        let scenario = Scenario::from_toml_str(content).unwrap();
        match &scenario.steps[0].action {
            Action::Adjust {
                collateral_delta,
                collateral_increase,
                debt_delta,
                debt_increase,
                ..
            } => {
                assert_eq!(*collateral_delta, Fixed(0));
                assert!(!collateral_increase);
                assert_eq!(*debt_delta, Fixed(5 * PRECISION));
                assert!(debt_increase);
            }
            other => panic!("unexpected action {other:?}"),
        }
    }
}
