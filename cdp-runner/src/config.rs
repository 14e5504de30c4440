//! Serializable ledger configuration.
//!
//! Amounts, prices and rates are written as decimal strings (`"1.1"`,
//! `"2000"`, `"0.0025"`) and parsed into 18-decimal fixed point on load, so a
//! TOML file never goes through floating point.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cdp_core::engine::DEFAULT_MINIMUM_COLLATERAL_RATIO;
use cdp_core::governance::{FeeParameters, MIN_REDEMPTION_SPREAD};
use cdp_core::math::{format_fixed, parse_fixed, ParseFixedError};
use cdp_core::{AccountId, AssetId, PositionManagerError, SurplusBonusSplit};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("ledger rejected configuration: {0}")]
    Manager(#[from] PositionManagerError),
}

/// A fixed-point value written as a decimal string. `"max"` means `u128::MAX`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fixed(pub u128);

impl Fixed {
    pub const MAX: Fixed = Fixed(u128::MAX);

    pub fn value(self) -> u128 {
        self.0
    }
}

impl TryFrom<String> for Fixed {
    type Error = ParseFixedError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("max") {
            return Ok(Fixed::MAX);
        }
        parse_fixed(&value).map(Fixed)
    }
}

impl From<Fixed> for String {
    fn from(value: Fixed) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == u128::MAX {
            return f.write_str("max");
        }
        f.write_str(&format_fixed(self.0))
    }
}

impl fmt::Debug for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fixed({self})")
    }
}

/// Fee parameter section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "zero")]
    pub borrowing_spread: Fixed,
    #[serde(default = "default_redemption_spread")]
    pub redemption_spread: Fixed,
    #[serde(default = "zero")]
    pub redemption_rebate: Fixed,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            borrowing_spread: zero(),
            redemption_spread: default_redemption_spread(),
            redemption_rebate: zero(),
        }
    }
}

/// Parameters of the default liquidation split policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub bonus_rate: Fixed,
    pub redistributor_reward_rate: Fixed,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            bonus_rate: Fixed(SurplusBonusSplit::DEFAULT_BONUS_RATE),
            redistributor_reward_rate: Fixed(SurplusBonusSplit::DEFAULT_REDISTRIBUTOR_REWARD_RATE),
        }
    }
}

impl SplitConfig {
    pub fn policy(&self) -> Result<SurplusBonusSplit, ConfigError> {
        SurplusBonusSplit::new(self.bonus_rate.value(), self.redistributor_reward_rate.value())
            .ok_or_else(|| ConfigError::Invalid("split rates must be at most 100%".into()))
    }
}

/// One collateral asset registered at start-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetConfig {
    pub id: AssetId,
    /// Initial price; omitted means the feed starts without a price.
    #[serde(default)]
    pub price: Option<Fixed>,
    #[serde(default = "zero")]
    pub min_debt: Fixed,
    /// Overrides the ledger-wide split parameters for this asset.
    #[serde(default)]
    pub split: Option<SplitConfig>,
}

/// Complete ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub governance_owner: AccountId,
    #[serde(default)]
    pub fee_recipient: Option<AccountId>,
    #[serde(default = "default_mcr")]
    pub minimum_collateral_ratio: Fixed,
    #[serde(default)]
    pub fees: FeeConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

impl LedgerConfig {
    /// A configuration with defaults and no assets.
    pub fn new(governance_owner: AccountId) -> Self {
        Self {
            governance_owner,
            fee_recipient: None,
            minimum_collateral_ratio: default_mcr(),
            fees: FeeConfig::default(),
            split: SplitConfig::default(),
            assets: Vec::new(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Check every bound the position manager would enforce, before building it.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_collateral_ratio.value() <= cdp_core::math::ONE_HUNDRED_PERCENT {
            return Err(ConfigError::Invalid(format!(
                "minimum_collateral_ratio {} must exceed 1",
                self.minimum_collateral_ratio
            )));
        }
        self.fee_parameters()?;
        self.split.policy()?;

        let mut seen = std::collections::HashSet::new();
        for asset in &self.assets {
            if !seen.insert(&asset.id) {
                return Err(ConfigError::Invalid(format!("asset {} listed twice", asset.id)));
            }
            if asset.price == Some(Fixed(0)) {
                return Err(ConfigError::Invalid(format!("asset {} has a zero price", asset.id)));
            }
            if let Some(split) = &asset.split {
                split.policy()?;
            }
        }
        Ok(())
    }

    pub fn fee_parameters(&self) -> Result<FeeParameters, ConfigError> {
        FeeParameters::new(
            self.fees.borrowing_spread.value(),
            self.fees.redemption_spread.value(),
            self.fees.redemption_rebate.value(),
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

fn zero() -> Fixed {
    Fixed(0)
}

fn default_redemption_spread() -> Fixed {
    Fixed(MIN_REDEMPTION_SPREAD)
}

fn default_mcr() -> Fixed {
    Fixed(DEFAULT_MINIMUM_COLLATERAL_RATIO)
}
