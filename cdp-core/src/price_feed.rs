//! Price feed collaborator.
//!
//! The ledger never discovers prices: it asks a [`PriceFeed`] once per
//! operation and uses that single reading for every calculation in the call.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::domain::AssetId;

/// Errors from price feeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceFeedError {
    #[error("no price available for {0}")]
    Unavailable(AssetId),

    #[error("price for {0} is zero")]
    ZeroPrice(AssetId),
}

/// Source of a point-in-time collateral price (18-decimal fixed point, in
/// units of the debt asset).
pub trait PriceFeed: Send + Sync {
    fn get_price(&self, asset: &AssetId) -> Result<u128, PriceFeedError>;

    /// Feed name (for logging and snapshots)
    fn name(&self) -> &str;
}

/// Price feed whose prices are set by hand. Used by the scenario runner and tests.
#[derive(Debug, Default)]
pub struct ManualPriceFeed {
    prices: RwLock<HashMap<AssetId, u128>>,
}

impl ManualPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(asset: AssetId, price: u128) -> Self {
        let feed = Self::new();
        feed.set_price(asset, price);
        feed
    }

    pub fn set_price(&self, asset: AssetId, price: u128) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.insert(asset, price);
    }

    pub fn clear_price(&self, asset: &AssetId) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.remove(asset);
    }
}

impl PriceFeed for ManualPriceFeed {
    fn get_price(&self, asset: &AssetId) -> Result<u128, PriceFeedError> {
        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        match prices.get(asset) {
            Some(0) => Err(PriceFeedError::ZeroPrice(asset.clone())),
            Some(price) => Ok(*price),
            None => Err(PriceFeedError::Unavailable(asset.clone())),
        }
    }

    fn name(&self) -> &str {
        "ManualPriceFeed"
    }
}
