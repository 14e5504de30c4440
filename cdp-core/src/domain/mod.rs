//! Domain types for the CDP ledger

pub mod ids;
pub mod position;

pub use ids::{AccountId, AssetId};
pub use position::{Position, PositionStatus, PositionView, SortKey};
