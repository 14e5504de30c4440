//! Governance surface: bounded fee parameters and delegate approvals.

pub mod delegates;
pub mod fees;

pub use delegates::{DelegateEntry, DelegateRegistry};
pub use fees::{
    FeeParameterError, FeeParameters, MAX_BORROWING_SPREAD, MAX_REDEMPTION_REBATE,
    MAX_REDEMPTION_SPREAD, MIN_REDEMPTION_SPREAD,
};
