//! Fixed-point arithmetic with 18 fractional digits.
//!
//! Every amount, price, ratio and rate in the ledger is a `u128` scaled by
//! [`PRECISION`]. Products go through a 256-bit intermediate with an explicit
//! rounding direction, so results are exact and reproducible. Floating point is
//! never used.

use sp_arithmetic::helpers_128bit::multiply_by_rational_with_rounding;
pub use sp_arithmetic::Rounding;
use thiserror::Error;

/// Fixed-point scale: `1.0 == PRECISION`.
pub const PRECISION: u128 = 1_000_000_000_000_000_000;

/// `100%` expressed as a fixed-point rate.
pub const ONE_HUNDRED_PERCENT: u128 = PRECISION;

/// Number of fractional decimal digits in a fixed-point value.
pub const DECIMALS: u32 = 18;

/// Errors from fixed-point arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow")]
    Overflow,

    #[error("arithmetic underflow")]
    Underflow,

    #[error("division by zero")]
    DivisionByZero,
}

/// Errors from parsing a decimal string into a fixed-point value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFixedError {
    #[error("empty decimal string")]
    Empty,

    #[error("invalid decimal '{0}'")]
    Invalid(String),

    #[error("'{0}' has more than 18 fractional digits")]
    TooPrecise(String),

    #[error("'{0}' does not fit in 128 bits")]
    TooLarge(String),
}

/// `a * b / c` with the given rounding direction.
pub fn mul_div(a: u128, b: u128, c: u128, rounding: Rounding) -> Result<u128, MathError> {
    if c == 0 {
        return Err(MathError::DivisionByZero);
    }
    multiply_by_rational_with_rounding(a, b, c, rounding).ok_or(MathError::Overflow)
}

/// `a * b / PRECISION`, rounded down.
pub fn mul_down(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, PRECISION, Rounding::Down)
}

/// `a * b / PRECISION`, rounded up.
pub fn mul_up(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, b, PRECISION, Rounding::Up)
}

/// `a * PRECISION / b`, rounded down.
pub fn div_down(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, PRECISION, b, Rounding::Down)
}

/// `a * PRECISION / b`, rounded up.
pub fn div_up(a: u128, b: u128) -> Result<u128, MathError> {
    mul_div(a, PRECISION, b, Rounding::Up)
}

pub fn checked_add(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b).ok_or(MathError::Underflow)
}

/// Individual collateralization ratio: `collateral * price / debt`.
///
/// A position without debt is infinitely collateralized and reports
/// `u128::MAX`, as does a ratio too large to represent.
pub fn collateral_ratio(collateral: u128, debt: u128, price: u128) -> u128 {
    if debt == 0 {
        return u128::MAX;
    }
    mul_div(collateral, price, debt, Rounding::Down).unwrap_or(u128::MAX)
}

/// Price-independent ratio of two share counts, used as the ICR ordering key.
pub fn nominal_ratio(collateral_shares: u128, debt_shares: u128) -> u128 {
    if debt_shares == 0 {
        return u128::MAX;
    }
    mul_div(collateral_shares, PRECISION, debt_shares, Rounding::Down).unwrap_or(u128::MAX)
}

/// Parse a decimal string such as `"1.5"` or `"3000"` into a fixed-point value.
pub fn parse_fixed(input: &str) -> Result<u128, ParseFixedError> {
    let trimmed = input.trim().replace('_', "");
    if trimmed.is_empty() {
        return Err(ParseFixedError::Empty);
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed.as_str(), ""),
    };
    let is_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(ParseFixedError::Invalid(input.to_string()));
    }
    if fraction.len() > DECIMALS as usize {
        return Err(ParseFixedError::TooPrecise(input.to_string()));
    }

    let too_large = || ParseFixedError::TooLarge(input.to_string());
    let whole_value: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| too_large())?
    };
    let fraction_value: u128 = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<18}");
        padded.parse().map_err(|_| too_large())?
    };

    whole_value
        .checked_mul(PRECISION)
        .and_then(|v| v.checked_add(fraction_value))
        .ok_or_else(too_large)
}

/// Render a fixed-point value as a decimal string without trailing zeros.
pub fn format_fixed(value: u128) -> String {
    let whole = value / PRECISION;
    let fraction = value % PRECISION;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:018}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}
