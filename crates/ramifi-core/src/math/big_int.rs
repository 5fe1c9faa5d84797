//! Big integer operations for share accounting
//!
//! Shares live in the full 256-bit range so that one external unit stays
//! representable after very large supply expansions. `ethnum` supplies the
//! integer type; this module adds the narrowing and mul-div helpers the
//! ledger and policy need.

pub use ethnum::U256;

use crate::errors::{CoreError, CoreResult};

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Round down (towards zero)
    Down,
    /// Round up (away from zero)
    Up,
}

/// Narrow a U256 into u128, returning None if the high word is set
pub fn narrow_u128(value: U256) -> Option<u128> {
    let (hi, lo) = value.into_words();
    if hi == 0 {
        Some(lo)
    } else {
        None
    }
}

/// result = (a * b) / denominator, computed with a 256-bit intermediate
pub fn mul_div_u256(a: u128, b: u128, denominator: u128, rounding: Rounding) -> CoreResult<U256> {
    if denominator == 0 {
        return Err(CoreError::DivisionByZero);
    }

    // u128 * u128 always fits in 256 bits
    let product = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);
    let quotient = product / denominator;

    if rounding == Rounding::Up && product % denominator != U256::ZERO {
        return quotient.checked_add(U256::ONE).ok_or(CoreError::MathOverflow);
    }

    Ok(quotient)
}
