//! # Safe Math Operations
//!
//! Overflow-checked arithmetic. Nothing in the engine wraps silently except
//! the TWAP accumulator, which does so explicitly.

use crate::errors::{CoreError, CoreResult};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked arithmetic returning a core error on overflow
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };
}

safe_arith!(safe_add_u64, u64, checked_add, CoreError::MathOverflow);
safe_arith!(safe_add_u128, u128, checked_add, CoreError::MathOverflow);
safe_arith!(safe_add_i64, i64, checked_add, CoreError::MathOverflow);

/// Apply a signed delta to an unsigned supply, saturating into `[min, max]`.
///
/// Returns the bounded result and whether the bounds had to be applied.
pub fn apply_signed_delta(value: u128, delta: i128, min: u128, max: u128) -> (u128, bool) {
    let unbounded = if delta >= 0 {
        value.checked_add(delta.unsigned_abs())
    } else {
        value.checked_sub(delta.unsigned_abs())
    };

    match unbounded {
        Some(v) if v > max => (max, true),
        Some(v) if v < min => (min, true),
        Some(v) => (v, false),
        None if delta >= 0 => (max, true),
        None => (min, true),
    }
}

/// Overflow-free mean of two unsigned values, rounded down
pub fn mean_u128(a: u128, b: u128) -> u128 {
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}
