//! # Mathematical Functions
//!
//! Checked integer arithmetic used by the ledger, oracles and policy.

pub mod big_int;
pub mod safe_math;

pub use big_int::*;
pub use safe_math::*;
