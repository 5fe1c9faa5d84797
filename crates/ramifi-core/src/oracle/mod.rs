//! # Oracle Module
//!
//! Price sources consumed by the monetary policy: a TWAP over a pool's
//! cumulative-price accumulator for the market rate, and a provider-median
//! oracle for the reference index.

pub mod reference;
pub mod twap;

pub use reference::*;
pub use twap::*;

use crate::errors::CoreResult;
use crate::types::Address;

/// Read-only price source the policy is wired to by address
pub trait PriceFeed {
    /// Identity the policy checks its configured oracle against
    fn address(&self) -> Address;

    /// Price as an 18-decimal fixed-point value, evaluated at `now`
    fn price_at(&self, now: i64) -> CoreResult<u128>;
}
