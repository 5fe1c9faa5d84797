//! # Events
//!
//! Records emitted by state transitions.

use crate::errors::{CoreError, CoreResult};
use crate::types::Address;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// One applied rebase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct RebaseEvent {
    /// Epoch number, strictly increasing across events
    pub epoch: u64,
    /// Time the rebase was applied (unix seconds)
    pub timestamp: i64,
    /// Delta asked for by the policy
    pub requested_delta: i128,
    /// Delta actually applied after supply bounds
    pub applied_delta: i128,
    /// Total supply after the rebase
    pub resulting_total_supply: u128,
    /// Whether the supply bounds cut the requested delta
    pub clamped: bool,
}

impl RebaseEvent {
    /// Report a clamp as the non-fatal `SupplyOutOfBounds` signal
    pub fn check_bounds(&self) -> CoreResult<()> {
        if self.clamped {
            return Err(CoreError::SupplyOutOfBounds {
                requested: self.requested_delta,
                applied: self.applied_delta,
            });
        }
        Ok(())
    }
}

/// One share movement between accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferEvent {
    pub from: Address,
    pub to: Address,
    /// Amount in external units
    pub amount: u128,
}

/// Result of one policy cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct RebaseOutcome {
    /// Market price the cycle saw (capped)
    pub market_price: u128,
    /// Reference target price
    pub target_price: u128,
    /// Signed deviation of market from target in basis points
    pub deviation_bps: i128,
    /// Supply delta submitted to the token
    pub supply_delta: i128,
    /// Applied rebase, `None` when a zero delta was not submitted
    pub event: Option<RebaseEvent>,
}
