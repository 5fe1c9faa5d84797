//! # Share Ledger
//!
//! Ownership is tracked in shares, a fixed pool created at genesis. External
//! balances are shares divided by `shares_per_unit = total_shares /
//! total_supply`, so a rebase only rewrites `total_supply` and every holder
//! keeps the same fraction of the pool.
//!
//! `total_shares` is the largest multiple of the genesis supply that fits in
//! 256 bits. That leaves roughly 2^128 shares per unit even at the maximum
//! supply, which keeps a one-unit supply change exactly representable.

use std::collections::HashMap;

use crate::constants::{MAX_SUPPLY, MIN_SUPPLY};
use crate::errors::{CoreError, CoreResult};
use crate::math::{narrow_u128, U256};
use crate::types::Address;

/// Per-account share balances over a fixed share pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLedger {
    total_shares: U256,
    total_supply: u128,
    shares: HashMap<Address, U256>,
}

impl ShareLedger {
    /// Create the pool and assign all of it to `owner`
    pub fn genesis(initial_supply: u128, owner: Address) -> CoreResult<Self> {
        if initial_supply < MIN_SUPPLY || initial_supply > MAX_SUPPLY {
            return Err(CoreError::invalid_parameter(
                "initial_supply",
                format!("{} outside [{}, {}]", initial_supply, MIN_SUPPLY, MAX_SUPPLY),
            ));
        }

        let supply = U256::from(initial_supply);
        let total_shares = U256::MAX - (U256::MAX % supply);

        let mut shares = HashMap::new();
        shares.insert(owner, total_shares);

        Ok(Self {
            total_shares,
            total_supply: initial_supply,
            shares,
        })
    }

    /// Rebuild a ledger from persisted parts, checking share conservation
    pub fn from_parts(total_shares: U256, total_supply: u128, shares: HashMap<Address, U256>) -> CoreResult<Self> {
        if total_supply < MIN_SUPPLY {
            return Err(CoreError::CorruptState(format!("total supply {} below minimum", total_supply)));
        }
        let ledger = Self {
            total_shares,
            total_supply,
            shares,
        };
        let sum = ledger.sum_of_shares()?;
        if sum != total_shares {
            return Err(CoreError::CorruptState(format!(
                "share balances sum to {}, expected {}",
                sum, total_shares
            )));
        }
        Ok(ledger)
    }

    pub fn total_shares(&self) -> U256 {
        self.total_shares
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Scaling factor between shares and external units.
    ///
    /// Derived on every call so it can never drift from the supply.
    pub fn shares_per_unit(&self) -> U256 {
        // total_supply >= MIN_SUPPLY > 0
        self.total_shares / U256::from(self.total_supply)
    }

    pub fn shares_of(&self, account: &Address) -> U256 {
        self.shares.get(account).copied().unwrap_or(U256::ZERO)
    }

    /// External balance, truncated toward zero
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.shares_to_amount(self.shares_of(account))
    }

    /// Convert a share quantity to external units, truncated toward zero
    pub fn shares_to_amount(&self, shares: U256) -> u128 {
        // Only the full pool at MAX_SUPPLY can exceed u128 after truncation
        narrow_u128(shares / self.shares_per_unit()).unwrap_or(u128::MAX)
    }

    /// Share quantity equivalent to `amount` external units
    pub fn amount_to_shares(&self, amount: u128) -> CoreResult<U256> {
        U256::from(amount)
            .checked_mul(self.shares_per_unit())
            .ok_or(CoreError::MathOverflow)
    }

    /// Move exactly `shares` from one account to another
    pub fn move_shares(&mut self, from: &Address, to: &Address, shares: U256) -> CoreResult<()> {
        let from_shares = self.shares_of(from);
        if from_shares < shares {
            return Err(CoreError::InsufficientBalance {
                have: self.shares_to_amount(from_shares),
                need: self.shares_to_amount(shares),
            });
        }
        if from == to || shares == U256::ZERO {
            return Ok(());
        }

        let remaining = from_shares - shares;
        if remaining == U256::ZERO {
            self.shares.remove(from);
        } else {
            self.shares.insert(*from, remaining);
        }

        // Cannot overflow: every balance is a part of total_shares
        let to_shares = self.shares_of(to) + shares;
        self.shares.insert(*to, to_shares);
        Ok(())
    }

    pub(crate) fn set_total_supply(&mut self, total_supply: u128) {
        debug_assert!(total_supply >= MIN_SUPPLY);
        self.total_supply = total_supply;
    }

    /// Accounts holding a non-zero share balance
    pub fn accounts(&self) -> impl Iterator<Item = (&Address, &U256)> {
        self.shares.iter()
    }

    /// Sum of all share balances; equals `total_shares` at all times
    pub fn sum_of_shares(&self) -> CoreResult<U256> {
        self.shares
            .values()
            .try_fold(U256::ZERO, |acc, s| acc.checked_add(*s).ok_or(CoreError::MathOverflow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INITIAL_FRAGMENTS_SUPPLY;

    fn alice() -> Address {
        Address::repeat_byte(0xa1)
    }

    fn bob() -> Address {
        Address::repeat_byte(0xb0)
    }

    #[test]
    fn test_genesis_assigns_everything_to_owner() {
        let ledger = ShareLedger::genesis(INITIAL_FRAGMENTS_SUPPLY, alice()).unwrap();
        assert_eq!(ledger.balance_of(&alice()), INITIAL_FRAGMENTS_SUPPLY);
        assert_eq!(ledger.shares_of(&alice()), ledger.total_shares());
        assert_eq!(ledger.total_shares() % U256::from(INITIAL_FRAGMENTS_SUPPLY), U256::ZERO);
        assert_eq!(ledger.balance_of(&bob()), 0);
    }

    #[test]
    fn test_genesis_rejects_zero_supply() {
        assert!(matches!(
            ShareLedger::genesis(0, alice()),
            Err(CoreError::InvalidParameter { name: "initial_supply", .. })
        ));
    }

    #[test]
    fn test_move_shares_is_exact() {
        let mut ledger = ShareLedger::genesis(1_000, alice()).unwrap();
        let shares = ledger.amount_to_shares(250).unwrap();
        ledger.move_shares(&alice(), &bob(), shares).unwrap();

        assert_eq!(ledger.balance_of(&alice()), 750);
        assert_eq!(ledger.balance_of(&bob()), 250);
        assert_eq!(ledger.sum_of_shares().unwrap(), ledger.total_shares());
    }

    #[test]
    fn test_move_shares_insufficient_leaves_state() {
        let mut ledger = ShareLedger::genesis(1_000, alice()).unwrap();
        let shares = ledger.amount_to_shares(250).unwrap();
        ledger.move_shares(&alice(), &bob(), shares).unwrap();

        let before = ledger.clone();
        let shares = ledger.amount_to_shares(251).unwrap();
        assert_eq!(
            ledger.move_shares(&bob(), &alice(), shares),
            Err(CoreError::InsufficientBalance { have: 250, need: 251 })
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_from_parts_detects_lost_shares() {
        let ledger = ShareLedger::genesis(1_000, alice()).unwrap();
        let mut shares = HashMap::new();
        shares.insert(alice(), ledger.total_shares() - U256::ONE);
        assert!(matches!(
            ShareLedger::from_parts(ledger.total_shares(), 1_000, shares),
            Err(CoreError::CorruptState(_))
        ));
    }

    #[test]
    fn test_balance_at_max_supply_saturates() {
        let mut ledger = ShareLedger::genesis(1, alice()).unwrap();
        ledger.set_total_supply(MAX_SUPPLY);
        assert!(ledger.balance_of(&alice()) >= MAX_SUPPLY - 1);
    }
}
