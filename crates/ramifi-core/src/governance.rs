//! # Ownership Handoff
//!
//! Two-phase owner transfer used by the token, the policy and the reference
//! oracle. The current owner proposes a candidate with an activation time;
//! the candidate accepts once that time has passed.

use crate::errors::{CoreError, CoreResult};
use crate::math::safe_add_i64;
use crate::types::Address;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Proposed owner waiting for its timelock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct PendingOwner {
    pub candidate: Address,
    /// Earliest time `accept` succeeds (unix seconds)
    pub eta: i64,
}

/// Owner of a component plus an optional pending handoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct Ownership {
    owner: Address,
    pending: Option<PendingOwner>,
}

impl Ownership {
    pub fn new(owner: Address) -> Self {
        Self { owner, pending: None }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn pending(&self) -> Option<PendingOwner> {
        self.pending
    }

    /// Fail with `Unauthorized` unless `caller` is the owner
    pub fn require_owner(&self, caller: &Address) -> CoreResult<()> {
        if *caller != self.owner {
            return Err(CoreError::Unauthorized {
                caller: *caller,
                required: self.owner,
            });
        }
        Ok(())
    }

    /// Propose `candidate`, accepted no earlier than `now + delay`
    pub fn propose(&mut self, caller: &Address, candidate: Address, now: i64, delay: i64) -> CoreResult<PendingOwner> {
        self.require_owner(caller)?;
        if delay < 0 {
            return Err(CoreError::invalid_parameter("delay", "must not be negative"));
        }
        let eta = safe_add_i64(now, delay)?;
        let pending = PendingOwner { candidate, eta };
        self.pending = Some(pending);
        log::info!("Ownership handoff to {} proposed, eta {}", candidate, eta);
        Ok(pending)
    }

    /// Complete the handoff; only the candidate may call, once `now >= eta`
    pub fn accept(&mut self, caller: &Address, now: i64) -> CoreResult<()> {
        let pending = self.pending.ok_or(CoreError::NoPendingOwner)?;
        if *caller != pending.candidate {
            return Err(CoreError::Unauthorized {
                caller: *caller,
                required: pending.candidate,
            });
        }
        if now < pending.eta {
            return Err(CoreError::TimelockActive { eta: pending.eta });
        }
        log::info!("Ownership transferred from {} to {}", self.owner, pending.candidate);
        self.owner = pending.candidate;
        self.pending = None;
        Ok(())
    }

    /// Drop a pending proposal
    pub fn cancel(&mut self, caller: &Address) -> CoreResult<()> {
        self.require_owner(caller)?;
        if self.pending.take().is_none() {
            return Err(CoreError::NoPendingOwner);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::repeat_byte(1)
    }

    fn candidate() -> Address {
        Address::repeat_byte(2)
    }

    #[test]
    fn test_handoff_respects_timelock() {
        let mut ownership = Ownership::new(owner());
        ownership.propose(&owner(), candidate(), 1_000, 300).unwrap();

        assert_eq!(ownership.accept(&candidate(), 1_299), Err(CoreError::TimelockActive { eta: 1_300 }));
        assert_eq!(ownership.owner(), owner());

        ownership.accept(&candidate(), 1_300).unwrap();
        assert_eq!(ownership.owner(), candidate());
        assert!(ownership.pending().is_none());
    }

    #[test]
    fn test_only_owner_proposes_only_candidate_accepts() {
        let mut ownership = Ownership::new(owner());
        assert!(matches!(
            ownership.propose(&candidate(), candidate(), 0, 0),
            Err(CoreError::Unauthorized { .. })
        ));
        assert_eq!(ownership.accept(&candidate(), 0), Err(CoreError::NoPendingOwner));

        ownership.propose(&owner(), candidate(), 0, 0).unwrap();
        assert!(matches!(
            ownership.accept(&Address::repeat_byte(3), 10),
            Err(CoreError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_cancel() {
        let mut ownership = Ownership::new(owner());
        assert_eq!(ownership.cancel(&owner()), Err(CoreError::NoPendingOwner));
        ownership.propose(&owner(), candidate(), 0, 10).unwrap();
        ownership.cancel(&owner()).unwrap();
        assert_eq!(ownership.accept(&candidate(), 100), Err(CoreError::NoPendingOwner));
    }
}
