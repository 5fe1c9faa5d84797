//! # Elastic Token
//!
//! ERC20-style surface over the [`ShareLedger`]. Amounts are in external
//! units; every movement converts the amount to shares once and moves that
//! exact share quantity, so both legs of a transfer see the same rounding.
//!
//! Only the registered monetary policy may rebase. A rebase changes the
//! total supply and nothing else.

use std::collections::HashMap;

use crate::constants::{MAX_SUPPLY, MIN_SUPPLY};
use crate::errors::{CoreError, CoreResult};
use crate::governance::{Ownership, PendingOwner};
use crate::math::{apply_signed_delta, safe_add_u128, U256};
use crate::token::ShareLedger;
use crate::types::{Address, RebaseEvent, TransferEvent};

/// Live token state, present once initialized
#[derive(Debug, Clone)]
pub(crate) struct TokenState {
    pub(crate) ledger: ShareLedger,
    pub(crate) ownership: Ownership,
    pub(crate) monetary_policy: Option<Address>,
    /// owner -> spender -> amount
    pub(crate) allowances: HashMap<Address, HashMap<Address, u128>>,
    pub(crate) last_epoch: Option<u64>,
    pub(crate) history: Vec<RebaseEvent>,
}

/// Rebasing token
#[derive(Debug, Clone, Default)]
pub struct ElasticToken {
    state: Option<TokenState>,
}

impl ElasticToken {
    /// Uninitialized token
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialized token with `initial_supply` owned by `owner`
    pub fn genesis(owner: Address, initial_supply: u128) -> CoreResult<Self> {
        let mut token = Self::new();
        token.initialize(owner, initial_supply)?;
        Ok(token)
    }

    pub(crate) fn from_state(state: TokenState) -> Self {
        Self { state: Some(state) }
    }

    pub(crate) fn state(&self) -> CoreResult<&TokenState> {
        self.state.as_ref().ok_or(CoreError::NotInitialized)
    }

    fn state_mut(&mut self) -> CoreResult<&mut TokenState> {
        self.state.as_mut().ok_or(CoreError::NotInitialized)
    }

    /// One-time setup: all shares to `owner`, who also owns the token
    pub fn initialize(&mut self, owner: Address, initial_supply: u128) -> CoreResult<()> {
        if self.state.is_some() {
            return Err(CoreError::AlreadyInitialized);
        }
        let ledger = ShareLedger::genesis(initial_supply, owner)?;
        self.state = Some(TokenState {
            ledger,
            ownership: Ownership::new(owner),
            monetary_policy: None,
            allowances: HashMap::new(),
            last_epoch: None,
            history: Vec::new(),
        });
        log::info!("Token initialized: supply {} to {}", initial_supply, owner);
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    // ========================================================================
    // Views
    // ========================================================================

    /// Total supply in external units (0 before initialization)
    pub fn total_supply(&self) -> u128 {
        self.state.as_ref().map(|s| s.ledger.total_supply()).unwrap_or(0)
    }

    /// Balance in external units (0 before initialization)
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.state.as_ref().map(|s| s.ledger.balance_of(account)).unwrap_or(0)
    }

    /// Raw share balance
    pub fn shares_of(&self, account: &Address) -> U256 {
        self.state.as_ref().map(|s| s.ledger.shares_of(account)).unwrap_or(U256::ZERO)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state
            .as_ref()
            .and_then(|s| s.allowances.get(owner))
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn ledger(&self) -> CoreResult<&ShareLedger> {
        Ok(&self.state()?.ledger)
    }

    pub fn owner(&self) -> CoreResult<Address> {
        Ok(self.state()?.ownership.owner())
    }

    pub fn monetary_policy(&self) -> Option<Address> {
        self.state.as_ref().and_then(|s| s.monetary_policy)
    }

    pub fn last_epoch(&self) -> Option<u64> {
        self.state.as_ref().and_then(|s| s.last_epoch)
    }

    /// All applied rebases, oldest first
    pub fn rebase_history(&self) -> &[RebaseEvent] {
        self.state.as_ref().map(|s| s.history.as_slice()).unwrap_or(&[])
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Move `amount` from `from` to `to`
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> CoreResult<TransferEvent> {
        require_recipient(to)?;
        let state = self.state_mut()?;
        move_amount(&mut state.ledger, from, to, amount)?;
        Ok(TransferEvent { from: *from, to: *to, amount })
    }

    /// Move the sender's entire share balance, leaving no dust behind
    pub fn transfer_all(&mut self, from: &Address, to: &Address) -> CoreResult<TransferEvent> {
        require_recipient(to)?;
        let state = self.state_mut()?;
        let shares = state.ledger.shares_of(from);
        let amount = state.ledger.shares_to_amount(shares);
        state.ledger.move_shares(from, to, shares)?;
        Ok(TransferEvent { from: *from, to: *to, amount })
    }

    /// Set the amount `spender` may move out of `owner`'s balance
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) -> CoreResult<()> {
        let state = self.state_mut()?;
        state.allowances.entry(*owner).or_default().insert(*spender, amount);
        Ok(())
    }

    pub fn increase_allowance(&mut self, owner: &Address, spender: &Address, added: u128) -> CoreResult<u128> {
        let current = self.allowance(owner, spender);
        let updated = safe_add_u128(current, added)?;
        self.approve(owner, spender, updated)?;
        Ok(updated)
    }

    /// Lower an allowance, stopping at zero
    pub fn decrease_allowance(&mut self, owner: &Address, spender: &Address, subtracted: u128) -> CoreResult<u128> {
        let updated = self.allowance(owner, spender).saturating_sub(subtracted);
        self.approve(owner, spender, updated)?;
        Ok(updated)
    }

    /// Spend `spender`'s allowance on `from` to move `amount` to `to`
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> CoreResult<TransferEvent> {
        require_recipient(to)?;
        self.state()?;
        let approved = self.allowance(from, spender);
        if approved < amount {
            return Err(CoreError::InsufficientAllowance {
                approved,
                requested: amount,
            });
        }

        let state = self.state_mut()?;
        move_amount(&mut state.ledger, from, to, amount)?;
        state
            .allowances
            .entry(*from)
            .or_default()
            .insert(*spender, approved - amount);
        Ok(TransferEvent { from: *from, to: *to, amount })
    }

    // ========================================================================
    // Supply Control
    // ========================================================================

    /// Register the only address allowed to rebase
    pub fn set_monetary_policy(&mut self, caller: &Address, policy: Address) -> CoreResult<()> {
        let state = self.state_mut()?;
        state.ownership.require_owner(caller)?;
        state.monetary_policy = Some(policy);
        log::info!("Monetary policy set to {}", policy);
        Ok(())
    }

    /// Change total supply by `supply_delta`, clamped into
    /// `[MIN_SUPPLY, MAX_SUPPLY]`. Individual share balances are untouched.
    pub fn rebase(
        &mut self,
        caller: &Address,
        epoch: u64,
        supply_delta: i128,
        timestamp: i64,
    ) -> CoreResult<RebaseEvent> {
        let state = self.state_mut()?;
        match state.monetary_policy {
            Some(policy) if policy == *caller => {}
            Some(policy) => {
                return Err(CoreError::Unauthorized {
                    caller: *caller,
                    required: policy,
                })
            }
            None => {
                return Err(CoreError::Unauthorized {
                    caller: *caller,
                    required: Address::ZERO,
                })
            }
        }
        if let Some(last_epoch) = state.last_epoch {
            if epoch <= last_epoch {
                return Err(CoreError::StaleEpoch { epoch, last_epoch });
            }
        }

        let before = state.ledger.total_supply();
        let (after, clamped) = apply_signed_delta(before, supply_delta, MIN_SUPPLY, MAX_SUPPLY);
        // |applied| <= |supply_delta|, so it always fits back into i128
        let applied_delta = if after >= before {
            i128::try_from(after - before).map_err(|_| CoreError::MathOverflow)?
        } else {
            0i128.checked_sub_unsigned(before - after).ok_or(CoreError::MathOverflow)?
        };

        state.ledger.set_total_supply(after);
        state.last_epoch = Some(epoch);

        let event = RebaseEvent {
            epoch,
            timestamp,
            requested_delta: supply_delta,
            applied_delta,
            resulting_total_supply: after,
            clamped,
        };
        state.history.push(event);

        if clamped {
            log::warn!(
                "Rebase epoch {} clamped: requested {}, applied {}, supply {}",
                epoch, supply_delta, applied_delta, after
            );
        } else {
            log::info!("Rebase epoch {}: delta {}, supply {} -> {}", epoch, applied_delta, before, after);
        }

        Ok(event)
    }

    // ========================================================================
    // Ownership
    // ========================================================================

    pub fn propose_owner(&mut self, caller: &Address, candidate: Address, now: i64, delay: i64) -> CoreResult<PendingOwner> {
        self.state_mut()?.ownership.propose(caller, candidate, now, delay)
    }

    pub fn accept_owner(&mut self, caller: &Address, now: i64) -> CoreResult<()> {
        self.state_mut()?.ownership.accept(caller, now)
    }
}

fn require_recipient(to: &Address) -> CoreResult<()> {
    if to.is_zero() {
        return Err(CoreError::invalid_parameter("to", "zero address"));
    }
    Ok(())
}

/// Shared leg of `transfer` and `transfer_from`
fn move_amount(ledger: &mut ShareLedger, from: &Address, to: &Address, amount: u128) -> CoreResult<()> {
    // amount <= floor(shares / k)  <=>  amount * k <= shares
    let have = ledger.balance_of(from);
    if amount > have {
        return Err(CoreError::InsufficientBalance { have, need: amount });
    }
    let shares = ledger.amount_to_shares(amount)?;
    ledger.move_shares(from, to, shares)
}
