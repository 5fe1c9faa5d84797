//! # Monetary Policy
//!
//! One rebase cycle: read the market TWAP and the reference index, turn
//! their deviation into a damped, bounded supply delta and hand it to the
//! token under the next epoch.
//!
//! ```text
//! deviation_bps = (market - target) * 10_000 / target
//! delta         = supply * deviation_bps / (10_000 * rebase_lag)
//! ```
//!
//! Deviations inside the deadband produce a zero delta. The delta is then
//! clamped to the configured share of supply.

use crate::constants::{BPS_DENOMINATOR, MAX_RATE};
use crate::errors::{CoreError, CoreResult, OracleKind};
use crate::governance::Ownership;
use crate::math::{mul_div_u256, narrow_u128, safe_add_u64, Rounding, U256};
use crate::oracle::PriceFeed;
use crate::policy::{PolicyParams, RebaseWindow};
use crate::token::ElasticToken;
use crate::types::{Address, RebaseOutcome};

/// Delta computation result, before anything is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplyDelta {
    /// Market price after the `MAX_RATE` cap
    pub market_price: u128,
    pub target_price: u128,
    pub deviation_bps: i128,
    pub supply_delta: i128,
}

/// Rebase controller bound to one token
#[derive(Debug, Clone)]
pub struct MonetaryPolicy {
    address: Address,
    ownership: Ownership,
    params: PolicyParams,
    market_oracle: Option<Address>,
    cpi_oracle: Option<Address>,
    orchestrator: Option<Address>,
    /// Last epoch submitted to the token
    epoch: u64,
    last_rebase_timestamp: Option<i64>,
}

impl MonetaryPolicy {
    pub fn new(address: Address, owner: Address, params: PolicyParams) -> CoreResult<Self> {
        params.validate()?;
        Ok(Self {
            address,
            ownership: Ownership::new(owner),
            params,
            market_oracle: None,
            cpi_oracle: None,
            orchestrator: None,
            epoch: 0,
            last_rebase_timestamp: None,
        })
    }

    /// Rebuild persisted policy state
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        address: Address,
        ownership: Ownership,
        params: PolicyParams,
        market_oracle: Option<Address>,
        cpi_oracle: Option<Address>,
        orchestrator: Option<Address>,
        epoch: u64,
        last_rebase_timestamp: Option<i64>,
    ) -> CoreResult<Self> {
        params.validate()?;
        Ok(Self {
            address,
            ownership,
            params,
            market_oracle,
            cpi_oracle,
            orchestrator,
            epoch,
            last_rebase_timestamp,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut Ownership {
        &mut self.ownership
    }

    pub fn params(&self) -> &PolicyParams {
        &self.params
    }

    pub fn market_oracle(&self) -> Option<Address> {
        self.market_oracle
    }

    pub fn cpi_oracle(&self) -> Option<Address> {
        self.cpi_oracle
    }

    pub fn orchestrator(&self) -> Option<Address> {
        self.orchestrator
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_rebase_timestamp(&self) -> Option<i64> {
        self.last_rebase_timestamp
    }

    // ========================================================================
    // Owner Setters
    // ========================================================================

    pub fn set_market_oracle(&mut self, caller: &Address, oracle: Address) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        self.market_oracle = Some(oracle);
        log::info!("Market oracle set to {}", oracle);
        Ok(())
    }

    pub fn set_cpi_oracle(&mut self, caller: &Address, oracle: Address) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        self.cpi_oracle = Some(oracle);
        log::info!("Reference index oracle set to {}", oracle);
        Ok(())
    }

    pub fn set_orchestrator(&mut self, caller: &Address, orchestrator: Address) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        self.orchestrator = Some(orchestrator);
        log::info!("Orchestrator set to {}", orchestrator);
        Ok(())
    }

    pub fn set_params(&mut self, caller: &Address, params: PolicyParams) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        params.validate()?;
        self.params = params;
        log::info!("Policy parameters updated: {:?}", params);
        Ok(())
    }

    // ========================================================================
    // Rebase Cycle
    // ========================================================================

    /// Pure delta computation for a given supply and price pair
    pub fn compute_supply_delta(
        &self,
        total_supply: u128,
        market_price: u128,
        target_price: u128,
    ) -> CoreResult<SupplyDelta> {
        let market_price = market_price.min(MAX_RATE);
        let deviation_bps = deviation_bps(market_price, target_price)?;

        let supply_delta = if deviation_bps.unsigned_abs() < self.params.deadband_bps as u128 {
            0
        } else {
            damped_delta(total_supply, deviation_bps, &self.params)?
        };

        Ok(SupplyDelta {
            market_price,
            target_price,
            deviation_bps,
            supply_delta,
        })
    }

    /// Run every check and read both oracles without applying anything
    pub fn preview_rebase(
        &self,
        caller: &Address,
        now: i64,
        token: &ElasticToken,
        market: &dyn PriceFeed,
        index: &dyn PriceFeed,
    ) -> CoreResult<SupplyDelta> {
        self.check_cycle(caller, now, market, index)?;

        let market_price = market
            .price_at(now)
            .map_err(|e| CoreError::stale_oracle(OracleKind::Market, &e))?;
        let index_value = index
            .price_at(now)
            .map_err(|e| CoreError::stale_oracle(OracleKind::ReferenceIndex, &e))?;
        let target_price = self.params.target_price(index_value)?;

        self.compute_supply_delta(token.total_supply(), market_price, target_price)
    }

    /// Orchestrator entry point: compute the delta and rebase the token
    pub fn compute_and_apply_rebase(
        &mut self,
        caller: &Address,
        now: i64,
        token: &mut ElasticToken,
        market: &dyn PriceFeed,
        index: &dyn PriceFeed,
    ) -> CoreResult<RebaseOutcome> {
        let delta = self.preview_rebase(caller, now, token, market, index)?;

        let event = if delta.supply_delta != 0 || self.params.submit_zero_delta {
            let epoch = safe_add_u64(self.epoch, 1)?;
            let event = token.rebase(&self.address, epoch, delta.supply_delta, now)?;
            self.epoch = epoch;
            Some(event)
        } else {
            log::debug!("Zero supply delta, rebase not submitted");
            None
        };

        self.last_rebase_timestamp = Some(match self.params.window {
            Some(window) => window.start_for(now, self.params.min_rebase_interval),
            None => now,
        });

        log::info!(
            "Policy cycle at {}: market {} target {} deviation {}bps delta {}",
            now,
            delta.market_price,
            delta.target_price,
            delta.deviation_bps,
            delta.supply_delta
        );

        Ok(RebaseOutcome {
            market_price: delta.market_price,
            target_price: delta.target_price,
            deviation_bps: delta.deviation_bps,
            supply_delta: delta.supply_delta,
            event,
        })
    }

    /// Authorization, wiring, cooldown and window checks
    fn check_cycle(&self, caller: &Address, now: i64, market: &dyn PriceFeed, index: &dyn PriceFeed) -> CoreResult<()> {
        let orchestrator = self.orchestrator.unwrap_or(Address::ZERO);
        if *caller != orchestrator || orchestrator.is_zero() {
            return Err(CoreError::Unauthorized {
                caller: *caller,
                required: orchestrator,
            });
        }

        let market_oracle = self
            .market_oracle
            .ok_or(CoreError::OracleNotConfigured(OracleKind::Market))?;
        let cpi_oracle = self
            .cpi_oracle
            .ok_or(CoreError::OracleNotConfigured(OracleKind::ReferenceIndex))?;
        if market.address() != market_oracle {
            return Err(CoreError::Unauthorized {
                caller: market.address(),
                required: market_oracle,
            });
        }
        if index.address() != cpi_oracle {
            return Err(CoreError::Unauthorized {
                caller: index.address(),
                required: cpi_oracle,
            });
        }

        if let Some(last) = self.last_rebase_timestamp {
            let elapsed = now.saturating_sub(last);
            if elapsed < self.params.min_rebase_interval {
                return Err(CoreError::CooldownActive {
                    elapsed,
                    min_interval: self.params.min_rebase_interval,
                });
            }
        }

        if let Some(window) = self.params.window {
            if !window.contains(now, self.params.min_rebase_interval) {
                return Err(CoreError::OutsideRebaseWindow {
                    offset_in_interval: RebaseWindow::offset_in_interval(now, self.params.min_rebase_interval),
                });
            }
        }

        Ok(())
    }
}

/// Signed deviation of `market` from `target` in basis points, truncated
/// toward zero
pub fn deviation_bps(market: u128, target: u128) -> CoreResult<i128> {
    if target == 0 {
        return Err(CoreError::DivisionByZero);
    }
    let (diff, negative) = if market >= target {
        (market - target, false)
    } else {
        (target - market, true)
    };
    let magnitude = narrow_u128(mul_div_u256(diff, BPS_DENOMINATOR as u128, target, Rounding::Down)?)
        .and_then(|m| i128::try_from(m).ok())
        .ok_or(CoreError::MathOverflow)?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// `supply * deviation / (10_000 * lag)`, bounded by the per-direction cap
fn damped_delta(total_supply: u128, deviation_bps: i128, params: &PolicyParams) -> CoreResult<i128> {
    let denominator = U256::from(BPS_DENOMINATOR) * U256::from(params.rebase_lag);
    let raw = U256::from(total_supply) * U256::from(deviation_bps.unsigned_abs()) / denominator;

    let cap_bps = if deviation_bps >= 0 {
        params.max_positive_delta_bps
    } else {
        params.max_negative_delta_bps
    };
    let cap = U256::from(total_supply) * U256::from(cap_bps) / U256::from(BPS_DENOMINATOR);

    let bounded = raw.min(cap).min(U256::from(i128::MAX as u128));
    let magnitude = narrow_u128(bounded)
        .and_then(|m| i128::try_from(m).ok())
        .ok_or(CoreError::MathOverflow)?;
    Ok(if deviation_bps >= 0 { magnitude } else { -magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RATE_ONE;

    struct FixedFeed {
        address: Address,
        price: CoreResult<u128>,
    }

    impl PriceFeed for FixedFeed {
        fn address(&self) -> Address {
            self.address
        }

        fn price_at(&self, _now: i64) -> CoreResult<u128> {
            self.price.clone()
        }
    }

    fn owner() -> Address {
        Address::from_low_u64(1)
    }

    fn orchestrator() -> Address {
        Address::from_low_u64(2)
    }

    fn policy_address() -> Address {
        Address::from_low_u64(3)
    }

    fn market(price: u128) -> FixedFeed {
        FixedFeed { address: Address::from_low_u64(10), price: Ok(price) }
    }

    fn index(price: u128) -> FixedFeed {
        FixedFeed { address: Address::from_low_u64(11), price: Ok(price) }
    }

    fn setup(params: PolicyParams) -> (MonetaryPolicy, ElasticToken) {
        let mut policy = MonetaryPolicy::new(policy_address(), owner(), params).unwrap();
        policy.set_market_oracle(&owner(), Address::from_low_u64(10)).unwrap();
        policy.set_cpi_oracle(&owner(), Address::from_low_u64(11)).unwrap();
        policy.set_orchestrator(&owner(), orchestrator()).unwrap();

        let mut token = ElasticToken::genesis(owner(), 1_000_000).unwrap();
        token.set_monetary_policy(&owner(), policy_address()).unwrap();
        (policy, token)
    }

    fn no_lag() -> PolicyParams {
        PolicyParams {
            rebase_lag: 1,
            deadband_bps: 0,
            max_positive_delta_bps: 10_000,
            max_negative_delta_bps: 10_000,
            ..PolicyParams::default()
        }
    }

    #[test]
    fn test_deviation_bps() {
        assert_eq!(deviation_bps(110, 100).unwrap(), 1_000);
        assert_eq!(deviation_bps(90, 100).unwrap(), -1_000);
        assert_eq!(deviation_bps(100, 100).unwrap(), 0);
        // truncates toward zero in both directions
        assert_eq!(deviation_bps(3, 7).unwrap(), -5_714);
        assert_eq!(deviation_bps(1, 0), Err(CoreError::DivisionByZero));
    }

    #[test]
    fn test_deadband_gives_zero_delta() {
        let (policy, _) = setup(PolicyParams { deadband_bps: 500, ..PolicyParams::default() });
        let delta = policy.compute_supply_delta(1_000_000, 104 * RATE_ONE / 100, RATE_ONE).unwrap();
        assert_eq!(delta.deviation_bps, 400);
        assert_eq!(delta.supply_delta, 0);
    }

    #[test]
    fn test_lag_damps_delta() {
        let (policy, _) = setup(PolicyParams {
            rebase_lag: 10,
            deadband_bps: 0,
            ..PolicyParams::default()
        });
        // 10% above target, lag 10 -> 1% expansion
        let delta = policy.compute_supply_delta(1_000_000, 110 * RATE_ONE / 100, RATE_ONE).unwrap();
        assert_eq!(delta.supply_delta, 10_000);

        let delta = policy.compute_supply_delta(1_000_000, 90 * RATE_ONE / 100, RATE_ONE).unwrap();
        assert_eq!(delta.supply_delta, -10_000);
    }

    #[test]
    fn test_delta_clamped_to_bounds() {
        let (policy, _) = setup(PolicyParams {
            rebase_lag: 1,
            deadband_bps: 0,
            max_positive_delta_bps: 500,
            max_negative_delta_bps: 200,
            ..PolicyParams::default()
        });
        let up = policy.compute_supply_delta(1_000_000, 2 * RATE_ONE, RATE_ONE).unwrap();
        assert_eq!(up.supply_delta, 50_000);
        let down = policy.compute_supply_delta(1_000_000, RATE_ONE / 2, RATE_ONE).unwrap();
        assert_eq!(down.supply_delta, -20_000);
    }

    #[test]
    fn test_market_price_capped() {
        let (policy, _) = setup(no_lag());
        let delta = policy.compute_supply_delta(1_000, u128::MAX, RATE_ONE).unwrap();
        assert_eq!(delta.market_price, MAX_RATE);
    }

    #[test]
    fn test_apply_rebase_and_cooldown() {
        let (mut policy, mut token) = setup(no_lag());
        let outcome = policy
            .compute_and_apply_rebase(&orchestrator(), 100_000, &mut token, &market(2 * RATE_ONE), &index(RATE_ONE))
            .unwrap();
        assert_eq!(outcome.supply_delta, 1_000_000);
        assert_eq!(outcome.event.unwrap().epoch, 1);
        assert_eq!(token.total_supply(), 2_000_000);
        assert_eq!(policy.epoch(), 1);
        assert_eq!(policy.last_rebase_timestamp(), Some(100_000));

        let err = policy
            .compute_and_apply_rebase(&orchestrator(), 100_000 + 86_399, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap_err();
        assert_eq!(err, CoreError::CooldownActive { elapsed: 86_399, min_interval: 86_400 });

        let outcome = policy
            .compute_and_apply_rebase(&orchestrator(), 100_000 + 86_400, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap();
        assert_eq!(outcome.supply_delta, 0);
        assert_eq!(outcome.event.unwrap().epoch, 2);
        assert_eq!(token.total_supply(), 2_000_000);
    }

    #[test]
    fn test_base_index_sets_target() {
        let (mut policy, mut token) = setup(PolicyParams { base_index: Some(2_534), ..no_lag() });
        // index 5_068 is twice the base, so the target is 2.0 and a market at 1.0 is 50% low
        let outcome = policy
            .compute_and_apply_rebase(&orchestrator(), 100_000, &mut token, &market(RATE_ONE), &index(5_068))
            .unwrap();
        assert_eq!(outcome.target_price, 2 * RATE_ONE);
        assert_eq!(outcome.deviation_bps, -5_000);
        assert_eq!(token.total_supply(), 500_000);
    }

    #[test]
    fn test_zero_delta_not_submitted_when_disabled() {
        let (mut policy, mut token) = setup(PolicyParams { submit_zero_delta: false, ..no_lag() });
        let outcome = policy
            .compute_and_apply_rebase(&orchestrator(), 100_000, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap();
        assert!(outcome.event.is_none());
        assert_eq!(policy.epoch(), 0);
        assert_eq!(token.last_epoch(), None);
        // the cycle still counts for the cooldown
        assert_eq!(policy.last_rebase_timestamp(), Some(100_000));
    }

    #[test]
    fn test_only_orchestrator() {
        let (mut policy, mut token) = setup(no_lag());
        let err = policy
            .compute_and_apply_rebase(&owner(), 100_000, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap_err();
        assert_eq!(err, CoreError::Unauthorized { caller: owner(), required: orchestrator() });
    }

    #[test]
    fn test_oracle_wiring_checked() {
        let mut policy = MonetaryPolicy::new(policy_address(), owner(), no_lag()).unwrap();
        policy.set_orchestrator(&owner(), orchestrator()).unwrap();
        let mut token = ElasticToken::genesis(owner(), 1_000).unwrap();

        let err = policy
            .compute_and_apply_rebase(&orchestrator(), 0, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap_err();
        assert_eq!(err, CoreError::OracleNotConfigured(OracleKind::Market));

        policy.set_market_oracle(&owner(), Address::from_low_u64(10)).unwrap();
        policy.set_cpi_oracle(&owner(), Address::from_low_u64(99)).unwrap();
        let err = policy
            .compute_and_apply_rebase(&orchestrator(), 0, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized { .. }));
    }

    #[test]
    fn test_oracle_failure_becomes_stale_oracle_data() {
        let (mut policy, mut token) = setup(no_lag());
        let failing = FixedFeed {
            address: Address::from_low_u64(11),
            price: Err(CoreError::InsufficientConsensus { valid: 0, required: 1 }),
        };
        let err = policy
            .compute_and_apply_rebase(&orchestrator(), 100_000, &mut token, &market(RATE_ONE), &failing)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::StaleOracleData { oracle: OracleKind::ReferenceIndex, .. }
        ));
        assert!(err.is_retryable());
        assert_eq!(policy.epoch(), 0);
        assert_eq!(policy.last_rebase_timestamp(), None);
    }

    #[test]
    fn test_rebase_window() {
        let day = 86_400;
        let (mut policy, mut token) = setup(PolicyParams {
            window: Some(RebaseWindow { offset_sec: 7_200, length_sec: 1_200 }),
            ..no_lag()
        });

        let err = policy
            .compute_and_apply_rebase(&orchestrator(), 10 * day + 100, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap_err();
        assert_eq!(err, CoreError::OutsideRebaseWindow { offset_in_interval: 100 });

        policy
            .compute_and_apply_rebase(&orchestrator(), 10 * day + 7_500, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap();
        assert_eq!(policy.last_rebase_timestamp(), Some(10 * day + 7_200));

        // next window opens exactly one interval after the snapped start
        policy
            .compute_and_apply_rebase(&orchestrator(), 11 * day + 7_200, &mut token, &market(RATE_ONE), &index(RATE_ONE))
            .unwrap();
        assert_eq!(policy.epoch(), 2);
    }

    #[test]
    fn test_setters_owner_only() {
        let (mut policy, _) = setup(no_lag());
        let stranger = Address::from_low_u64(77);
        assert!(matches!(policy.set_orchestrator(&stranger, stranger), Err(CoreError::Unauthorized { .. })));
        assert!(matches!(
            policy.set_params(&owner(), PolicyParams { rebase_lag: 0, ..no_lag() }),
            Err(CoreError::InvalidParameter { .. })
        ));
        assert_eq!(policy.params().rebase_lag, 1);
    }
}
