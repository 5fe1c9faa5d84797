//! # Rebase Engine
//!
//! Owns one token, its policy and both oracles, and wires their identities
//! together at genesis. The keeper drives everything through this type.

#[cfg(feature = "client")]
pub mod snapshot;

#[cfg(feature = "client")]
pub use snapshot::*;

use crate::errors::CoreResult;
use crate::oracle::{ReferenceIndexOracle, ReferenceOracleConfig, TwapConfig, TwapOracle};
use crate::policy::{MonetaryPolicy, PolicyParams, SupplyDelta};
use crate::token::ElasticToken;
use crate::types::{Address, RebaseOutcome};

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Everything needed to stand up a fresh engine
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Receives the genesis supply and owns every component
    pub owner: Address,
    pub orchestrator: Address,
    pub policy_address: Address,
    pub market_oracle_address: Address,
    pub index_oracle_address: Address,
    pub initial_supply: u128,
    pub policy: PolicyParams,
    pub twap: TwapConfig,
    pub reference: ReferenceOracleConfig,
    /// Reference index providers allowed at genesis
    pub providers: Vec<Address>,
}

#[derive(Debug, Clone)]
pub struct RebaseEngine {
    token: ElasticToken,
    policy: MonetaryPolicy,
    market_oracle: TwapOracle,
    reference_oracle: ReferenceIndexOracle,
}

impl RebaseEngine {
    /// Build and wire all components
    pub fn genesis(config: &EngineConfig) -> CoreResult<Self> {
        let owner = config.owner;

        let mut token = ElasticToken::genesis(owner, config.initial_supply)?;
        let mut policy = MonetaryPolicy::new(config.policy_address, owner, config.policy)?;
        let market_oracle = TwapOracle::new(config.market_oracle_address, config.twap)?;
        let mut reference_oracle = ReferenceIndexOracle::new(config.index_oracle_address, owner, config.reference)?;

        token.set_monetary_policy(&owner, policy.address())?;
        policy.set_market_oracle(&owner, market_oracle.address())?;
        policy.set_cpi_oracle(&owner, reference_oracle.address())?;
        policy.set_orchestrator(&owner, config.orchestrator)?;
        for provider in &config.providers {
            reference_oracle.add_provider(&owner, *provider)?;
        }

        log::info!(
            "Engine genesis: supply {}, policy {}, orchestrator {}, {} providers",
            config.initial_supply,
            policy.address(),
            config.orchestrator,
            config.providers.len()
        );

        Ok(Self {
            token,
            policy,
            market_oracle,
            reference_oracle,
        })
    }

    pub(crate) fn from_parts(
        token: ElasticToken,
        policy: MonetaryPolicy,
        market_oracle: TwapOracle,
        reference_oracle: ReferenceIndexOracle,
    ) -> Self {
        Self {
            token,
            policy,
            market_oracle,
            reference_oracle,
        }
    }

    pub fn token(&self) -> &ElasticToken {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut ElasticToken {
        &mut self.token
    }

    pub fn policy(&self) -> &MonetaryPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut MonetaryPolicy {
        &mut self.policy
    }

    pub fn market_oracle(&self) -> &TwapOracle {
        &self.market_oracle
    }

    pub fn reference_oracle(&self) -> &ReferenceIndexOracle {
        &self.reference_oracle
    }

    pub fn reference_oracle_mut(&mut self) -> &mut ReferenceIndexOracle {
        &mut self.reference_oracle
    }

    /// Feed one cumulative-price sample from the pool
    pub fn ingest_observation(&mut self, cumulative_price: u128, timestamp: i64) -> CoreResult<()> {
        self.market_oracle.record_observation(cumulative_price, timestamp)
    }

    /// Feed one reference index report
    pub fn push_index(&mut self, provider: &Address, value: u128, timestamp: i64) -> CoreResult<()> {
        self.reference_oracle.push(provider, value, timestamp)
    }

    /// What a cycle at `now` would do, without applying it
    pub fn preview(&self, caller: &Address, now: i64) -> CoreResult<SupplyDelta> {
        self.policy
            .preview_rebase(caller, now, &self.token, &self.market_oracle, &self.reference_oracle)
    }

    /// Run one policy cycle as `caller`
    pub fn rebase(&mut self, caller: &Address, now: i64) -> CoreResult<RebaseOutcome> {
        self.policy.compute_and_apply_rebase(
            caller,
            now,
            &mut self.token,
            &self.market_oracle,
            &self.reference_oracle,
        )
    }
}
