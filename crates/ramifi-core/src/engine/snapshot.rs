//! # Engine Snapshots
//!
//! Versioned, serde-friendly copy of the full engine state. Share
//! quantities are 256-bit and travel as decimal strings.
//!
//! Version history:
//! - 1: policy parameters without rebase window or zero-delta flag
//! - 2: current layout

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::engine::RebaseEngine;
use crate::errors::{CoreError, CoreResult};
use crate::governance::Ownership;
use crate::math::U256;
use crate::oracle::{PriceObservation, ReferenceIndexOracle, ReferenceIndexRecord, ReferenceOracleConfig, TwapConfig, TwapOracle};
use crate::policy::{MonetaryPolicy, PolicyParams};
use crate::token::{ElasticToken, ShareLedger, TokenState};
use crate::types::{Address, RebaseEvent};

/// Layout version written by `snapshot`
pub const STATE_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub total_shares: String,
    pub total_supply: u128,
    pub ownership: Ownership,
    pub monetary_policy: Option<Address>,
    pub shares: BTreeMap<Address, String>,
    pub allowances: BTreeMap<Address, BTreeMap<Address, u128>>,
    pub last_epoch: Option<u64>,
    pub history: Vec<RebaseEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub address: Address,
    pub ownership: Ownership,
    pub params: PolicyParams,
    pub market_oracle: Option<Address>,
    pub cpi_oracle: Option<Address>,
    pub orchestrator: Option<Address>,
    pub epoch: u64,
    pub last_rebase_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwapSnapshot {
    pub address: Address,
    pub config: TwapConfig,
    pub observations: Vec<PriceObservation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    pub address: Address,
    pub ownership: Ownership,
    pub config: ReferenceOracleConfig,
    /// Newest-first reports per provider
    pub reports: BTreeMap<Address, Vec<ReferenceIndexRecord>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub version: u32,
    pub token: TokenSnapshot,
    pub policy: PolicySnapshot,
    pub market_oracle: TwapSnapshot,
    pub reference_oracle: ReferenceSnapshot,
}

// ============================================================================
// Version 1 layout
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyParamsV1 {
    pub min_rebase_interval: i64,
    pub deadband_bps: u64,
    pub max_positive_delta_bps: u64,
    pub max_negative_delta_bps: u64,
    pub rebase_lag: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshotV1 {
    pub address: Address,
    pub ownership: Ownership,
    pub params: PolicyParamsV1,
    pub market_oracle: Option<Address>,
    pub cpi_oracle: Option<Address>,
    pub orchestrator: Option<Address>,
    pub epoch: u64,
    pub last_rebase_timestamp: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshotV1 {
    pub version: u32,
    pub token: TokenSnapshot,
    pub policy: PolicySnapshotV1,
    pub market_oracle: TwapSnapshot,
    pub reference_oracle: ReferenceSnapshot,
}

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

impl EngineSnapshot {
    /// Parse any supported layout, upgrading older ones
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let probe: VersionProbe = serde_json::from_str(json).map_err(|e| CoreError::CorruptState(e.to_string()))?;
        match probe.version {
            1 => {
                let legacy: EngineSnapshotV1 =
                    serde_json::from_str(json).map_err(|e| CoreError::CorruptState(e.to_string()))?;
                RebaseEngine::migrate(legacy)
            }
            STATE_VERSION => serde_json::from_str(json).map_err(|e| CoreError::CorruptState(e.to_string())),
            found => Err(CoreError::UnsupportedStateVersion {
                found,
                current: STATE_VERSION,
            }),
        }
    }

    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::CorruptState(e.to_string()))
    }
}

impl RebaseEngine {
    /// Capture the full state at the current version
    pub fn snapshot(&self) -> CoreResult<EngineSnapshot> {
        let state = self.token.state()?;
        let token = TokenSnapshot {
            total_shares: state.ledger.total_shares().to_string(),
            total_supply: state.ledger.total_supply(),
            ownership: state.ownership,
            monetary_policy: state.monetary_policy,
            shares: state
                .ledger
                .accounts()
                .map(|(account, shares)| (*account, shares.to_string()))
                .collect(),
            allowances: state
                .allowances
                .iter()
                .map(|(owner, spenders)| (*owner, spenders.iter().map(|(s, a)| (*s, *a)).collect()))
                .collect(),
            last_epoch: state.last_epoch,
            history: state.history.clone(),
        };

        let policy = PolicySnapshot {
            address: self.policy.address(),
            ownership: *self.policy.ownership(),
            params: *self.policy.params(),
            market_oracle: self.policy.market_oracle(),
            cpi_oracle: self.policy.cpi_oracle(),
            orchestrator: self.policy.orchestrator(),
            epoch: self.policy.epoch(),
            last_rebase_timestamp: self.policy.last_rebase_timestamp(),
        };

        let market_oracle = TwapSnapshot {
            address: self.market_oracle.address(),
            config: *self.market_oracle.config(),
            observations: self.market_oracle.observations().copied().collect(),
        };

        let reference_oracle = ReferenceSnapshot {
            address: self.reference_oracle.address(),
            ownership: *self.reference_oracle.ownership(),
            config: *self.reference_oracle.config(),
            reports: self
                .reference_oracle
                .providers()
                .map(|p| (*p, self.reference_oracle.reports_of(p).to_vec()))
                .collect(),
        };

        Ok(EngineSnapshot {
            version: STATE_VERSION,
            token,
            policy,
            market_oracle,
            reference_oracle,
        })
    }

    /// Rebuild an engine, rejecting unknown versions and inconsistent state
    pub fn restore(snapshot: EngineSnapshot) -> CoreResult<Self> {
        if snapshot.version != STATE_VERSION {
            return Err(CoreError::UnsupportedStateVersion {
                found: snapshot.version,
                current: STATE_VERSION,
            });
        }

        let token = restore_token(snapshot.token)?;

        let p = snapshot.policy;
        let policy = MonetaryPolicy::from_parts(
            p.address,
            p.ownership,
            p.params,
            p.market_oracle,
            p.cpi_oracle,
            p.orchestrator,
            p.epoch,
            p.last_rebase_timestamp,
        )?;

        let m = snapshot.market_oracle;
        let market_oracle = TwapOracle::with_observations(m.address, m.config, m.observations)?;

        let r = snapshot.reference_oracle;
        let reference_oracle = ReferenceIndexOracle::from_parts(r.address, r.ownership, r.config, r.reports)?;

        log::info!(
            "Engine restored: supply {}, epoch {}",
            token.total_supply(),
            policy.epoch()
        );

        Ok(Self::from_parts(token, policy, market_oracle, reference_oracle))
    }

    /// Upgrade a version 1 snapshot: no window, zero deltas submitted
    pub fn migrate(legacy: EngineSnapshotV1) -> CoreResult<EngineSnapshot> {
        if legacy.version != 1 {
            return Err(CoreError::UnsupportedStateVersion {
                found: legacy.version,
                current: STATE_VERSION,
            });
        }
        let p = legacy.policy;
        let params = PolicyParams {
            min_rebase_interval: p.params.min_rebase_interval,
            deadband_bps: p.params.deadband_bps,
            max_positive_delta_bps: p.params.max_positive_delta_bps,
            max_negative_delta_bps: p.params.max_negative_delta_bps,
            rebase_lag: p.params.rebase_lag,
            window: None,
            submit_zero_delta: true,
            base_index: None,
        };
        log::info!("Migrating snapshot from version 1 to {}", STATE_VERSION);

        Ok(EngineSnapshot {
            version: STATE_VERSION,
            token: legacy.token,
            policy: PolicySnapshot {
                address: p.address,
                ownership: p.ownership,
                params,
                market_oracle: p.market_oracle,
                cpi_oracle: p.cpi_oracle,
                orchestrator: p.orchestrator,
                epoch: p.epoch,
                last_rebase_timestamp: p.last_rebase_timestamp,
            },
            market_oracle: legacy.market_oracle,
            reference_oracle: legacy.reference_oracle,
        })
    }
}

fn parse_u256(value: &str) -> CoreResult<U256> {
    U256::from_str_radix(value, 10).map_err(|e| CoreError::CorruptState(format!("bad share value {:?}: {}", value, e)))
}

fn restore_token(snapshot: TokenSnapshot) -> CoreResult<ElasticToken> {
    let total_shares = parse_u256(&snapshot.total_shares)?;
    let shares = snapshot
        .shares
        .iter()
        .map(|(account, value)| Ok((*account, parse_u256(value)?)))
        .collect::<CoreResult<HashMap<_, _>>>()?;
    let ledger = ShareLedger::from_parts(total_shares, snapshot.total_supply, shares)?;

    let allowances = snapshot
        .allowances
        .into_iter()
        .map(|(owner, spenders)| (owner, spenders.into_iter().collect()))
        .collect();

    Ok(ElasticToken::from_state(TokenState {
        ledger,
        ownership: snapshot.ownership,
        monetary_policy: snapshot.monetary_policy,
        allowances,
        last_epoch: snapshot.last_epoch,
        history: snapshot.history,
    }))
}
