//! # TWAP (Time-Weighted Average Price) Oracle
//!
//! Turns raw cumulative-price observations from a liquidity pool into a
//! time-weighted average price. The pool's accumulator is a `u128` that is
//! allowed to overflow; differences are taken modulo 2^128, which stays
//! correct as long as less than one full wrap happens between the two
//! observations used.

use std::collections::VecDeque;

use crate::constants::{DEFAULT_MAX_OBSERVATIONS, DEFAULT_TWAP_MIN_PERIOD};
use crate::errors::{CoreError, CoreResult};
use crate::oracle::PriceFeed;
use crate::types::Address;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Cumulative price observation at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct PriceObservation {
    /// Pool accumulator: sum of price * seconds, wraps on overflow
    pub cumulative_price: u128,
    /// Timestamp of observation (unix seconds)
    pub timestamp: i64,
}

/// TWAP oracle configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct TwapConfig {
    /// Minimum span between the two observations a TWAP is taken over
    pub min_period: i64,
    /// Maximum age of the latest observation when read with `twap_at`
    pub max_staleness: i64,
    /// Observations kept in the ring. Samples are thinned so that a full
    /// ring always spans `min_period`.
    pub max_observations: usize,
}

impl Default for TwapConfig {
    fn default() -> Self {
        Self {
            min_period: DEFAULT_TWAP_MIN_PERIOD,
            max_staleness: 2 * DEFAULT_TWAP_MIN_PERIOD,
            max_observations: DEFAULT_MAX_OBSERVATIONS,
        }
    }
}

impl TwapConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.min_period <= 0 {
            return Err(CoreError::invalid_parameter("min_period", "must be positive"));
        }
        if self.max_staleness <= 0 {
            return Err(CoreError::invalid_parameter("max_staleness", "must be positive"));
        }
        if self.max_observations < 3 {
            return Err(CoreError::invalid_parameter(
                "max_observations",
                "need room for an anchor, a spaced sample and the latest",
            ));
        }
        Ok(())
    }

    /// Minimum spacing between retained observations. With `max_observations`
    /// entries the `max_observations - 2` spaced gaps add up to `min_period`.
    pub fn sample_spacing(&self) -> i64 {
        let gaps = self.max_observations.saturating_sub(2).max(1) as i64;
        self.min_period / gaps + i64::from(self.min_period % gaps != 0)
    }
}

/// TWAP oracle maintaining a bounded observation history
#[derive(Debug, Clone)]
pub struct TwapOracle {
    address: Address,
    config: TwapConfig,
    /// Oldest first
    observations: VecDeque<PriceObservation>,
}

impl TwapOracle {
    /// Create new TWAP oracle
    pub fn new(address: Address, config: TwapConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            address,
            config,
            observations: VecDeque::with_capacity(config.max_observations),
        })
    }

    /// Rebuild from persisted observations, re-validating their order
    pub fn with_observations(
        address: Address,
        config: TwapConfig,
        observations: impl IntoIterator<Item = PriceObservation>,
    ) -> CoreResult<Self> {
        let mut oracle = Self::new(address, config)?;
        for obs in observations {
            oracle.record_observation(obs.cumulative_price, obs.timestamp)?;
        }
        Ok(oracle)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &TwapConfig {
        &self.config
    }

    pub fn observations(&self) -> impl Iterator<Item = &PriceObservation> {
        self.observations.iter()
    }

    pub fn latest(&self) -> Option<&PriceObservation> {
        self.observations.back()
    }

    /// Record a new cumulative price observation.
    ///
    /// The latest slot is provisional: while it sits closer than
    /// `sample_spacing` to its predecessor it is overwritten rather than
    /// committed, so dense feeds do not push the anchor out of the ring.
    pub fn record_observation(&mut self, cumulative_price: u128, timestamp: i64) -> CoreResult<()> {
        if let Some(last) = self.latest() {
            if timestamp <= last.timestamp {
                return Err(CoreError::OutOfOrderObservation {
                    timestamp,
                    last_timestamp: last.timestamp,
                });
            }
        }

        let observation = PriceObservation {
            cumulative_price,
            timestamp,
        };

        let len = self.observations.len();
        if len >= 2 {
            let back = self.observations[len - 1].timestamp;
            let committed = self.observations[len - 2].timestamp;
            if back.saturating_sub(committed) < self.config.sample_spacing() {
                self.observations[len - 1] = observation;
                return Ok(());
            }
        }

        if len == self.config.max_observations {
            self.observations.pop_front();
        }
        self.observations.push_back(observation);

        Ok(())
    }

    /// Average price between the latest observation and the newest earlier
    /// observation at least `min_period` older
    pub fn twap(&self) -> CoreResult<u128> {
        let insufficient = || CoreError::InsufficientHistory {
            observations: self.observations.len(),
            min_period: self.config.min_period,
        };

        let latest = self.latest().ok_or_else(insufficient)?;
        let previous = self
            .observations
            .iter()
            .rev()
            .skip(1)
            .find(|obs| latest.timestamp.saturating_sub(obs.timestamp) >= self.config.min_period)
            .ok_or_else(insufficient)?;

        twap_between(previous, latest)
    }

    /// `twap()` that also rejects a latest observation older than `max_staleness`
    pub fn twap_at(&self, now: i64) -> CoreResult<u128> {
        if let Some(latest) = self.latest() {
            let age = now.saturating_sub(latest.timestamp);
            if age > self.config.max_staleness {
                return Err(CoreError::StaleData {
                    age,
                    max_age: self.config.max_staleness,
                });
            }
        }
        self.twap()
    }
}

impl PriceFeed for TwapOracle {
    fn address(&self) -> Address {
        self.address
    }

    fn price_at(&self, now: i64) -> CoreResult<u128> {
        self.twap_at(now)
    }
}

/// Slope of the accumulator between two observations
pub fn twap_between(previous: &PriceObservation, latest: &PriceObservation) -> CoreResult<u128> {
    let elapsed = latest
        .timestamp
        .checked_sub(previous.timestamp)
        .ok_or(CoreError::MathOverflow)?;
    if elapsed <= 0 {
        return Err(CoreError::OutOfOrderObservation {
            timestamp: latest.timestamp,
            last_timestamp: previous.timestamp,
        });
    }
    // Wrapping is part of the accumulator's contract
    let delta = latest.cumulative_price.wrapping_sub(previous.cumulative_price);
    Ok(delta / elapsed as u128)
}
