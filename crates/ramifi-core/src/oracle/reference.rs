//! # Reference Index Oracle
//!
//! Median of the reports pushed by an allowlist of providers. Each provider
//! keeps its two most recent reports so a fresh push does not hide an older
//! report that is still inside the usable window while the new one waits out
//! `report_delay`.
//!
//! A report is usable at `now` when
//! `report_delay <= now - timestamp <= max_staleness`.

use std::collections::BTreeMap;

use crate::constants::{DEFAULT_REPORT_EXPIRATION, MAX_RATE, REPORTS_PER_PROVIDER};
use crate::errors::{CoreError, CoreResult};
use crate::governance::Ownership;
use crate::math::mean_u128;
use crate::oracle::PriceFeed;
use crate::types::Address;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// One pushed index value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct ReferenceIndexRecord {
    pub value: u128,
    pub timestamp: i64,
    pub provider: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct ReferenceOracleConfig {
    /// Reports older than this are ignored
    pub max_staleness: i64,
    /// Reports younger than this are not yet usable
    pub report_delay: i64,
    /// Distinct usable providers needed for a value
    pub minimum_providers: usize,
}

impl Default for ReferenceOracleConfig {
    fn default() -> Self {
        Self {
            max_staleness: DEFAULT_REPORT_EXPIRATION,
            report_delay: 0,
            minimum_providers: 1,
        }
    }
}

impl ReferenceOracleConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_staleness <= 0 {
            return Err(CoreError::invalid_parameter("max_staleness", "must be positive"));
        }
        if self.report_delay < 0 || self.report_delay > self.max_staleness {
            return Err(CoreError::invalid_parameter(
                "report_delay",
                format!("{} outside [0, max_staleness]", self.report_delay),
            ));
        }
        if self.minimum_providers == 0 {
            return Err(CoreError::invalid_parameter("minimum_providers", "must be at least 1"));
        }
        Ok(())
    }
}

/// Median oracle over an allowlist of providers
#[derive(Debug, Clone)]
pub struct ReferenceIndexOracle {
    address: Address,
    ownership: Ownership,
    config: ReferenceOracleConfig,
    /// provider -> newest-first reports
    reports: BTreeMap<Address, Vec<ReferenceIndexRecord>>,
}

impl ReferenceIndexOracle {
    pub fn new(address: Address, owner: Address, config: ReferenceOracleConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self {
            address,
            ownership: Ownership::new(owner),
            config,
            reports: BTreeMap::new(),
        })
    }

    /// Rebuild persisted state; reports must be newest-first per provider
    pub(crate) fn from_parts(
        address: Address,
        ownership: Ownership,
        config: ReferenceOracleConfig,
        reports: BTreeMap<Address, Vec<ReferenceIndexRecord>>,
    ) -> CoreResult<Self> {
        config.validate()?;
        for (provider, list) in &reports {
            let ordered = list.windows(2).all(|w| w[0].timestamp > w[1].timestamp);
            if list.len() > REPORTS_PER_PROVIDER || !ordered || list.iter().any(|r| r.provider != *provider) {
                return Err(CoreError::CorruptState(format!("invalid report list for provider {}", provider)));
            }
        }
        Ok(Self {
            address,
            ownership,
            config,
            reports,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &ReferenceOracleConfig {
        &self.config
    }

    pub fn ownership(&self) -> &Ownership {
        &self.ownership
    }

    pub fn ownership_mut(&mut self) -> &mut Ownership {
        &mut self.ownership
    }

    pub fn providers(&self) -> impl Iterator<Item = &Address> {
        self.reports.keys()
    }

    pub fn is_provider(&self, provider: &Address) -> bool {
        self.reports.contains_key(provider)
    }

    /// Newest-first reports of one provider
    pub fn reports_of(&self, provider: &Address) -> &[ReferenceIndexRecord] {
        self.reports.get(provider).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_config(&mut self, caller: &Address, config: ReferenceOracleConfig) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Allow `provider` to push values; no-op if already listed
    pub fn add_provider(&mut self, caller: &Address, provider: Address) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        self.reports.entry(provider).or_default();
        log::info!("Reference provider {} added", provider);
        Ok(())
    }

    /// Revoke `provider` and drop its reports
    pub fn remove_provider(&mut self, caller: &Address, provider: &Address) -> CoreResult<()> {
        self.ownership.require_owner(caller)?;
        if self.reports.remove(provider).is_none() {
            return Err(CoreError::UnauthorizedProvider(*provider));
        }
        log::info!("Reference provider {} removed", provider);
        Ok(())
    }

    /// Authenticated inbound report from `provider`
    pub fn push(&mut self, provider: &Address, value: u128, timestamp: i64) -> CoreResult<()> {
        let reports = self
            .reports
            .get_mut(provider)
            .ok_or(CoreError::UnauthorizedProvider(*provider))?;
        if let Some(last) = reports.first() {
            if timestamp <= last.timestamp {
                log::debug!("Rejected report from {}: timestamp {} <= {}", provider, timestamp, last.timestamp);
                return Err(CoreError::NonMonotonicTimestamp {
                    timestamp,
                    last_timestamp: last.timestamp,
                });
            }
        }
        if value == 0 || value > MAX_RATE {
            log::debug!("Rejected report from {}: value {}", provider, value);
            return Err(CoreError::InvalidValue(value));
        }

        reports.insert(
            0,
            ReferenceIndexRecord {
                value,
                timestamp,
                provider: *provider,
            },
        );
        reports.truncate(REPORTS_PER_PROVIDER);
        Ok(())
    }

    /// Provider withdraws all of its reports
    pub fn purge_reports(&mut self, provider: &Address) -> CoreResult<()> {
        let reports = self
            .reports
            .get_mut(provider)
            .ok_or(CoreError::UnauthorizedProvider(*provider))?;
        reports.clear();
        Ok(())
    }

    /// Newest usable report per provider at `now`
    fn usable_reports(&self, now: i64) -> Vec<&ReferenceIndexRecord> {
        self.reports
            .values()
            .filter_map(|reports| {
                reports.iter().find(|r| {
                    let age = now.saturating_sub(r.timestamp);
                    age >= self.config.report_delay && age <= self.config.max_staleness
                })
            })
            .collect()
    }

    /// Median of usable reports at `now`
    pub fn read(&self, now: i64) -> CoreResult<u128> {
        let usable = self.usable_reports(now);

        if usable.is_empty() {
            let newest = self
                .reports
                .values()
                .filter_map(|reports| reports.first())
                .map(|r| r.timestamp)
                .max();
            if let Some(newest) = newest {
                let age = now.saturating_sub(newest);
                if age > self.config.max_staleness {
                    return Err(CoreError::StaleData {
                        age,
                        max_age: self.config.max_staleness,
                    });
                }
            }
        }

        if usable.len() < self.config.minimum_providers {
            return Err(CoreError::InsufficientConsensus {
                valid: usable.len(),
                required: self.config.minimum_providers,
            });
        }

        let mut values: Vec<u128> = usable.iter().map(|r| r.value).collect();
        Ok(median(&mut values))
    }
}

impl PriceFeed for ReferenceIndexOracle {
    fn address(&self) -> Address {
        self.address
    }

    fn price_at(&self, now: i64) -> CoreResult<u128> {
        self.read(now)
    }
}

/// Median of a non-empty slice; mean of the middle pair for even lengths
fn median(values: &mut [u128]) -> u128 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        mean_u128(values[mid - 1], values[mid])
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::from_low_u64(1)
    }

    fn provider(n: u64) -> Address {
        Address::from_low_u64(100 + n)
    }

    fn oracle(config: ReferenceOracleConfig) -> ReferenceIndexOracle {
        let mut oracle = ReferenceIndexOracle::new(Address::from_low_u64(50), admin(), config).unwrap();
        for n in 0..3 {
            oracle.add_provider(&admin(), provider(n)).unwrap();
        }
        oracle
    }

    #[test]
    fn test_single_provider_read() {
        let mut oracle = oracle(ReferenceOracleConfig::default());
        oracle.push(&provider(0), 1_000, 100).unwrap();
        assert_eq!(oracle.read(200).unwrap(), 1_000);
    }

    #[test]
    fn test_unauthorized_provider() {
        let mut oracle = oracle(ReferenceOracleConfig::default());
        let stranger = Address::from_low_u64(999);
        assert_eq!(oracle.push(&stranger, 1, 1), Err(CoreError::UnauthorizedProvider(stranger)));

        oracle.remove_provider(&admin(), &provider(0)).unwrap();
        assert_eq!(oracle.push(&provider(0), 1, 1), Err(CoreError::UnauthorizedProvider(provider(0))));
        assert!(matches!(
            oracle.add_provider(&stranger, stranger),
            Err(CoreError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_non_monotonic_timestamp() {
        let mut oracle = oracle(ReferenceOracleConfig::default());
        oracle.push(&provider(0), 1_000, 100).unwrap();
        assert_eq!(
            oracle.push(&provider(0), 1_100, 100),
            Err(CoreError::NonMonotonicTimestamp { timestamp: 100, last_timestamp: 100 })
        );
        assert_eq!(oracle.reports_of(&provider(0)).len(), 1);
    }

    #[test]
    fn test_invalid_value() {
        let mut oracle = oracle(ReferenceOracleConfig::default());
        assert_eq!(oracle.push(&provider(0), 0, 1), Err(CoreError::InvalidValue(0)));
        assert_eq!(oracle.push(&provider(0), MAX_RATE + 1, 1), Err(CoreError::InvalidValue(MAX_RATE + 1)));
    }

    #[test]
    fn test_median_and_consensus() {
        let mut oracle = oracle(ReferenceOracleConfig {
            minimum_providers: 2,
            ..ReferenceOracleConfig::default()
        });
        oracle.push(&provider(0), 1_000, 100).unwrap();
        assert_eq!(
            oracle.read(150),
            Err(CoreError::InsufficientConsensus { valid: 1, required: 2 })
        );

        oracle.push(&provider(1), 1_201, 110).unwrap();
        assert_eq!(oracle.read(150).unwrap(), 1_100);

        oracle.push(&provider(2), 5_000, 120).unwrap();
        assert_eq!(oracle.read(150).unwrap(), 1_201);
    }

    #[test]
    fn test_stale_data() {
        let mut oracle = oracle(ReferenceOracleConfig {
            max_staleness: 60,
            ..ReferenceOracleConfig::default()
        });
        assert_eq!(oracle.read(0), Err(CoreError::InsufficientConsensus { valid: 0, required: 1 }));

        oracle.push(&provider(0), 1_000, 100).unwrap();
        assert_eq!(oracle.read(160).unwrap(), 1_000);
        assert_eq!(oracle.read(161), Err(CoreError::StaleData { age: 61, max_age: 60 }));
    }

    #[test]
    fn test_report_delay_keeps_previous_report() {
        let mut oracle = oracle(ReferenceOracleConfig {
            max_staleness: 1_000,
            report_delay: 50,
            minimum_providers: 1,
        });
        oracle.push(&provider(0), 1_000, 100).unwrap();
        assert!(matches!(oracle.read(120), Err(CoreError::InsufficientConsensus { .. })));
        assert_eq!(oracle.read(150).unwrap(), 1_000);

        // New report not yet usable, the previous one still answers
        oracle.push(&provider(0), 2_000, 200).unwrap();
        assert_eq!(oracle.read(220).unwrap(), 1_000);
        assert_eq!(oracle.read(250).unwrap(), 2_000);
    }

    #[test]
    fn test_purge_reports() {
        let mut oracle = oracle(ReferenceOracleConfig::default());
        oracle.push(&provider(0), 1_000, 100).unwrap();
        oracle.purge_reports(&provider(0)).unwrap();
        assert!(matches!(oracle.read(100), Err(CoreError::InsufficientConsensus { valid: 0, .. })));
        // a purged provider may report again from any newer time
        oracle.push(&provider(0), 1_000, 101).unwrap();
    }

    #[test]
    fn test_median_even_count() {
        assert_eq!(median(&mut [4, 1, 3, 2]), 2);
        assert_eq!(median(&mut [u128::MAX, u128::MAX - 1]), u128::MAX - 1);
        assert_eq!(median(&mut [7]), 7);
    }
}
