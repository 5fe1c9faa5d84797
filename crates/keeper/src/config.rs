use std::fs;

use ramifi_core::{
    Address, EngineConfig, PolicyParams, RebaseWindow, ReferenceOracleConfig, TwapConfig, INITIAL_FRAGMENTS_SUPPLY,
};
use serde::{Deserialize, Serialize};

use crate::error::{KeeperError, KeeperResult};

/// Keeper configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Default rebase check interval in seconds
    pub update_interval: u64,

    /// Snapshot file, used when `--state` is not given
    pub state_file: Option<String>,

    /// Genesis token parameters
    pub token: TokenConfig,

    /// Identities of the wired components
    pub addresses: AddressConfig,

    /// Monetary policy parameters
    pub policy: PolicyParams,

    /// Market TWAP oracle parameters
    pub twap: TwapConfig,

    /// Reference index oracle parameters and providers
    pub reference: ReferenceConfig,

    /// Feed files
    pub feeds: FeedConfig,

    /// Retry configuration
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TokenConfig {
    /// Receives the genesis supply and owns every component
    pub owner: Address,

    /// Genesis supply in external units
    pub initial_supply: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AddressConfig {
    /// Identity the keeper acts as when triggering rebases
    pub orchestrator: Address,
    pub policy: Address,
    pub market_oracle: Address,
    pub index_oracle: Address,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReferenceConfig {
    /// Reports older than this are ignored (seconds)
    pub max_staleness: i64,

    /// Reports younger than this are not yet usable (seconds)
    pub report_delay: i64,

    /// Distinct fresh providers needed for a value
    pub minimum_providers: usize,

    /// Providers allowed at genesis
    pub providers: Vec<Address>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeedConfig {
    /// JSON-lines file of `{ cumulative_price, timestamp }` samples
    pub market_path: String,

    /// JSON-lines file of `{ provider, value, timestamp }` reports
    pub index_path: String,

    /// Feed polling interval in seconds
    pub poll_interval: u64,
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Maximum number of retries for failed operations
    pub max_retries: u32,

    /// Base delay between retries in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f64,
}

impl KeeperConfig {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> KeeperResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| KeeperError::InvalidConfig(format!("Failed to read config file {}: {}", path, e)))?;

        let config: KeeperConfig = toml::from_str(&content)
            .map_err(|e| KeeperError::InvalidConfig(format!("Failed to parse config file {}: {}", path, e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: &str) -> KeeperResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.update_interval == 0 {
            return Err(invalid("update_interval", "0", "greater than 0"));
        }

        if self.token.owner.is_zero() {
            return Err(invalid("token.owner", "zero address", "non-zero address"));
        }

        if self.token.initial_supply == 0 {
            return Err(invalid("token.initial_supply", "0", "greater than 0"));
        }

        self.addresses.validate()?;

        self.policy
            .validate()
            .map_err(|e| KeeperError::InvalidConfig(format!("policy: {}", e)))?;
        self.twap
            .validate()
            .map_err(|e| KeeperError::InvalidConfig(format!("twap: {}", e)))?;

        self.reference.validate()?;
        self.feeds.validate()?;
        self.retry.validate()?;

        Ok(())
    }

    /// Genesis parameters for a fresh engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            owner: self.token.owner,
            orchestrator: self.addresses.orchestrator,
            policy_address: self.addresses.policy,
            market_oracle_address: self.addresses.market_oracle,
            index_oracle_address: self.addresses.index_oracle,
            initial_supply: self.token.initial_supply as u128,
            policy: self.policy,
            twap: self.twap,
            reference: self.reference.oracle_config(),
            providers: self.reference.providers.clone(),
        }
    }
}

impl AddressConfig {
    fn validate(&self) -> KeeperResult<()> {
        let named = [
            ("addresses.orchestrator", self.orchestrator),
            ("addresses.policy", self.policy),
            ("addresses.market_oracle", self.market_oracle),
            ("addresses.index_oracle", self.index_oracle),
        ];
        for (name, address) in named {
            if address.is_zero() {
                return Err(invalid(name, "zero address", "non-zero address"));
            }
        }
        Ok(())
    }
}

impl ReferenceConfig {
    pub fn oracle_config(&self) -> ReferenceOracleConfig {
        ReferenceOracleConfig {
            max_staleness: self.max_staleness,
            report_delay: self.report_delay,
            minimum_providers: self.minimum_providers,
        }
    }

    fn validate(&self) -> KeeperResult<()> {
        self.oracle_config()
            .validate()
            .map_err(|e| KeeperError::InvalidConfig(format!("reference: {}", e)))?;

        if self.providers.len() < self.minimum_providers {
            return Err(invalid(
                "reference.providers",
                &self.providers.len().to_string(),
                &format!("at least minimum_providers ({})", self.minimum_providers),
            ));
        }

        Ok(())
    }
}

impl FeedConfig {
    fn validate(&self) -> KeeperResult<()> {
        if self.market_path.is_empty() {
            return Err(invalid("feeds.market_path", "empty", "non-empty path"));
        }

        if self.index_path.is_empty() {
            return Err(invalid("feeds.index_path", "empty", "non-empty path"));
        }

        if self.poll_interval == 0 {
            return Err(invalid("feeds.poll_interval", "0", "greater than 0"));
        }

        Ok(())
    }
}

impl RetryConfig {
    /// Validate retry configuration
    fn validate(&self) -> KeeperResult<()> {
        if self.max_retries == 0 {
            return Err(invalid("max_retries", "0", "greater than 0"));
        }

        if self.base_delay_ms == 0 {
            return Err(invalid("base_delay_ms", "0", "greater than 0"));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(invalid(
                "max_delay_ms",
                &self.max_delay_ms.to_string(),
                &format!("greater than or equal to base_delay_ms ({})", self.base_delay_ms),
            ));
        }

        if self.backoff_multiplier <= 1.0 {
            return Err(invalid(
                "backoff_multiplier",
                &self.backoff_multiplier.to_string(),
                "greater than 1.0",
            ));
        }

        Ok(())
    }

    /// Calculate delay for retry attempt
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return self.base_delay_ms;
        }

        let exponential_delay = self.base_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        (exponential_delay as u64).min(self.max_delay_ms)
    }
}

fn invalid(name: &str, value: &str, expected: &str) -> KeeperError {
    KeeperError::InvalidConfig(format!("{} is {}, expected {}", name, value, expected))
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            update_interval: 60,
            state_file: Some("ramifi-state.json".to_string()),
            token: TokenConfig {
                owner: Address::from_low_u64(1),
                initial_supply: INITIAL_FRAGMENTS_SUPPLY as u64,
            },
            addresses: AddressConfig {
                orchestrator: Address::from_low_u64(2),
                policy: Address::from_low_u64(3),
                market_oracle: Address::from_low_u64(4),
                index_oracle: Address::from_low_u64(5),
            },
            policy: PolicyParams::default(),
            twap: TwapConfig::default(),
            reference: ReferenceConfig {
                max_staleness: 86_400,
                report_delay: 0,
                minimum_providers: 1,
                providers: vec![Address::from_low_u64(6)],
            },
            feeds: FeedConfig {
                market_path: "feeds/market.jsonl".to_string(),
                index_path: "feeds/index.jsonl".to_string(),
                poll_interval: 30,
            },
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Create example configuration file
pub fn create_example_config(path: &str) -> KeeperResult<()> {
    let example_config = KeeperConfig {
        update_interval: 300,
        policy: PolicyParams {
            // daily rebase between 02:00 and 02:20 UTC
            window: Some(RebaseWindow {
                offset_sec: 7_200,
                length_sec: 1_200,
            }),
            ..PolicyParams::default()
        },
        reference: ReferenceConfig {
            max_staleness: 86_400,
            report_delay: 3_600,
            minimum_providers: 2,
            providers: vec![Address::from_low_u64(6), Address::from_low_u64(7), Address::from_low_u64(8)],
        },
        ..KeeperConfig::default()
    };

    example_config.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = KeeperConfig::default();
        assert!(config.validate().is_ok());

        // Test zero owner
        config.token.owner = Address::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_sections_rejected() {
        let mut config = KeeperConfig::default();
        config.policy.rebase_lag = 0;
        assert!(matches!(config.validate(), Err(KeeperError::InvalidConfig(msg)) if msg.starts_with("policy")));

        let mut config = KeeperConfig::default();
        config.reference.minimum_providers = 2;
        assert!(config.validate().is_err());

        let mut config = KeeperConfig::default();
        config.retry.backoff_multiplier = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_delay_calculation() {
        let retry_config = RetryConfig::default();

        assert_eq!(retry_config.delay_for_attempt(0), 1000);
        assert_eq!(retry_config.delay_for_attempt(1), 2000);
        assert_eq!(retry_config.delay_for_attempt(2), 4000);

        // Should cap at max_delay_ms
        assert_eq!(retry_config.delay_for_attempt(10), 30_000);
    }

    #[test]
    fn test_example_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keeper.toml");
        let path = path.to_str().unwrap();

        create_example_config(path).unwrap();
        let loaded = KeeperConfig::load(path).unwrap();

        assert_eq!(loaded.reference.providers.len(), 3);
        assert_eq!(loaded.policy.window.map(|w| w.offset_sec), Some(7_200));
        assert_eq!(loaded.engine_config().initial_supply, INITIAL_FRAGMENTS_SUPPLY);
    }
}
