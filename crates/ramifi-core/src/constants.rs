//! # Protocol Constants
//!
//! Fundamental constants for the elastic supply engine:
//! - Token decimals and genesis supply
//! - Supply bounds enforced by rebase
//! - Rate and basis point scales used by the monetary policy
//! - Default oracle and policy timings

// ============================================================================
// Token Constants
// ============================================================================

/// Decimals of the external unit
pub const DECIMALS: u32 = 9;

/// One whole token in external units
pub const ONE_TOKEN: u128 = 10u128.pow(DECIMALS);

/// Genesis supply: 50 million whole tokens
pub const INITIAL_FRAGMENTS_SUPPLY: u128 = 50_000_000 * ONE_TOKEN;

/// Upper bound of total supply after any rebase
pub const MAX_SUPPLY: u128 = u128::MAX;

/// Lower bound of total supply after any rebase (must stay non-zero)
pub const MIN_SUPPLY: u128 = 1;

// ============================================================================
// Rate Constants
// ============================================================================

/// Decimals used by market and reference rates
pub const RATE_DECIMALS: u32 = 18;

/// A rate of exactly 1.0
pub const RATE_ONE: u128 = 10u128.pow(RATE_DECIMALS);

/// Market rates above this are capped before deviation is computed
pub const MAX_RATE: u128 = 1_000_000 * RATE_ONE;

/// Basis points denominator (10,000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Maximum percentage in basis points (100%)
pub const MAX_BPS: u64 = 10_000;

// ============================================================================
// Policy Defaults
// ============================================================================

/// Default cooldown between rebases (1 day)
pub const DEFAULT_MIN_REBASE_INTERVAL: i64 = 86_400;

/// Default deadband (5%)
pub const DEFAULT_DEADBAND_BPS: u64 = 500;

/// Default damping divisor
pub const DEFAULT_REBASE_LAG: u64 = 30;

/// Default expansion cap per cycle (10%)
pub const DEFAULT_MAX_POSITIVE_DELTA_BPS: u64 = 1_000;

/// Default contraction cap per cycle (10%)
pub const DEFAULT_MAX_NEGATIVE_DELTA_BPS: u64 = 1_000;

// ============================================================================
// Oracle Defaults
// ============================================================================

/// Default minimum span between the two TWAP observations (1 hour)
pub const DEFAULT_TWAP_MIN_PERIOD: i64 = 3_600;

/// Default observation ring capacity
pub const DEFAULT_MAX_OBSERVATIONS: usize = 24;

/// Default reference report expiry (1 day)
pub const DEFAULT_REPORT_EXPIRATION: i64 = 86_400;

/// Reports kept per provider
pub const REPORTS_PER_PROVIDER: usize = 2;
