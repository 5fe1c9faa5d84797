//! # Core Error Types
//!
//! Every failure in the engine is reported through [`CoreError`]. Operations
//! check all preconditions before mutating state, so an `Err` always means
//! nothing changed.

use thiserror::Error;

use crate::types::Address;

/// Which oracle a policy read failed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum OracleKind {
    /// Market price TWAP
    Market,
    /// External reference index (CPI-like)
    ReferenceIndex,
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleKind::Market => write!(f, "market"),
            OracleKind::ReferenceIndex => write!(f, "reference index"),
        }
    }
}

/// Core protocol errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // ========================================================================
    // Math Errors
    // ========================================================================
    #[error("Math overflow")]
    MathOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    // ========================================================================
    // Token and Ledger Errors
    // ========================================================================
    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u128, need: u128 },

    #[error("Insufficient allowance: approved {approved}, requested {requested}")]
    InsufficientAllowance { approved: u128, requested: u128 },

    #[error("Token already initialized")]
    AlreadyInitialized,

    #[error("Token not initialized")]
    NotInitialized,

    #[error("Stale epoch {epoch}: last applied epoch is {last_epoch}")]
    StaleEpoch { epoch: u64, last_epoch: u64 },

    #[error("Supply clamped: requested {requested}, applied {applied}")]
    SupplyOutOfBounds { requested: i128, applied: i128 },

    // ========================================================================
    // Authorization Errors
    // ========================================================================
    #[error("Unauthorized: caller {caller} is not {required}")]
    Unauthorized { caller: Address, required: Address },

    #[error("Ownership transfer locked until {eta}")]
    TimelockActive { eta: i64 },

    #[error("No pending owner")]
    NoPendingOwner,

    // ========================================================================
    // Policy Errors
    // ========================================================================
    #[error("Cooldown active: {elapsed}s since last rebase (min {min_interval}s)")]
    CooldownActive { elapsed: i64, min_interval: i64 },

    #[error("Outside rebase window: {offset_in_interval}s into interval")]
    OutsideRebaseWindow { offset_in_interval: i64 },

    #[error("Stale {oracle} oracle data: {cause}")]
    StaleOracleData { oracle: OracleKind, cause: String },

    #[error("{0} oracle not configured")]
    OracleNotConfigured(OracleKind),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    // ========================================================================
    // Oracle Errors
    // ========================================================================
    #[error("Out of order observation: {timestamp} <= last {last_timestamp}")]
    OutOfOrderObservation { timestamp: i64, last_timestamp: i64 },

    #[error("Insufficient history: {observations} observations, need span of {min_period}s")]
    InsufficientHistory { observations: usize, min_period: i64 },

    #[error("Unauthorized provider {0}")]
    UnauthorizedProvider(Address),

    #[error("Non-monotonic timestamp: {timestamp} <= last {last_timestamp}")]
    NonMonotonicTimestamp { timestamp: i64, last_timestamp: i64 },

    #[error("Insufficient consensus: {valid} valid reports (min {required})")]
    InsufficientConsensus { valid: usize, required: usize },

    #[error("Stale data: {age}s old (max {max_age}s)")]
    StaleData { age: i64, max_age: i64 },

    #[error("Invalid value: {0}")]
    InvalidValue(u128),

    // ========================================================================
    // State Errors
    // ========================================================================
    #[error("Unsupported state version {found} (current {current})")]
    UnsupportedStateVersion { found: u32, current: u32 },

    #[error("Corrupt state: {0}")]
    CorruptState(String),
}

/// Result type using core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create an invalid parameter error
    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Wrap an oracle failure as seen from the monetary policy
    pub fn stale_oracle(oracle: OracleKind, cause: &CoreError) -> Self {
        Self::StaleOracleData {
            oracle,
            cause: cause.to_string(),
        }
    }

    /// Errors the orchestrator should simply wait out until the next cycle
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CooldownActive { .. }
                | Self::OutsideRebaseWindow { .. }
                | Self::StaleOracleData { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InsufficientBalance { have: 5, need: 7 };
        assert_eq!(format!("{}", err), "Insufficient balance: have 5, need 7");

        let err = CoreError::stale_oracle(
            OracleKind::ReferenceIndex,
            &CoreError::StaleData { age: 90, max_age: 60 },
        );
        assert_eq!(
            format!("{}", err),
            "Stale reference index oracle data: Stale data: 90s old (max 60s)"
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(CoreError::CooldownActive { elapsed: 1, min_interval: 10 }.is_retryable());
        assert!(!CoreError::NotInitialized.is_retryable());
        assert!(!CoreError::StaleEpoch { epoch: 1, last_epoch: 1 }.is_retryable());
    }
}
