//! Policy parameters and their validation

use crate::constants::{
    DEFAULT_DEADBAND_BPS, DEFAULT_MAX_NEGATIVE_DELTA_BPS, DEFAULT_MAX_POSITIVE_DELTA_BPS,
    DEFAULT_MIN_REBASE_INTERVAL, DEFAULT_REBASE_LAG, MAX_BPS, RATE_ONE,
};
use crate::errors::{CoreError, CoreResult};
use crate::math::{mul_div_u256, narrow_u128, Rounding};

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

/// Slice of every rebase interval in which a cycle may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct RebaseWindow {
    /// Seconds from the start of the interval
    pub offset_sec: i64,
    pub length_sec: i64,
}

impl RebaseWindow {
    /// Position of `now` inside the current interval
    pub fn offset_in_interval(now: i64, interval: i64) -> i64 {
        now.rem_euclid(interval)
    }

    pub fn contains(&self, now: i64, interval: i64) -> bool {
        let offset = Self::offset_in_interval(now, interval);
        offset >= self.offset_sec && offset < self.end_sec()
    }

    /// Exclusive end offset, saturating for unvalidated windows
    pub fn end_sec(&self) -> i64 {
        self.offset_sec.saturating_add(self.length_sec)
    }

    /// Start of the window in the interval containing `now`
    pub fn start_for(&self, now: i64, interval: i64) -> i64 {
        now - Self::offset_in_interval(now, interval) + self.offset_sec
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct PolicyParams {
    /// Cooldown between cycles (seconds)
    pub min_rebase_interval: i64,
    /// Deviations strictly below this produce no supply change
    pub deadband_bps: u64,
    /// Upper bound on an expansion, in bps of current supply
    pub max_positive_delta_bps: u64,
    /// Upper bound on a contraction, in bps of current supply
    pub max_negative_delta_bps: u64,
    /// Damping divisor applied to the raw deviation
    pub rebase_lag: u64,
    /// Submit a rebase even when the computed delta is zero
    pub submit_zero_delta: bool,
    /// Index reading that maps to a target of one `RATE_ONE`. Without it the
    /// raw index is the target.
    pub base_index: Option<u64>,
    pub window: Option<RebaseWindow>,
}

impl Default for PolicyParams {
    fn default() -> Self {
        Self {
            min_rebase_interval: DEFAULT_MIN_REBASE_INTERVAL,
            deadband_bps: DEFAULT_DEADBAND_BPS,
            max_positive_delta_bps: DEFAULT_MAX_POSITIVE_DELTA_BPS,
            max_negative_delta_bps: DEFAULT_MAX_NEGATIVE_DELTA_BPS,
            rebase_lag: DEFAULT_REBASE_LAG,
            submit_zero_delta: true,
            base_index: None,
            window: None,
        }
    }
}

impl PolicyParams {
    pub fn validate(&self) -> CoreResult<()> {
        if self.min_rebase_interval <= 0 {
            return Err(CoreError::invalid_parameter("min_rebase_interval", "must be positive"));
        }
        if self.rebase_lag == 0 {
            return Err(CoreError::invalid_parameter("rebase_lag", "must be positive"));
        }
        if self.deadband_bps > MAX_BPS {
            return Err(CoreError::invalid_parameter(
                "deadband_bps",
                format!("{} exceeds {}", self.deadband_bps, MAX_BPS),
            ));
        }
        // A contraction beyond 100% of supply has no meaning
        if self.max_negative_delta_bps > MAX_BPS {
            return Err(CoreError::invalid_parameter(
                "max_negative_delta_bps",
                format!("{} exceeds {}", self.max_negative_delta_bps, MAX_BPS),
            ));
        }
        if self.base_index == Some(0) {
            return Err(CoreError::invalid_parameter("base_index", "must be positive"));
        }
        if let Some(window) = self.window {
            if window.length_sec <= 0 {
                return Err(CoreError::invalid_parameter("window.length_sec", "must be positive"));
            }
            let fits = window
                .offset_sec
                .checked_add(window.length_sec)
                .is_some_and(|end| window.offset_sec >= 0 && end <= self.min_rebase_interval);
            if !fits {
                return Err(CoreError::invalid_parameter(
                    "window",
                    format!(
                        "offset {} length {} does not fit in interval {}",
                        window.offset_sec, window.length_sec, self.min_rebase_interval
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Target price for an index reading: `index * RATE_ONE / base_index`
    pub fn target_price(&self, index: u128) -> CoreResult<u128> {
        match self.base_index {
            None => Ok(index),
            Some(base) => {
                let target = mul_div_u256(index, RATE_ONE, u128::from(base), Rounding::Down)?;
                narrow_u128(target).ok_or(CoreError::MathOverflow)
            }
        }
    }
}
