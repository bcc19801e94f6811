//! Escrow configuration.
//!
//! Provides [`EscrowConfig`] with defaults for the rounding interval, the
//! maximum lock duration, and the per-call catch-up bound. The configuration
//! can be built programmatically or deserialized (missing fields take their
//! defaults).

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_INTERVAL, DEFAULT_MAX_CATCH_UP_STEPS, DEFAULT_MAX_LOCK_DURATION};
use crate::error::ConfigError;

/// Parameters fixed for the lifetime of an escrow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
#[serde(default)]
pub struct EscrowConfig {
    /// Rounding granularity for unlock times, in seconds (INTERVAL).
    pub interval: u64,
    /// Maximum lock duration, in seconds (MAXTIME).
    pub max_lock_duration: u64,
    /// Maximum INTERVAL steps one global catch-up may walk.
    pub max_catch_up_steps: u32,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_lock_duration: DEFAULT_MAX_LOCK_DURATION,
            max_catch_up_steps: DEFAULT_MAX_CATCH_UP_STEPS,
        }
    }
}

impl EscrowConfig {
    /// Check the parameters are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if self.max_lock_duration < self.interval {
            return Err(ConfigError::MaxDurationTooShort {
                max: self.max_lock_duration,
                interval: self.interval,
            });
        }
        if self.max_catch_up_steps == 0 {
            return Err(ConfigError::ZeroCatchUpSteps);
        }
        Ok(())
    }

    /// Round a timestamp down to a multiple of the interval.
    pub fn round_down(&self, timestamp: u64) -> u64 {
        timestamp / self.interval * self.interval
    }

    /// Latest unlock time a call at `now` may set.
    pub fn max_unlock_time(&self, now: u64) -> u64 {
        now.saturating_add(self.max_lock_duration)
    }
}
