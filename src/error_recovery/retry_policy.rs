//! Reconnect backoff policy with exponential growth and jitter
//!
//! The first reconnect after a disconnect is immediate. Every later attempt
//! waits `initial_delay * multiplier^(n-2)`, capped at `max_delay`, with a
//! random reduction of up to `jitter_factor` of the delay so that probes
//! dropping together do not reconnect in lockstep.

use crate::error::{DriverError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Reconnect policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Attempts per disconnect, the immediate one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,
    /// Upper bound for any delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
    /// Growth factor between attempts
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl ReconnectPolicy {
    /// Policy without jitter, for deterministic schedules
    pub fn without_jitter(mut self) -> Self {
        self.jitter_factor = 0.0;
        self
    }

    /// Delay before the given attempt (1-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let base_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let max_ms = self.max_delay.as_millis() as f64;
        let capped_ms = if base_ms.is_finite() { base_ms.min(max_ms) } else { max_ms };

        Duration::from_millis(self.apply_jitter(capped_ms) as u64)
    }

    fn apply_jitter(&self, delay_ms: f64) -> f64 {
        let spread = delay_ms * self.jitter_factor.clamp(0.0, 1.0);
        if spread <= 0.0 {
            return delay_ms;
        }
        let mut rng = rand::thread_rng();
        delay_ms - spread + rng.gen_range(0.0..=spread)
    }

    /// Whether another attempt may follow `attempts_made` failures
    pub fn allows_attempt(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Validate policy values
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DriverError::config(
                "Reconnect max_attempts must be at least 1",
            ));
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(DriverError::config("Reconnect multiplier must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(DriverError::config(
                "Reconnect jitter_factor must be between 0.0 and 1.0",
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(DriverError::config(
                "Reconnect initial_delay cannot exceed max_delay",
            ));
        }
        Ok(())
    }
}
