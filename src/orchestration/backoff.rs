//! # Backoff Calculator
//!
//! Exponential backoff for re-published retries. The computed delay is only
//! advisory: it is stamped into the message as `notBefore` and never gates
//! whether a retry is allowed.

use chrono::{DateTime, Duration, Utc};

use crate::config::BackoffConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffCalculator {
    base_delay_seconds: u64,
    max_delay_seconds: u64,
    multiplier: f64,
}

impl Default for BackoffCalculator {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl BackoffCalculator {
    pub fn new(base_delay_seconds: u64, max_delay_seconds: u64, multiplier: f64) -> Self {
        Self {
            base_delay_seconds,
            max_delay_seconds,
            multiplier: multiplier.max(1.0),
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            config.base_delay_seconds,
            config.max_delay_seconds,
            config.multiplier,
        )
    }

    /// `min(base * multiplier^(retry_count - 1), max)`; zero before the first retry
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::zero();
        }

        let exponent = i32::try_from(retry_count - 1).unwrap_or(i32::MAX);
        let raw = self.base_delay_seconds as f64 * self.multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_seconds as f64);
        Duration::milliseconds((capped * 1000.0).round() as i64)
    }

    /// Earliest instant a worker should start the given retry
    pub fn next_attempt_at(&self, retry_count: u32, now: DateTime<Utc>) -> DateTime<Utc> {
        now + self.delay_for(retry_count)
    }
}
