//! Configurable knobs for the REST client along with validation helpers so
//! callers can reason about timeouts and retry/backoff limits.

use anyhow::{bail, Result};
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 200;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestClientOptions {
    pub request_timeout: Duration,
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RestClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RestClientOptions {
    /// Options that issue every request exactly once.
    pub fn single_attempt(request_timeout: Duration) -> Self {
        Self {
            request_timeout,
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be greater than 0");
        }
        if self.initial_backoff.is_zero() {
            bail!("initial_backoff must be greater than 0");
        }
        if self.max_backoff < self.initial_backoff {
            bail!("max_backoff must not be smaller than initial_backoff");
        }
        Ok(())
    }

    /// Delay applied after the given (1-based) failed attempt.
    pub(crate) fn backoff_delay(&self, attempt: usize) -> Duration {
        if attempt <= 1 {
            return self.initial_backoff.min(self.max_backoff);
        }

        let exponent = attempt.saturating_sub(1).min(u32::MAX as usize) as u32;
        let multiplier = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(multiplier)
            .min(self.max_backoff)
    }
}
