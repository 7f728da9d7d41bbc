use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Retry policy for the get-data round-trips issued while refreshing the cache
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total number of attempts, including the first one
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl BackoffPolicy {
    /// A policy that tries exactly once.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Sleep before the attempt following `attempt` (zero-based), doubling
    /// from `base_delay_ms` and capped at `max_delay_ms`.
    pub fn delay_for(
        &self,
        attempt: usize,
    ) -> Duration {
        let factor = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config(ConfigError::Message(
                "fetch_retry.max_retries must be at least 1".into(),
            )));
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "fetch_retry.base_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.base_delay_ms, self.max_delay_ms
            ))));
        }

        Ok(())
    }
}

fn default_max_retries() -> usize {
    3
}
fn default_base_delay_ms() -> u64 {
    50
}
fn default_max_delay_ms() -> u64 {
    1000
}
