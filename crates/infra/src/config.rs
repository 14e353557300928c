//! Engine configuration.
//!
//! Defaults reproduce the library's published rules (5 per day late, two
//! active loans). Every value can be overridden from the environment.

use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use circulation_core::Money;
use circulation_lending::{DEFAULT_DAILY_RATE, FineCalculator};

use crate::retry::RetryPolicy;

pub const ENV_DAILY_FINE_RATE: &str = "CIRCULATION_DAILY_FINE_RATE";
pub const ENV_BORROW_LIMIT: &str = "CIRCULATION_BORROW_LIMIT";
pub const ENV_LOCK_TIMEOUT_MS: &str = "CIRCULATION_LOCK_TIMEOUT_MS";
pub const ENV_COMPENSATION_ATTEMPTS: &str = "CIRCULATION_COMPENSATION_ATTEMPTS";
pub const ENV_COMPENSATION_BASE_DELAY_MS: &str = "CIRCULATION_COMPENSATION_BASE_DELAY_MS";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key}: cannot parse {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingConfig {
    /// Charge per whole calendar day late, in minor units.
    pub daily_fine_rate: Money,
    /// Maximum simultaneous open loans per user.
    pub borrow_limit: usize,
    /// Upper bound on waiting for a book or user row lock.
    pub lock_timeout: Duration,
    /// Retry schedule for releasing a copy after a failed issuance.
    pub compensation: RetryPolicy,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            daily_fine_rate: DEFAULT_DAILY_RATE,
            borrow_limit: 2,
            lock_timeout: Duration::from_millis(250),
            compensation: RetryPolicy::default(),
        }
    }
}

impl LendingConfig {
    pub fn with_daily_fine_rate(mut self, rate: Money) -> Self {
        self.daily_fine_rate = rate;
        self
    }

    pub fn with_borrow_limit(mut self, limit: usize) -> Self {
        self.borrow_limit = limit;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_compensation(mut self, policy: RetryPolicy) -> Self {
        self.compensation = policy;
        self
    }

    pub fn fine_calculator(&self) -> FineCalculator {
        FineCalculator::new(self.daily_fine_rate)
    }

    /// Defaults overridden by `CIRCULATION_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(rate) = parse::<u64>(&lookup, ENV_DAILY_FINE_RATE)? {
            config.daily_fine_rate = Money::from_minor(rate);
        }
        if let Some(limit) = parse::<usize>(&lookup, ENV_BORROW_LIMIT)? {
            config.borrow_limit = limit;
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_LOCK_TIMEOUT_MS)? {
            config.lock_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse::<u32>(&lookup, ENV_COMPENSATION_ATTEMPTS)? {
            config.compensation.max_attempts = attempts;
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_COMPENSATION_BASE_DELAY_MS)? {
            config.compensation.base_delay = Duration::from_millis(ms);
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: core::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_library_rules() {
        let config = LendingConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, LendingConfig::default());
        assert_eq!(config.daily_fine_rate, Money::from_minor(5));
        assert_eq!(config.borrow_limit, 2);
    }

    #[test]
    fn overrides_apply() {
        let config = LendingConfig::from_lookup(lookup(&[
            (ENV_DAILY_FINE_RATE, "25"),
            (ENV_BORROW_LIMIT, " 4 "),
            (ENV_LOCK_TIMEOUT_MS, "1000"),
            (ENV_COMPENSATION_ATTEMPTS, "0"),
        ]))
        .unwrap();
        assert_eq!(config.daily_fine_rate, Money::from_minor(25));
        assert_eq!(config.borrow_limit, 4);
        assert_eq!(config.lock_timeout, Duration::from_secs(1));
        assert_eq!(config.compensation.max_attempts, 0);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = LendingConfig::from_lookup(lookup(&[(ENV_BORROW_LIMIT, "two")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: ENV_BORROW_LIMIT, .. }));
    }
}
