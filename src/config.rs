//! Serializable retry configuration.
//!
//! [`RetryConfig`] carries the data half of a policy: the attempt budget, base delay, the
//! raise flag and caller-supplied extras. Matchers, handlers and the sleeper are behavior
//! and are set on the builder.
//!
//! ```rust
//! use encore::{Delay, RetryConfig};
//!
//! let config = RetryConfig::from_json_str(
//!     r#"{ "max_attempts": 5, "base_delay": 0.5, "extra": { "region": "eu-west-1" } }"#,
//! )
//! .unwrap();
//! assert_eq!(config.max_attempts, 5);
//! assert_eq!(config.base_delay, Delay::secs(0.5));
//! assert!(config.raise_on_exhaustion);
//! ```

use crate::delay::Delay;
use crate::retry::BuildError;
use crate::state::is_reserved;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Default total attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Errors loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse retry config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid retry config: {0}")]
    Invalid(#[from] BuildError),
}

/// Data portion of a retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first. Must be at least 1.
    pub max_attempts: u32,
    /// Base delay handed to delay handlers as `base_delay`.
    pub base_delay: Delay,
    /// Surface the final error even when the terminal handler suppresses it.
    pub raise_on_exhaustion: bool,
    /// Extra named values exposed through the retry state.
    pub extra: BTreeMap<String, Value>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Delay::ZERO,
            raise_on_exhaustion: true,
            extra: BTreeMap::new(),
        }
    }
}

impl RetryConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RetryConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants `build()` relies on.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(self.max_attempts));
        }
        let base = self.base_delay.as_secs_f64();
        if base < 0.0 || self.base_delay.to_wait().is_err() {
            return Err(BuildError::InvalidBaseDelay(base));
        }
        if let Some(name) = self.extra.keys().find(|name| is_reserved(name)) {
            return Err(BuildError::ReservedExtra(name.clone()));
        }
        Ok(())
    }
}
