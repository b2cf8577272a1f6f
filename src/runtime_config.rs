//! # Runtime Configuration Module
//!
//! Environment variable based configuration for an [`crate::HStacks`]
//! instance.
//!
//! ## Environment Variables
//!
//! ### `HSTACKS_STACK_SIZE`
//!
//! Stack size for coroutines started by [`crate::HStacks::spawn_dispatch`].
//! Accepts decimal (`16384`) or hexadecimal (`0x4000`) values.
//!
//! Default: `0x4000` (16 KB)
//!
//! Middleware runs on that coroutine stack when it calls its continuation
//! synchronously, so deep or allocation-heavy middleware needs a larger value.
//!
//! ### `HSTACKS_UNRECOVERABLE`
//!
//! What happens when an error reaches the root with no error middleware
//! consuming it: `panic` (default) or `abort`. Both log the error first.
//!
//! ## Usage
//!
//! ```rust
//! use hstacks::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Stack size: {} bytes", config.stack_size);
//! ```

use std::env;

use crate::error::UnrecoverablePolicy;

/// Default coroutine stack size (16 KB).
pub const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for dispatch coroutines in bytes
    pub stack_size: usize,
    /// Escalation for errors no error middleware consumed
    pub unrecoverable: UnrecoverablePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            unrecoverable: UnrecoverablePolicy::Panic,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables. Invalid values fall
    /// back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup, e.g. a map in tests.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let stack_size = lookup("HSTACKS_STACK_SIZE")
            .and_then(|val| parse_size(&val))
            .unwrap_or(DEFAULT_STACK_SIZE);
        let unrecoverable = lookup("HSTACKS_UNRECOVERABLE")
            .map(|val| UnrecoverablePolicy::parse(&val))
            .unwrap_or_default();
        RuntimeConfig {
            stack_size,
            unrecoverable,
        }
    }
}

/// Parse a decimal or `0x` prefixed hexadecimal byte count.
fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> RuntimeConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RuntimeConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.stack_size, 0x4000);
        assert_eq!(config.unrecoverable, UnrecoverablePolicy::Panic);
    }

    #[test]
    fn test_stack_size_hex_and_decimal() {
        assert_eq!(config_from(&[("HSTACKS_STACK_SIZE", "0x8000")]).stack_size, 0x8000);
        assert_eq!(config_from(&[("HSTACKS_STACK_SIZE", "32768")]).stack_size, 32768);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("HSTACKS_STACK_SIZE", "0xZZ"),
            ("HSTACKS_UNRECOVERABLE", "ignore"),
        ]);
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_abort_policy() {
        let config = config_from(&[("HSTACKS_UNRECOVERABLE", "abort")]);
        assert_eq!(config.unrecoverable, UnrecoverablePolicy::Abort);
    }
}
