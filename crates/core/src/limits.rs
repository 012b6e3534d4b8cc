//! Size and shape limits enforced by the keyspace layer.
//!
//! Mirrors the teacher crate's `Limits` struct: a plain data struct with a
//! `Default` impl, threaded through via `&Limits` parameters rather than
//! global state (see SPEC_FULL.md "Configuration/limits layer").
//!
//! `Key`/`Value` construction itself stays limit-agnostic — a `Key` can be
//! held by code that never sees a `Limits` value, and the same `Key` may be
//! written through more than one `Database` with different limits. Callers
//! that do own a `Limits` (`keytrie-api::Database::set`, the mount loader's
//! `open_backend`) use `check_name_bytes`/`check_value_bytes` at the point
//! they are about to commit a write or grow a chain.

use crate::error::KdbError;

/// Configurable limits for names, values, and chain composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum length of a rendered key name, in bytes.
    pub max_name_bytes: usize,
    /// Maximum length of a key's stored value, in bytes (post `size()`).
    pub max_value_bytes: usize,
    /// Maximum number of plugin slots per chain (spec §4.5 "typical upper
    /// bound: 10 per chain"; `NR_OF_PLUGINS` in the original source).
    pub max_plugins_per_chain: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_name_bytes: 4096,
            max_value_bytes: 16 * 1024 * 1024,
            max_plugins_per_chain: 10,
        }
    }
}

impl Limits {
    /// Limits with small values, useful for exercising limit-enforcement
    /// paths in tests without allocating large buffers.
    pub fn with_small_limits() -> Self {
        Limits {
            max_name_bytes: 64,
            max_value_bytes: 256,
            max_plugins_per_chain: 4,
        }
    }

    /// Reject a rendered key name longer than `max_name_bytes`.
    pub fn check_name_bytes(&self, rendered: &str) -> Result<(), KdbError> {
        if rendered.len() > self.max_name_bytes {
            return Err(KdbError::InvalidArgument(format!(
                "name '{rendered}' is {len} bytes, exceeding the limit of {max}",
                len = rendered.len(),
                max = self.max_name_bytes
            )));
        }
        Ok(())
    }

    /// Reject a value whose stored size (per `Value::size`) exceeds
    /// `max_value_bytes`.
    pub fn check_value_bytes(&self, size: usize) -> Result<(), KdbError> {
        if size > self.max_value_bytes {
            return Err(KdbError::InvalidArgument(format!(
                "value is {size} bytes, exceeding the limit of {max}",
                max = self.max_value_bytes
            )));
        }
        Ok(())
    }

    /// Reject a back-reference chain position beyond `max_plugins_per_chain`
    /// (position 0 is reserved, so valid positions are `1..=max_plugins_per_chain`).
    pub fn check_chain_position(&self, position: u32) -> Result<(), KdbError> {
        if position as usize > self.max_plugins_per_chain {
            return Err(KdbError::InvalidArgument(format!(
                "chain position {position} exceeds the limit of {max} plugins per chain",
                max = self.max_plugins_per_chain
            )));
        }
        Ok(())
    }
}
