//! Runtime configuration, loaded the way the teacher's `compiler/src/ffi.rs`
//! (`FfiManifest::parse`) and `compiler/src/lint.rs` load TOML: a
//! `#[derive(Deserialize)]` struct handed straight to `toml::from_str`, with
//! defaults covering every field so embedding needs zero configuration to
//! get a working runtime.

use serde::{Deserialize, Serialize};

use crate::pool::PoolConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub pool_class_widths: Vec<usize>,
    pub ballast_budget: i64,
    pub round_large_to_pow2: bool,
    /// Enables debug-only poisoning, tick counting, and the extra
    /// `debug_assert!` consistency checks spec.md §6 calls `DEBUG_*`
    /// switches.
    pub debug_checks: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let defaults = PoolConfig::default();
        RuntimeConfig {
            pool_class_widths: defaults.class_widths.to_vec(),
            ballast_budget: defaults.ballast_budget,
            round_large_to_pow2: defaults.round_large_to_pow2,
            debug_checks: cfg!(debug_assertions),
        }
    }
}

impl RuntimeConfig {
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            class_widths: self.pool_class_widths.clone(),
            ballast_budget: self.ballast_budget,
            round_large_to_pow2: self.round_large_to_pow2,
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let cfg = RuntimeConfig::default();
        let text = toml::to_string(&cfg).unwrap();
        let parsed = RuntimeConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.ballast_budget, cfg.ballast_budget);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let parsed = RuntimeConfig::from_toml_str("debug_checks = true").unwrap();
        assert!(parsed.debug_checks);
        assert_eq!(parsed.ballast_budget, RuntimeConfig::default().ballast_budget);
    }
}
