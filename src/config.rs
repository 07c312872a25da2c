//! Simulation-wide configuration constants.
//!
//! Mirrors `sim/config.py` from the original implementation this simulator
//! is modeled on. Values are dimensionless or SI seconds; [`Duration`] and
//! [`VirtualTime`] values are derived from the `*_secs` fields at
//! [`Config::default`]/deserialization time.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::time::{Duration, VirtualTime};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Number of bits in the identifier/key space (m).
    pub bits: u32,
    /// Base per-hop network latency, in seconds.
    pub base_latency_secs: f64,
    /// Interval between periodic stabilization routines, in seconds.
    pub stabilize_interval_secs: f64,
    /// Seconds at the start of a run before churn/lookups begin.
    pub warmup_end_secs: f64,
    /// Size of the successor list (r) for fault tolerance.
    pub successor_list_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bits: 160,
            base_latency_secs: 0.005,
            stabilize_interval_secs: 1.0,
            warmup_end_secs: 10.0,
            successor_list_size: 16,
        }
    }
}

impl Config {
    pub fn base_latency(&self) -> Duration {
        Duration::from_secs_f64(self.base_latency_secs)
    }

    pub fn stabilize_interval(&self) -> Duration {
        Duration::from_secs_f64(self.stabilize_interval_secs)
    }

    pub fn warmup_end(&self) -> VirtualTime {
        VirtualTime::from_secs_f64(self.warmup_end_secs)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }
}

/// Errors from loading a [`Config`] from disk or a TOML string.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Toml(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "I/O error reading config: {}", e),
            ConfigError::Toml(e) => write!(f, "invalid config TOML: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Toml(e) => Some(e),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Toml(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.bits, 160);
        assert_eq!(cfg.base_latency().as_micros(), 5_000);
        assert_eq!(cfg.successor_list_size, 16);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = Config::from_toml_str("bits = 16\n").unwrap();
        assert_eq!(cfg.bits, 16);
        assert_eq!(cfg.successor_list_size, 16);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Config::from_toml_str("bits = ???").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
