//! Configuration structures.
//!
//! Configuration is built from defaults, a JSON file, or both; every section
//! falls back to its default when omitted.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::errors::{Error, Result};
use crate::kernel::types::Algorithm;

/// Global kernel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Ready-queue levels and round-robin quantum.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Residency limits.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Execution limits.
    #[serde(default)]
    pub vm: VmConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Parse a JSON document. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject configurations the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.levels.is_empty() {
            return Err(Error::config("scheduler needs at least one level"));
        }
        if self.scheduler.quantum == 0 {
            return Err(Error::config("quantum must be positive"));
        }
        if self.memory.max_physical == 0 {
            return Err(Error::config("max_physical must be positive"));
        }
        if self.vm.step_limit == 0 {
            return Err(Error::config("step_limit must be positive"));
        }
        Ok(())
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// One algorithm per priority level; index 0 is the highest priority.
    pub levels: Vec<Algorithm>,

    /// Instructions per round-robin turn.
    pub quantum: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            levels: vec![Algorithm::Sjf],
            quantum: 2,
        }
    }
}

/// Memory manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Capacity of the physical residency set.
    pub max_physical: usize,

    /// Logical ticks charged for each physical-to-virtual transfer.
    pub transfer_delay_ticks: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_physical: 3,
            transfer_delay_ticks: 1,
        }
    }
}

/// How malformed instructions are treated at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecodePolicy {
    /// Refuse the program before it is registered.
    Reject,
    /// Admit the program; the record faults when the bad line is reached.
    #[default]
    FaultAtRuntime,
}

/// VM configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VmConfig {
    /// Maximum instructions a single record may execute before it is faulted.
    pub step_limit: u64,

    /// Whether malformed instructions are refused at submission or fault
    /// the record when reached.
    pub decode_policy: DecodePolicy,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            step_limit: 10_000,
            decode_policy: DecodePolicy::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_wiring() {
        let config = Config::default();
        assert_eq!(config.scheduler.levels, vec![Algorithm::Sjf]);
        assert_eq!(config.scheduler.quantum, 2);
        assert_eq!(config.memory.max_physical, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = Config::from_json_str(
            r#"{ "scheduler": { "levels": ["sjf", "round_robin"], "quantum": 3 } }"#,
        )
        .unwrap();
        assert_eq!(
            config.scheduler.levels,
            vec![Algorithm::Sjf, Algorithm::RoundRobin]
        );
        assert_eq!(config.scheduler.quantum, 3);
        assert_eq!(config.memory, MemoryConfig::default());
        assert_eq!(config.vm.decode_policy, DecodePolicy::FaultAtRuntime);
    }

    #[test]
    fn test_validate_rejects_degenerate_values() {
        let mut config = Config::default();
        config.scheduler.quantum = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.scheduler.levels.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.memory.max_physical = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.vm.step_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(matches!(
            Config::from_json_str(r#"{ "memory": { "max_physical": 0, "transfer_delay_ticks": 1 } }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_json_str("not json"),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kernel.json");
        std::fs::write(&path, r#"{ "vm": { "step_limit": 50, "decode_policy": "reject" } }"#)
            .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.vm.step_limit, 50);
        assert_eq!(config.vm.decode_policy, DecodePolicy::Reject);

        assert!(matches!(
            Config::from_file(dir.path().join("missing.json")),
            Err(Error::Io(_))
        ));
    }
}
