//! Proc tunables and the combined engine configuration file

use effect_core::config::{self as effect_config, ConfigError};
use effect_core::{EffectConstants, Millis};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcConstants {
    /// Maximum registered procs
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Deepest proc -> effect -> event chain evaluated
    #[serde(default = "default_max_depth")]
    pub max_depth: u8,
    /// Window for counting recent triggers
    #[serde(default = "default_recent_window")]
    pub recent_window_ms: Millis,
    /// Chance points lost per recent trigger beyond the first
    #[serde(default = "default_recent_penalty")]
    pub recent_penalty: u32,
    #[serde(default = "default_max_recent_penalty")]
    pub max_recent_penalty: u32,
    /// Microseconds per time bucket in cycle signatures
    #[serde(default = "default_cycle_bucket")]
    pub cycle_bucket_us: u64,
}

impl Default for ProcConstants {
    fn default() -> Self {
        ProcConstants {
            capacity: default_capacity(),
            max_depth: default_max_depth(),
            recent_window_ms: default_recent_window(),
            recent_penalty: default_recent_penalty(),
            max_recent_penalty: default_max_recent_penalty(),
            cycle_bucket_us: default_cycle_bucket(),
        }
    }
}

fn default_capacity() -> usize {
    128
}
fn default_max_depth() -> u8 {
    8
}
fn default_recent_window() -> Millis {
    1000
}
fn default_recent_penalty() -> u32 {
    12
}
fn default_max_recent_penalty() -> u32 {
    60
}
fn default_cycle_bucket() -> u64 {
    1000
}

/// Effect and proc constants read from one TOML file
///
/// ```toml
/// [effects.buffs]
/// min_reapply_interval_ms = 0
///
/// [procs]
/// max_depth = 4
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub effects: EffectConstants,
    #[serde(default)]
    pub procs: ProcConstants,
}

impl EngineConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let config: EngineConfig = effect_config::load_toml(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.effects.validate()?;
        if self.procs.capacity == 0 || self.procs.capacity > usize::from(u16::MAX) {
            return Err(ConfigError::Validation(
                "procs.capacity must be between 1 and 65535".into(),
            ));
        }
        if self.procs.max_depth == 0 {
            return Err(ConfigError::Validation("procs.max_depth must be positive".into()));
        }
        if self.procs.cycle_bucket_us == 0 {
            return Err(ConfigError::Validation("procs.cycle_bucket_us must be positive".into()));
        }
        Ok(())
    }
}
