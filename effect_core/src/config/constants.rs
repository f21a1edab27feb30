//! Tunable effect constants

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ConfigError;
use crate::types::{BuffType, Millis};

/// Tunables for the buff store, scheduler and damage dispatch
///
/// Passed explicitly to [`crate::EffectEngine::new`]; nothing here is global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectConstants {
    #[serde(default)]
    pub buffs: BuffConstants,
    #[serde(default)]
    pub scheduler: SchedulerConstants,
    #[serde(default)]
    pub crit: CritConstants,
    #[serde(default)]
    pub magnitude: MagnitudeConstants,
    #[serde(default)]
    pub aura: AuraConstants,
}

impl EffectConstants {
    /// Load constants from a TOML file
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let constants: EffectConstants = super::load_toml(path)?;
        constants.validate()?;
        Ok(constants)
    }

    /// Parse constants from a TOML string
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let constants: EffectConstants = super::parse_toml(toml)?;
        constants.validate()?;
        Ok(constants)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffs.capacity == 0 {
            return Err(ConfigError::Validation("buffs.capacity must be positive".into()));
        }
        if self.buffs.dr_steps.is_empty() {
            return Err(ConfigError::Validation("buffs.dr_steps must not be empty".into()));
        }
        if self.buffs.dr_steps.iter().any(|s| *s > 100) {
            return Err(ConfigError::Validation(
                "buffs.dr_steps are percentages and must not exceed 100".into(),
            ));
        }
        if self.magnitude.floor > self.magnitude.cap {
            return Err(ConfigError::Validation(format!(
                "magnitude.floor ({}) exceeds magnitude.cap ({})",
                self.magnitude.floor, self.magnitude.cap
            )));
        }
        if self.scheduler.damage_log_capacity == 0 {
            return Err(ConfigError::Validation(
                "scheduler.damage_log_capacity must be positive".into(),
            ));
        }
        if !(self.aura.min_radius.is_finite() && self.aura.min_radius > 0.0) {
            return Err(ConfigError::Validation("aura.min_radius must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffConstants {
    /// Number of simultaneously live buffs
    #[serde(default = "default_buff_capacity")]
    pub capacity: usize,
    /// Same-type applications closer together than this are dropped
    #[serde(default = "default_min_reapply_interval")]
    pub min_reapply_interval_ms: Millis,
    /// Rolling window for crowd-control diminishing returns
    #[serde(default = "default_dr_window")]
    pub dr_window_ms: Millis,
    /// Duration percentage granted by the 1st, 2nd, ... hit inside the window
    #[serde(default = "default_dr_steps")]
    pub dr_steps: Vec<u32>,
    /// Buff types subject to diminishing returns
    #[serde(default)]
    pub crowd_control: Vec<BuffType>,
    /// Upper bound for a single buff's magnitude after stacking
    #[serde(default = "default_magnitude_cap")]
    pub magnitude_cap: i32,
}

impl Default for BuffConstants {
    fn default() -> Self {
        BuffConstants {
            capacity: 32,
            min_reapply_interval_ms: 50,
            dr_window_ms: 15_000,
            dr_steps: default_dr_steps(),
            crowd_control: Vec::new(),
            magnitude_cap: 999,
        }
    }
}

fn default_buff_capacity() -> usize {
    32
}
fn default_min_reapply_interval() -> Millis {
    50
}
fn default_dr_window() -> Millis {
    15_000
}
fn default_dr_steps() -> Vec<u32> {
    vec![100, 50, 25, 0]
}
fn default_magnitude_cap() -> i32 {
    999
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConstants {
    /// Maximum number of pending pulses and delayed children
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Active DoT / aura records tracked per kind
    #[serde(default = "default_active_capacity")]
    pub active_capacity: usize,
    /// Deepest chain of delayed children allowed to apply
    #[serde(default = "default_max_cascade_depth")]
    pub max_cascade_depth: u8,
    /// Most recent hits kept in the damage log
    #[serde(default = "default_damage_log_capacity")]
    pub damage_log_capacity: usize,
}

impl Default for SchedulerConstants {
    fn default() -> Self {
        SchedulerConstants {
            queue_capacity: 256,
            active_capacity: 64,
            max_cascade_depth: 8,
            damage_log_capacity: 256,
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}
fn default_active_capacity() -> usize {
    64
}
fn default_max_cascade_depth() -> u8 {
    8
}
fn default_damage_log_capacity() -> usize {
    256
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CritConstants {
    /// Critical hit damage as a percentage of raw damage (150 = 1.5x)
    #[serde(default = "default_crit_multiplier")]
    pub multiplier_percent: i32,
    /// Force every crit decision one way (test hook)
    #[serde(default)]
    pub forced: Option<bool>,
}

impl Default for CritConstants {
    fn default() -> Self {
        CritConstants {
            multiplier_percent: 150,
            forced: None,
        }
    }
}

fn default_crit_multiplier() -> i32 {
    150
}

/// Band that scaled magnitudes are clamped into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MagnitudeConstants {
    #[serde(default = "default_magnitude_cap")]
    pub cap: i32,
    #[serde(default)]
    pub floor: i32,
}

impl Default for MagnitudeConstants {
    fn default() -> Self {
        MagnitudeConstants { cap: 999, floor: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuraConstants {
    /// Radius substituted for auras registered without one
    #[serde(default = "default_min_radius")]
    pub min_radius: f32,
}

impl Default for AuraConstants {
    fn default() -> Self {
        AuraConstants { min_radius: 1.5 }
    }
}

fn default_min_radius() -> f32 {
    1.5
}
