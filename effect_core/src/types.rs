//! Core types shared by the buff store, template registry and scheduler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Simulation time in milliseconds
pub type Millis = u64;

/// Identifier of a buff category (strength, stun, armor shred, ...)
///
/// Zero is a valid buff type; "no buff type" is always expressed as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuffType(pub u16);

/// Identifier of a combat entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct EntityId(pub u32);

/// Sequential identifier assigned by the template registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TemplateId(pub u32);

impl TemplateId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned when a name does not map to a known enum variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownName {
    pub kind: &'static str,
    pub name: String,
}

impl fmt::Display for UnknownName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.name)
    }
}

impl std::error::Error for UnknownName {}

fn unknown(kind: &'static str, name: &str) -> UnknownName {
    UnknownName {
        kind,
        name: name.to_string(),
    }
}

/// Damage types routed through mitigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    #[default]
    Physical,
    Fire,
    Cold,
    Lightning,
    Chaos,
}

impl DamageType {
    pub fn all() -> &'static [DamageType] {
        &[
            DamageType::Physical,
            DamageType::Fire,
            DamageType::Cold,
            DamageType::Lightning,
            DamageType::Chaos,
        ]
    }
}

impl fmt::Display for DamageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DamageType::Physical => write!(f, "Physical"),
            DamageType::Fire => write!(f, "Fire"),
            DamageType::Cold => write!(f, "Cold"),
            DamageType::Lightning => write!(f, "Lightning"),
            DamageType::Chaos => write!(f, "Chaos"),
        }
    }
}

impl FromStr for DamageType {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "physical" => Ok(DamageType::Physical),
            "fire" => Ok(DamageType::Fire),
            "cold" | "frost" => Ok(DamageType::Cold),
            "lightning" => Ok(DamageType::Lightning),
            "chaos" | "poison" => Ok(DamageType::Chaos),
            _ => Err(unknown("damage type", s)),
        }
    }
}

/// What an effect does when it lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    /// Timed numeric modifier forwarded to the buff store
    StatBuff,
    /// Damage against a single resolved target, optionally pulsing
    DamageOverTime,
    /// Damage against every living entity in a radius, optionally pulsing
    Aura,
}

impl FromStr for EffectKind {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stat_buff" | "buff" => Ok(EffectKind::StatBuff),
            "dot" | "damage_over_time" => Ok(EffectKind::DamageOverTime),
            "aura" => Ok(EffectKind::Aura),
            _ => Err(unknown("effect kind", s)),
        }
    }
}

/// Algebra applied when an effect lands while a previous instance is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackRule {
    /// Second application is ignored
    Unique,
    /// Duration restarts from the new application
    Refresh,
    /// Remaining duration is kept and the new duration is appended
    Extend,
    /// Magnitudes sum
    Add,
    /// Incoming magnitude is a percentage applied to the existing magnitude
    Multiply,
    /// Larger magnitude wins, longer end time wins
    ReplaceIfStronger,
}

impl FromStr for StackRule {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unique" => Ok(StackRule::Unique),
            "refresh" => Ok(StackRule::Refresh),
            "extend" => Ok(StackRule::Extend),
            "add" => Ok(StackRule::Add),
            "multiply" => Ok(StackRule::Multiply),
            "replace_if_stronger" | "replace" => Ok(StackRule::ReplaceIfStronger),
            _ => Err(unknown("stack rule", s)),
        }
    }
}

/// When damage effects decide whether they crit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CritMode {
    /// Every pulse rolls independently
    #[default]
    PerPulse,
    /// One roll per application, shared by all of its pulses
    PerApplication,
}

impl FromStr for CritMode {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per_pulse" | "per_tick" => Ok(CritMode::PerPulse),
            "per_application" | "snapshot" => Ok(CritMode::PerApplication),
            _ => Err(unknown("crit mode", s)),
        }
    }
}
