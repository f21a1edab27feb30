//! Game events delivered through the event bus

use effect_core::{DamageType, EntityId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Event type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventTypeId(pub u16);

impl EventTypeId {
    pub const DAMAGE_DEALT: EventTypeId = EventTypeId(1);
    pub const DAMAGE_TAKEN: EventTypeId = EventTypeId(2);
    pub const CRITICAL_HIT: EventTypeId = EventTypeId(3);
    pub const SKILL_CHANNEL_TICK: EventTypeId = EventTypeId(4);
    pub const SKILL_COMBO_SPEND: EventTypeId = EventTypeId(5);

    /// Whether events of this type carry a damage target
    pub fn is_damage(self) -> bool {
        matches!(
            self,
            EventTypeId::DAMAGE_DEALT | EventTypeId::DAMAGE_TAKEN | EventTypeId::CRITICAL_HIT
        )
    }
}

impl fmt::Display for EventTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EventTypeId::DAMAGE_DEALT => write!(f, "damage_dealt"),
            EventTypeId::DAMAGE_TAKEN => write!(f, "damage_taken"),
            EventTypeId::CRITICAL_HIT => write!(f, "critical_hit"),
            EventTypeId::SKILL_CHANNEL_TICK => write!(f, "skill_channel_tick"),
            EventTypeId::SKILL_COMBO_SPEND => write!(f, "skill_combo_spend"),
            EventTypeId(other) => write!(f, "event#{}", other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamagePayload {
    pub source: EntityId,
    pub target: EntityId,
    pub amount: i32,
    pub damage_type: DamageType,
    pub crit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventPayload {
    #[default]
    None,
    Damage(DamagePayload),
}

/// One event as seen by subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub type_id: EventTypeId,
    /// Microseconds
    pub timestamp_us: u64,
    pub priority: i8,
    pub payload: EventPayload,
}

impl GameEvent {
    pub fn new(type_id: EventTypeId, timestamp_us: u64) -> Self {
        GameEvent {
            type_id,
            timestamp_us,
            priority: 0,
            payload: EventPayload::None,
        }
    }

    pub fn damage(type_id: EventTypeId, timestamp_us: u64, payload: DamagePayload) -> Self {
        GameEvent {
            payload: EventPayload::Damage(payload),
            ..Self::new(type_id, timestamp_us)
        }
    }

    pub fn with_priority(mut self, priority: i8) -> Self {
        self.priority = priority;
        self
    }

    /// Event time in milliseconds
    pub fn now_ms(&self) -> u64 {
        self.timestamp_us / 1000
    }

    /// Target for per-target cooldowns; damage events only, else entity 0
    pub fn target(&self) -> EntityId {
        match self.payload {
            EventPayload::Damage(damage) if self.type_id.is_damage() => damage.target,
            _ => EntityId::default(),
        }
    }

    pub fn source(&self) -> Option<EntityId> {
        match self.payload {
            EventPayload::Damage(damage) => Some(damage.source),
            EventPayload::None => None,
        }
    }
}
