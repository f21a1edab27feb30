//! Prelude module for convenient imports
//!
//! ```rust
//! use effect_core::prelude::*;
//! ```

// Core types
pub use crate::types::{
    BuffType, CritMode, DamageType, EffectKind, EntityId, Millis, StackRule, TemplateId,
};

// Engine context
pub use crate::{EffectEngine, EffectError};

// Buffs
pub use crate::buff::{Buff, BuffExpiryListener, BuffHandle, BuffStore};

// Templates
pub use crate::template::{EffectTemplate, TemplateRegistry};

// Scheduler
pub use crate::scheduler::{ApplyOutcome, ApplyReport, DamageRecord, EffectScheduler, GateReason};

// World
pub use crate::defense::{Mitigation, NoMitigation, ResistanceTable};
pub use crate::world::{Battlefield, BoundTarget, CombatWorld, FirstLiving, TargetPolicy};
pub use glam::Vec2;

// Config
pub use crate::config::{load_templates, ConfigError, EffectConstants};
