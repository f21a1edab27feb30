//! effect_core - Timed effects for game entities
//!
//! This library provides:
//! - BuffStore: timed numeric modifiers with stacking rules and diminishing returns
//! - TemplateRegistry: immutable effect templates loaded from code or TOML/JSON
//! - EffectScheduler: the apply pipeline, periodic pulses and delayed children
//! - EffectEngine: one context object owning all of the above
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use effect_core::prelude::*;
//!
//! let mut engine = EffectEngine::new(&EffectConstants::default());
//! let burn = engine.register(
//!     EffectTemplate::damage_over_time("burn", 10, 200).with_pulse_period(100),
//! )?;
//!
//! let mut world = Battlefield::new();
//! world.spawn(EntityId(1), Vec2::ZERO, 100);
//!
//! engine.apply(burn, 0, &mut world)?;     // health 90
//! engine.advance_time(200, &mut world);   // health 70
//! ```

pub mod buff;
pub mod config;
pub mod defense;
pub mod hash;
pub mod pool;
pub mod prelude;
pub mod scheduler;
pub mod template;
pub mod types;
pub mod world;

use thiserror::Error;

// Core API - what most users need
pub use buff::{Buff, BuffHandle, BuffStore};
pub use config::{ConfigError, EffectConstants};
pub use scheduler::{ApplyOutcome, ApplyReport, DamageRecord, EffectScheduler, GateReason};
pub use template::{EffectTemplate, TemplateRegistry};
pub use types::{BuffType, DamageType, EffectKind, EntityId, Millis, StackRule, TemplateId};
pub use world::{Battlefield, CombatWorld};

/// Failures surfaced by the effect pipeline
///
/// Gated applications are not errors; see [`GateReason`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("unknown effect template {0}")]
    UnknownTemplate(TemplateId),
    #[error("invalid effect template: {0}")]
    InvalidTemplate(String),
    #[error("pending-event queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Template registry, buff store and scheduler owned by one simulation
#[derive(Debug)]
pub struct EffectEngine {
    pub templates: TemplateRegistry,
    pub buffs: BuffStore,
    pub scheduler: EffectScheduler,
}

impl Default for EffectEngine {
    fn default() -> Self {
        Self::new(&EffectConstants::default())
    }
}

impl EffectEngine {
    pub fn new(constants: &EffectConstants) -> Self {
        EffectEngine {
            templates: TemplateRegistry::new().with_min_aura_radius(constants.aura.min_radius),
            buffs: BuffStore::new(&constants.buffs),
            scheduler: EffectScheduler::new(constants),
        }
    }

    pub fn register(&mut self, template: EffectTemplate) -> Result<TemplateId, EffectError> {
        self.templates.register(template)
    }

    /// Apply a template now
    pub fn apply(
        &mut self,
        template: TemplateId,
        now: Millis,
        world: &mut dyn CombatWorld,
    ) -> Result<ApplyOutcome, EffectError> {
        self.scheduler
            .apply(&self.templates, &mut self.buffs, world, template, now)
    }

    /// Run due pulses and children, then expire buffs; returns events processed
    pub fn advance_time(&mut self, now: Millis, world: &mut dyn CombatWorld) -> usize {
        let processed = self
            .scheduler
            .advance_time(&self.templates, &mut self.buffs, world, now);
        self.buffs.advance_time(now);
        processed
    }

    /// Live total of a buff type, for damage formulas outside the engine
    pub fn total(&self, buff_type: BuffType) -> i64 {
        self.buffs.total(buff_type)
    }

    /// Clear every piece of state, templates included
    pub fn reset(&mut self) {
        self.templates.reset();
        self.buffs.reset();
        self.scheduler.reset();
    }
}
