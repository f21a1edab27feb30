//! Proc definitions: which event triggers which effect, and how often

use crate::event::{EventTypeId, GameEvent};
use effect_core::{Millis, TemplateId};
use std::fmt;

/// Extra filter on events that match a proc's trigger type
pub trait EventPredicate {
    fn accepts(&self, event: &GameEvent) -> bool;
}

impl<F: Fn(&GameEvent) -> bool> EventPredicate for F {
    fn accepts(&self, event: &GameEvent) -> bool {
        self(event)
    }
}

/// A reactive effect trigger
pub struct ProcDefinition {
    pub trigger: EventTypeId,
    pub effect: TemplateId,
    pub global_icd: Millis,
    pub per_target_icd: Millis,
    pub predicate: Option<Box<dyn EventPredicate>>,
    /// Percent chance in `[0, 100]`
    pub chance_percent: u8,
    pub use_smoothing: bool,
}

impl fmt::Debug for ProcDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcDefinition")
            .field("trigger", &self.trigger)
            .field("effect", &self.effect)
            .field("global_icd", &self.global_icd)
            .field("per_target_icd", &self.per_target_icd)
            .field("predicate", &self.predicate.is_some())
            .field("chance_percent", &self.chance_percent)
            .field("use_smoothing", &self.use_smoothing)
            .finish()
    }
}

impl ProcDefinition {
    /// Always-triggering proc with no cooldowns
    pub fn new(trigger: EventTypeId, effect: TemplateId) -> Self {
        ProcDefinition {
            trigger,
            effect,
            global_icd: 0,
            per_target_icd: 0,
            predicate: None,
            chance_percent: 100,
            use_smoothing: false,
        }
    }

    pub fn with_global_icd(mut self, icd: Millis) -> Self {
        self.global_icd = icd;
        self
    }

    pub fn with_per_target_icd(mut self, icd: Millis) -> Self {
        self.per_target_icd = icd;
        self
    }

    /// Chance is clamped to 100
    pub fn with_chance(mut self, percent: u8) -> Self {
        self.chance_percent = percent.min(100);
        self
    }

    pub fn with_smoothing(mut self, smoothing: bool) -> Self {
        self.use_smoothing = smoothing;
        self
    }

    pub fn with_predicate(mut self, predicate: impl EventPredicate + 'static) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Trigger type matches and the predicate, if any, accepts
    pub fn matches(&self, event: &GameEvent) -> bool {
        event.type_id == self.trigger
            && self.predicate.as_ref().map_or(true, |p| p.accepts(event))
    }
}
