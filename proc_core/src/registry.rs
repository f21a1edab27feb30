use crate::bus::{EventBus, SubscriptionId};
use crate::config::ProcConstants;
use crate::definition::ProcDefinition;
use crate::event::{EventTypeId, GameEvent};
use crate::guard::LoopGuard;
use crate::runtime::ProcRuntime;
use crate::ProcError;
use effect_core::hash::{mix32, mix64, roll_percent};
use effect_core::pool::{Handle, SlotPool};
use effect_core::TemplateId;
use std::collections::HashMap;

#[derive(Debug)]
pub struct ProcSlot {
    pub definition: ProcDefinition,
    pub runtime: ProcRuntime,
}

/// Handle to a registered proc; stale once unregistered
pub type ProcId = Handle<ProcSlot>;

/// Result of evaluating one event against every registered proc
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    /// Effects to apply, in proc slot order
    pub effects: Vec<(ProcId, TemplateId)>,
    pub triggered: usize,
    pub cycles_broken: usize,
    /// Event dropped by the depth bound before any proc ran
    pub depth_aborted: bool,
}

/// Registry of proc definitions and their runtime state
#[derive(Debug)]
pub struct ProcEngine {
    slots: SlotPool<ProcSlot>,
    subscriptions: HashMap<EventTypeId, SubscriptionId>,
    guard: LoopGuard,
    constants: ProcConstants,
}

impl Default for ProcEngine {
    fn default() -> Self {
        Self::new(ProcConstants::default())
    }
}

impl ProcEngine {
    pub fn new(constants: ProcConstants) -> Self {
        ProcEngine {
            slots: SlotPool::with_capacity(constants.capacity),
            subscriptions: HashMap::new(),
            guard: LoopGuard::new(constants.max_depth),
            constants,
        }
    }

    /// Register a proc, subscribing to its trigger type on first use
    pub fn register(
        &mut self,
        definition: ProcDefinition,
        bus: &mut dyn EventBus,
    ) -> Result<ProcId, ProcError> {
        if self.slots.is_full() {
            tracing::warn!(capacity = self.slots.capacity(), "proc registry full");
            return Err(ProcError::RegistryFull {
                capacity: self.slots.capacity(),
            });
        }
        let trigger = definition.trigger;
        if !self.subscriptions.contains_key(&trigger) {
            let Some(subscription) = bus.subscribe(trigger) else {
                tracing::error!(event_type = %trigger, "event bus refused proc subscription");
                return Err(ProcError::SubscriptionFailed(trigger));
            };
            self.subscriptions.insert(trigger, subscription);
        }
        let slot = ProcSlot {
            definition,
            runtime: ProcRuntime::new(),
        };
        self.slots.insert(slot).map_err(|_| ProcError::RegistryFull {
            capacity: self.slots.capacity(),
        })
    }

    /// Remove a proc; the last one for a trigger type drops the subscription
    pub fn unregister(&mut self, id: ProcId, bus: &mut dyn EventBus) -> Result<(), ProcError> {
        let slot = self.slots.remove(id).ok_or(ProcError::UnknownProc)?;
        let trigger = slot.definition.trigger;
        let still_used = self
            .slots
            .iter()
            .any(|(_, s)| s.definition.trigger == trigger);
        if !still_used {
            if let Some(subscription) = self.subscriptions.remove(&trigger) {
                bus.unsubscribe(subscription);
            }
        }
        Ok(())
    }

    /// Drop every proc and subscription
    pub fn reset(&mut self, bus: &mut dyn EventBus) {
        for (_, subscription) in self.subscriptions.drain() {
            bus.unsubscribe(subscription);
        }
        self.slots.clear();
        self.guard.begin();
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_subscribed(&self, event_type: EventTypeId) -> bool {
        self.subscriptions.contains_key(&event_type)
    }

    pub fn definition(&self, id: ProcId) -> Option<&ProcDefinition> {
        self.slots.get(id).map(|s| &s.definition)
    }

    pub fn trigger_count(&self, id: ProcId) -> Option<u64> {
        self.slots.get(id).map(|s| s.runtime.triggers())
    }

    /// Current smoothing accumulator of a proc
    pub fn smoothing(&self, id: ProcId) -> Option<u32> {
        self.slots.get(id).map(|s| s.runtime.smoothing())
    }

    pub fn constants(&self) -> &ProcConstants {
        &self.constants
    }

    /// Start a top-level dispatch chain
    pub fn begin_dispatch(&mut self) {
        self.guard.begin();
    }

    /// Run every matching proc against `event` at cascade `depth` (1 = top level)
    pub fn evaluate(&mut self, event: &GameEvent, depth: u8) -> Evaluation {
        let mut evaluation = Evaluation::default();

        // Step 1: Re-entrancy bound
        if !self.guard.admits(depth) {
            tracing::warn!(
                event_type = %event.type_id,
                depth,
                max = self.guard.max_depth(),
                "proc loop depth exceeded; event dropped"
            );
            evaluation.depth_aborted = true;
            return evaluation;
        }

        let now = event.now_ms();
        let target = event.target();
        let base_signature = mix64(
            u64::from(event.type_id.0),
            event.timestamp_us / self.constants.cycle_bucket_us,
        );

        // Step 2: Each matching proc in slot order
        for (id, slot) in self.slots.iter_mut() {
            let def = &slot.definition;
            if !def.matches(event) {
                continue;
            }
            let runtime = &mut slot.runtime;

            if !runtime.global_ready(now, def.global_icd) {
                tracing::debug!(proc_id = ?id, now, "global ICD blocks");
                continue;
            }
            if !runtime.check_target(target, now, def.per_target_icd) {
                tracing::debug!(proc_id = ?id, ?target, now, "per-target ICD blocks");
                continue;
            }

            let effective =
                runtime.effective_chance(def.chance_percent, def.use_smoothing, now, &self.constants);
            if effective < 100 {
                let salt = mix32(
                    mix32(event.timestamp_us as u32, u32::from(event.type_id.0)),
                    u32::from(id.index()),
                );
                if !roll_percent(effective, salt) {
                    if def.use_smoothing {
                        runtime.on_miss(def.chance_percent);
                    }
                    tracing::debug!(proc_id = ?id, effective, "proc roll missed");
                    continue;
                }
            }

            runtime.on_trigger(now, def.chance_percent, def.use_smoothing);
            evaluation.triggered += 1;

            let signature = mix64(base_signature, u64::from(def.effect.0));
            if !self.guard.record(signature) {
                tracing::warn!(
                    proc_id = ?id,
                    effect = %def.effect,
                    event_type = %event.type_id,
                    "proc cycle detected; apply blocked"
                );
                evaluation.cycles_broken += 1;
                continue;
            }
            evaluation.effects.push((id, def.effect));
        }
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::LocalEventBus;
    use crate::event::DamagePayload;
    use effect_core::{DamageType, EntityId};

    fn hit(ts_us: u64, target: u32) -> GameEvent {
        GameEvent::damage(
            EventTypeId::DAMAGE_DEALT,
            ts_us,
            DamagePayload {
                source: EntityId(100),
                target: EntityId(target),
                amount: 5,
                damage_type: DamageType::Physical,
                crit: false,
            },
        )
    }

    fn fire(engine: &mut ProcEngine, event: &GameEvent) -> Evaluation {
        engine.begin_dispatch();
        engine.evaluate(event, 1)
    }

    #[test]
    fn test_single_subscription_per_type() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::default();
        engine
            .register(ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0)), &mut bus)
            .unwrap();
        engine
            .register(ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(1)), &mut bus)
            .unwrap();
        let crit = engine
            .register(ProcDefinition::new(EventTypeId::CRITICAL_HIT, TemplateId(1)), &mut bus)
            .unwrap();
        assert_eq!(bus.subscription_count(), 2);

        engine.unregister(crit, &mut bus).unwrap();
        assert_eq!(bus.subscription_count(), 1);
        assert!(!engine.is_subscribed(EventTypeId::CRITICAL_HIT));
        assert!(matches!(engine.unregister(crit, &mut bus), Err(ProcError::UnknownProc)));

        engine.reset(&mut bus);
        assert!(engine.is_empty());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_registry_full_and_subscription_failure() {
        let mut bus = LocalEventBus::with_capacity(1);
        let mut engine = ProcEngine::new(ProcConstants {
            capacity: 1,
            ..ProcConstants::default()
        });
        engine
            .register(ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0)), &mut bus)
            .unwrap();
        assert!(matches!(
            engine.register(ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0)), &mut bus),
            Err(ProcError::RegistryFull { capacity: 1 })
        ));

        let mut engine = ProcEngine::default();
        assert!(matches!(
            engine.register(ProcDefinition::new(EventTypeId::CRITICAL_HIT, TemplateId(0)), &mut bus),
            Err(ProcError::SubscriptionFailed(EventTypeId::CRITICAL_HIT))
        ));
        assert!(engine.is_empty());
    }

    #[test]
    fn test_global_icd_same_instant() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::default();
        let id = engine
            .register(
                ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0)).with_global_icd(10_000),
                &mut bus,
            )
            .unwrap();
        assert_eq!(fire(&mut engine, &hit(5_000, 1)).triggered, 1);
        assert_eq!(fire(&mut engine, &hit(5_000, 2)).triggered, 0);
        assert_eq!(engine.trigger_count(id), Some(1));
    }

    #[test]
    fn test_per_target_icd_different_targets() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::default();
        let id = engine
            .register(
                ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0))
                    .with_per_target_icd(10_000),
                &mut bus,
            )
            .unwrap();
        assert_eq!(fire(&mut engine, &hit(5_000, 1)).triggered, 1);
        assert_eq!(fire(&mut engine, &hit(5_000, 2)).triggered, 1);
        assert_eq!(fire(&mut engine, &hit(6_000, 1)).triggered, 0);
        assert_eq!(engine.trigger_count(id), Some(2));
    }

    #[test]
    fn test_predicate_filters() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::default();
        engine
            .register(
                ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0))
                    .with_predicate(|e: &GameEvent| e.target() == EntityId(7)),
                &mut bus,
            )
            .unwrap();
        assert!(fire(&mut engine, &hit(0, 1)).effects.is_empty());
        assert_eq!(fire(&mut engine, &hit(0, 7)).effects.len(), 1);
    }

    #[test]
    fn test_zero_chance_without_smoothing_never_fires() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::default();
        let id = engine
            .register(
                ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0)).with_chance(0),
                &mut bus,
            )
            .unwrap();
        for i in 0..50 {
            fire(&mut engine, &hit(i * 7_919, 1));
        }
        assert_eq!(engine.trigger_count(id), Some(0));
    }

    #[test]
    fn test_smoothing_guarantees_trigger() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::default();
        let id = engine
            .register(
                ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(0))
                    .with_chance(0)
                    .with_smoothing(true),
                &mut bus,
            )
            .unwrap();
        let mut fired = false;
        for i in 0..5u64 {
            if fire(&mut engine, &hit(i * 2_000_000, 1)).triggered == 1 {
                fired = true;
                break;
            }
            assert_eq!(engine.smoothing(id), Some(25 * (i as u32 + 1)));
        }
        assert!(fired);
        assert_eq!(engine.trigger_count(id), Some(1));
    }

    #[test]
    fn test_cycle_signature_per_chain() {
        let mut bus = LocalEventBus::new();
        let mut engine = ProcEngine::new(ProcConstants {
            recent_penalty: 0,
            ..ProcConstants::default()
        });
        engine
            .register(ProcDefinition::new(EventTypeId::DAMAGE_DEALT, TemplateId(3)), &mut bus)
            .unwrap();

        engine.begin_dispatch();
        let first = engine.evaluate(&hit(1_000, 1), 1);
        assert_eq!(first.effects.len(), 1);
        // Same type, bucket and effect deeper in the chain
        let second = engine.evaluate(&hit(1_500, 1), 2);
        assert_eq!(second.triggered, 1);
        assert_eq!(second.cycles_broken, 1);
        assert!(second.effects.is_empty());

        // A new chain forgets the signature
        assert_eq!(fire(&mut engine, &hit(1_500, 1)).effects.len(), 1);
    }

    #[test]
    fn test_depth_abort() {
        let mut engine = ProcEngine::default();
        let evaluation = engine.evaluate(&hit(0, 1), 9);
        assert!(evaluation.depth_aborted);
        assert_eq!(evaluation.triggered, 0);
    }
}
