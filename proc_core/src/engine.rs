//! Dispatch loop joining procs to the effect pipeline
//!
//! An event runs every matching proc; each triggered proc applies its effect,
//! and the damage that apply lands is relayed back in as new events one level
//! deeper. The chain is walked breadth-first with an explicit work queue, so
//! cascade depth never grows the call stack.

use crate::bus::EventBus;
use crate::config::EngineConfig;
use crate::definition::ProcDefinition;
use crate::event::{DamagePayload, EventTypeId, GameEvent};
use crate::registry::{ProcEngine, ProcId};
use crate::ProcError;
use effect_core::{ApplyOutcome, CombatWorld, DamageRecord, EffectEngine, Millis};
use std::collections::VecDeque;
use std::fmt;

/// Turns landed damage into the event fed back to procs
pub trait EventRelay {
    /// `cause` is the event whose proc landed the hit; `None` for scheduled pulses
    fn relay(&mut self, record: &DamageRecord, cause: Option<&GameEvent>) -> Option<GameEvent>;
}

impl<F> EventRelay for F
where
    F: FnMut(&DamageRecord, Option<&GameEvent>) -> Option<GameEvent>,
{
    fn relay(&mut self, record: &DamageRecord, cause: Option<&GameEvent>) -> Option<GameEvent> {
        self(record, cause)
    }
}

/// Relays every hit as `DAMAGE_DEALT` at the causing event's timestamp
#[derive(Debug, Clone, Copy, Default)]
pub struct DamageDealtRelay;

impl EventRelay for DamageDealtRelay {
    fn relay(&mut self, record: &DamageRecord, cause: Option<&GameEvent>) -> Option<GameEvent> {
        let timestamp_us = cause.map_or(record.time * 1000, |e| e.timestamp_us);
        let source = cause.and_then(GameEvent::source).unwrap_or_default();
        Some(GameEvent::damage(
            EventTypeId::DAMAGE_DEALT,
            timestamp_us,
            DamagePayload {
                source,
                target: record.target,
                amount: record.dealt,
                damage_type: record.damage_type,
                crit: record.crit,
            },
        ))
    }
}

/// Never relays; procs only see externally published events
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentRelay;

impl EventRelay for SilentRelay {
    fn relay(&mut self, _record: &DamageRecord, _cause: Option<&GameEvent>) -> Option<GameEvent> {
        None
    }
}

/// Counters from one or more dispatches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Events that passed the depth bound
    pub events_processed: usize,
    pub procs_triggered: usize,
    pub effects_applied: usize,
    pub cycles_broken: usize,
    pub depth_aborts: usize,
    /// Deepest level evaluated
    pub max_depth: u8,
}

impl DispatchReport {
    pub fn merge(&mut self, other: &DispatchReport) {
        self.events_processed += other.events_processed;
        self.procs_triggered += other.procs_triggered;
        self.effects_applied += other.effects_applied;
        self.cycles_broken += other.cycles_broken;
        self.depth_aborts += other.depth_aborts;
        self.max_depth = self.max_depth.max(other.max_depth);
    }
}

/// Effect engine plus proc registry for one simulation
pub struct Engine {
    pub effects: EffectEngine,
    pub procs: ProcEngine,
    relay: Box<dyn EventRelay>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("effects", &self.effects)
            .field("procs", &self.procs)
            .finish_non_exhaustive()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        Engine {
            effects: EffectEngine::new(&config.effects),
            procs: ProcEngine::new(config.procs.clone()),
            relay: Box::new(DamageDealtRelay),
        }
    }

    pub fn set_relay(&mut self, relay: impl EventRelay + 'static) {
        self.relay = Box::new(relay);
    }

    pub fn register_proc(
        &mut self,
        definition: ProcDefinition,
        bus: &mut dyn EventBus,
    ) -> Result<ProcId, ProcError> {
        self.procs.register(definition, bus)
    }

    /// Run one top-level event and everything it cascades into
    pub fn dispatch(&mut self, event: GameEvent, world: &mut dyn CombatWorld) -> DispatchReport {
        let mut report = DispatchReport::default();
        let mut pending = VecDeque::from([(event, 1u8)]);
        self.procs.begin_dispatch();

        while let Some((event, depth)) = pending.pop_front() {
            let evaluation = self.procs.evaluate(&event, depth);
            if evaluation.depth_aborted {
                report.depth_aborts += 1;
                continue;
            }
            report.events_processed += 1;
            report.max_depth = report.max_depth.max(depth);
            report.procs_triggered += evaluation.triggered;
            report.cycles_broken += evaluation.cycles_broken;

            let now = event.now_ms();
            for (proc_id, effect) in evaluation.effects {
                let cursor = self.effects.scheduler.damage_total();
                match self.effects.apply(effect, now, world) {
                    Ok(ApplyOutcome::Applied(_)) => report.effects_applied += 1,
                    Ok(ApplyOutcome::Gated(reason)) => {
                        tracing::debug!(?proc_id, %effect, ?reason, "proc effect gated");
                    }
                    Err(err) => {
                        tracing::warn!(?proc_id, %effect, %err, "proc effect failed");
                    }
                }
                for record in self.landed_since(cursor) {
                    if let Some(next) = self.relay.relay(&record, Some(&event)) {
                        pending.push_back((next, depth.saturating_add(1)));
                    }
                }
            }
        }
        report
    }

    /// Advance the effect pipeline; pulse damage is dispatched as top-level events
    pub fn advance_time(&mut self, now: Millis, world: &mut dyn CombatWorld) -> DispatchReport {
        let cursor = self.effects.scheduler.damage_total();
        self.effects.advance_time(now, world);

        let mut report = DispatchReport::default();
        for record in self.landed_since(cursor) {
            if let Some(event) = self.relay.relay(&record, None) {
                report.merge(&self.dispatch(event, world));
            }
        }
        report
    }

    fn landed_since(&self, cursor: u64) -> Vec<DamageRecord> {
        self.effects.scheduler.damage_since(cursor).copied().collect()
    }
}
