//! proc_core - Reactive effect triggers ("procs")
//!
//! A proc watches one event type and, when its cooldowns, predicate and
//! chance roll allow, applies an effect template through `effect_core`.
//! Damage landed by that effect is relayed back as new events, so procs can
//! chain; a depth bound and per-chain cycle signatures keep chains finite.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use effect_core::prelude::*;
//! use proc_core::prelude::*;
//!
//! let mut engine = Engine::new(&EngineConfig::default());
//! let mut bus = LocalEventBus::new();
//! let spark = engine.effects.register(EffectTemplate::damage_over_time("spark", 3, 0))?;
//! engine.register_proc(
//!     ProcDefinition::new(EventTypeId::CRITICAL_HIT, spark).with_chance(30).with_smoothing(true),
//!     &mut bus,
//! )?;
//!
//! bus.publish(GameEvent::new(EventTypeId::CRITICAL_HIT, 1_000));
//! let report = bus.pump(&mut engine, &mut world);
//! ```

pub mod bus;
pub mod config;
pub mod definition;
pub mod engine;
pub mod event;
pub mod guard;
pub mod prelude;
pub mod registry;
pub mod runtime;

pub use bus::{EventBus, LocalEventBus, SubscriptionId};
pub use config::{EngineConfig, ProcConstants};
pub use definition::{EventPredicate, ProcDefinition};
pub use engine::{DamageDealtRelay, DispatchReport, Engine, EventRelay, SilentRelay};
pub use event::{DamagePayload, EventPayload, EventTypeId, GameEvent};
pub use registry::{Evaluation, ProcEngine, ProcId};

use thiserror::Error;

/// Error registering or removing a proc
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcError {
    #[error("proc registry full (capacity {capacity})")]
    RegistryFull { capacity: usize },
    #[error("event bus refused a subscription to {0}")]
    SubscriptionFailed(EventTypeId),
    #[error("unknown or already removed proc")]
    UnknownProc,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ProcRuntime;
    use effect_core::prelude::Vec2;
    use effect_core::{Battlefield, CombatWorld, DamageType, EffectTemplate, EntityId, StackRule};
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Engine, LocalEventBus, Battlefield) {
        let mut engine = Engine::default();
        let mut bus = LocalEventBus::new();
        let spark = engine
            .effects
            .register(EffectTemplate::damage_over_time("spark", 2, 0))
            .unwrap();
        let bleed = engine
            .effects
            .register(
                EffectTemplate::damage_over_time("bleed", 1, 600)
                    .with_pulse_period(200)
                    .with_stack_rule(StackRule::Refresh),
            )
            .unwrap();
        engine
            .register_proc(
                ProcDefinition::new(EventTypeId::CRITICAL_HIT, spark)
                    .with_chance(35)
                    .with_smoothing(true),
                &mut bus,
            )
            .unwrap();
        engine
            .register_proc(
                ProcDefinition::new(EventTypeId::DAMAGE_DEALT, bleed)
                    .with_chance(20)
                    .with_global_icd(400),
                &mut bus,
            )
            .unwrap();

        let mut world = Battlefield::new();
        world.spawn(EntityId(1), Vec2::ZERO, 1_000_000);
        (engine, bus, world)
    }

    fn random_event(rng: &mut ChaCha8Rng, ts_us: u64) -> GameEvent {
        let type_id = if rng.gen_bool(0.5) {
            EventTypeId::CRITICAL_HIT
        } else {
            EventTypeId::DAMAGE_DEALT
        };
        GameEvent::damage(
            type_id,
            ts_us,
            DamagePayload {
                source: EntityId(9),
                target: EntityId(1),
                amount: rng.gen_range(1..50),
                damage_type: DamageType::Physical,
                crit: type_id == EventTypeId::CRITICAL_HIT,
            },
        )
    }

    fn replay(seed: u64) -> (DispatchReport, Option<i32>) {
        let (mut engine, mut bus, mut world) = setup();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut total = DispatchReport::default();
        let mut ts_us = 0;
        for _ in 0..40 {
            ts_us += rng.gen_range(50_000..400_000);
            bus.publish(random_event(&mut rng, ts_us));
            total.merge(&bus.pump(&mut engine, &mut world));
            total.merge(&engine.advance_time(ts_us / 1000, &mut world));
        }
        (total, world.health(EntityId(1)))
    }

    #[test]
    fn test_replay_is_deterministic() {
        for seed in [1, 7, 42] {
            let first = replay(seed);
            assert_eq!(first, replay(seed));
            assert!(first.0.events_processed >= 40);
        }
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ProcError::SubscriptionFailed(EventTypeId::CRITICAL_HIT).to_string(),
            "event bus refused a subscription to critical_hit"
        );
        assert_eq!(
            ProcError::RegistryFull { capacity: 4 }.to_string(),
            "proc registry full (capacity 4)"
        );
    }

    proptest! {
        #[test]
        fn prop_chance_stays_in_range(
            base in 0u8..=100,
            misses in 0usize..20,
            stamps in proptest::collection::vec(0u64..5_000, 0..12),
        ) {
            let constants = ProcConstants::default();
            let mut rt = ProcRuntime::new();
            let mut sorted = stamps;
            sorted.sort_unstable();
            for t in &sorted {
                rt.on_trigger(*t, base, true);
            }
            for _ in 0..misses {
                rt.on_miss(base);
            }
            prop_assert!(rt.smoothing() <= 100);
            let now = sorted.last().copied().unwrap_or(0);
            let scaled = rt.scaled_chance(base, now, &constants);
            prop_assert!(scaled <= u32::from(base));
            prop_assert!(u32::from(base) - scaled <= constants.max_recent_penalty);
            prop_assert!(rt.effective_chance(base, true, now, &constants) <= 100);
        }
    }
}
