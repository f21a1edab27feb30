//! Convenient re-exports for wiring procs to an effect engine

pub use crate::bus::{EventBus, LocalEventBus, SubscriptionId};
pub use crate::config::{EngineConfig, ProcConstants};
pub use crate::definition::{EventPredicate, ProcDefinition};
pub use crate::engine::{DamageDealtRelay, DispatchReport, Engine, EventRelay, SilentRelay};
pub use crate::event::{DamagePayload, EventPayload, EventTypeId, GameEvent};
pub use crate::registry::{ProcEngine, ProcId};
pub use crate::ProcError;
