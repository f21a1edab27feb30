//! Event bus seam and an in-process implementation

use crate::engine::{DispatchReport, Engine};
use crate::event::{EventTypeId, GameEvent};
use effect_core::CombatWorld;
use std::collections::{HashMap, VecDeque};

/// Opaque subscription token handed out by a bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u32);

/// Subscription surface the proc engine needs from an event bus
pub trait EventBus {
    /// Subscribe to one event type; `None` when the bus refuses
    fn subscribe(&mut self, event_type: EventTypeId) -> Option<SubscriptionId>;

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;
}

/// Single-threaded bus that queues published events until pumped
#[derive(Debug, Clone)]
pub struct LocalEventBus {
    subscriptions: HashMap<SubscriptionId, EventTypeId>,
    max_subscriptions: usize,
    next_id: u32,
    queue: VecDeque<GameEvent>,
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Bus accepting at most `max_subscriptions` live subscriptions
    pub fn with_capacity(max_subscriptions: usize) -> Self {
        LocalEventBus {
            subscriptions: HashMap::new(),
            max_subscriptions,
            next_id: 1,
            queue: VecDeque::new(),
        }
    }

    pub fn is_subscribed(&self, event_type: EventTypeId) -> bool {
        self.subscriptions.values().any(|t| *t == event_type)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Queue an event for the next pump
    pub fn publish(&mut self, event: GameEvent) {
        self.queue.push_back(event);
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Deliver queued events in FIFO order; unsubscribed types are dropped
    pub fn pump(&mut self, engine: &mut Engine, world: &mut dyn CombatWorld) -> DispatchReport {
        let mut report = DispatchReport::default();
        while let Some(event) = self.queue.pop_front() {
            if !self.is_subscribed(event.type_id) {
                tracing::trace!(event_type = %event.type_id, "no subscribers");
                continue;
            }
            report.merge(&engine.dispatch(event, world));
        }
        report
    }
}

impl EventBus for LocalEventBus {
    fn subscribe(&mut self, event_type: EventTypeId) -> Option<SubscriptionId> {
        if self.subscriptions.len() >= self.max_subscriptions {
            return None;
        }
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.insert(id, event_type);
        Some(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_capacity() {
        let mut bus = LocalEventBus::with_capacity(1);
        let id = bus.subscribe(EventTypeId::DAMAGE_DEALT).unwrap();
        assert!(bus.is_subscribed(EventTypeId::DAMAGE_DEALT));
        assert!(bus.subscribe(EventTypeId::CRITICAL_HIT).is_none());

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(!bus.is_subscribed(EventTypeId::DAMAGE_DEALT));
        assert!(bus.subscribe(EventTypeId::CRITICAL_HIT).is_some());
    }

    #[test]
    fn test_publish_queues() {
        let mut bus = LocalEventBus::new();
        bus.publish(GameEvent::new(EventTypeId::SKILL_CHANNEL_TICK, 0));
        bus.publish(GameEvent::new(EventTypeId::SKILL_CHANNEL_TICK, 1));
        assert_eq!(bus.pending(), 2);
    }
}
