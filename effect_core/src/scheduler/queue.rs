//! Pending-event queue ordered by due time, then insertion sequence

use crate::types::{Millis, TemplateId};
use crate::EffectError;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// What a scheduled event does when it comes due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Periodic re-dispatch of an already-applied effect
    Pulse,
    /// Delayed child effect running the full apply pipeline
    Child { depth: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledEvent {
    pub template: TemplateId,
    pub due: Millis,
    pub sequence: u64,
    pub kind: EventKind,
    /// Snapshotted magnitude; `None` resolves live at the due time
    pub magnitude: Option<i32>,
    /// Per-application crit decision
    pub crit: Option<bool>,
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.sequence).cmp(&(other.due, other.sequence))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded min-queue of [`ScheduledEvent`]s
#[derive(Debug, Clone)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<ScheduledEvent>>,
    capacity: usize,
    next_sequence: u64,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            capacity,
            next_sequence: 0,
        }
    }

    /// Sequence number the next pushed event will receive
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Enqueue an event, stamping it with the next insertion sequence
    pub fn push(
        &mut self,
        template: TemplateId,
        due: Millis,
        kind: EventKind,
        magnitude: Option<i32>,
        crit: Option<bool>,
    ) -> Result<u64, EffectError> {
        if self.heap.len() >= self.capacity {
            return Err(EffectError::QueueFull {
                capacity: self.capacity,
            });
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(ScheduledEvent {
            template,
            due,
            sequence,
            kind,
            magnitude,
            crit,
        }));
        Ok(sequence)
    }

    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.heap.peek().map(|Reverse(e)| e)
    }

    /// Pop the earliest event if it is due at or before `now`
    pub fn pop_due(&mut self, now: Millis) -> Option<ScheduledEvent> {
        match self.peek() {
            Some(event) if event.due <= now => self.heap.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }

    /// Drop events of `template` matching `pred`; returns how many went
    pub fn cancel_where(
        &mut self,
        template: TemplateId,
        mut pred: impl FnMut(&ScheduledEvent) -> bool,
    ) -> usize {
        let before = self.heap.len();
        self.heap
            .retain(|Reverse(e)| !(e.template == template && pred(e)));
        before - self.heap.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
