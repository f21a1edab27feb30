//! Buff store: timed numeric modifiers addressed by generational handles

mod diminishing;

pub use diminishing::{scale_duration, DiminishingReturns};

use crate::config::BuffConstants;
use crate::pool::{Handle, SlotPool};
use crate::types::{BuffType, Millis, StackRule};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A live timed modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buff {
    pub buff_type: BuffType,
    pub magnitude: i32,
    pub end_time: Millis,
    pub stack_rule: StackRule,
    pub snapshot: bool,
    pub last_apply_time: Millis,
}

impl Buff {
    pub fn is_expired(&self, now: Millis) -> bool {
        now >= self.end_time
    }

    pub fn remaining(&self, now: Millis) -> Millis {
        self.end_time.saturating_sub(now)
    }
}

/// Reference to a buff slot; stale once the buff is removed or expires
pub type BuffHandle = Handle<Buff>;

/// Notified exactly once when a buff ends, by expiry or removal
pub trait BuffExpiryListener {
    fn on_expire(&mut self, buff_type: BuffType, magnitude: i32);
}

impl<F: FnMut(BuffType, i32)> BuffExpiryListener for F {
    fn on_expire(&mut self, buff_type: BuffType, magnitude: i32) {
        self(buff_type, magnitude)
    }
}

/// Fixed-capacity pool of buffs with stacking, dampening and diminishing returns
pub struct BuffStore {
    pool: SlotPool<Buff>,
    min_reapply_interval: Millis,
    magnitude_cap: i32,
    dr: DiminishingReturns,
    on_expire: Option<Box<dyn BuffExpiryListener>>,
    clock: Millis,
}

impl fmt::Debug for BuffStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuffStore")
            .field("live", &self.pool.len())
            .field("capacity", &self.pool.capacity())
            .field("min_reapply_interval", &self.min_reapply_interval)
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for BuffStore {
    fn default() -> Self {
        Self::new(&BuffConstants::default())
    }
}

impl BuffStore {
    pub fn new(constants: &BuffConstants) -> Self {
        let mut dr = DiminishingReturns::new(constants.dr_window_ms, constants.dr_steps.clone());
        for buff_type in &constants.crowd_control {
            dr.mark_crowd_control(*buff_type);
        }
        BuffStore {
            pool: SlotPool::with_capacity(constants.capacity),
            min_reapply_interval: constants.min_reapply_interval_ms,
            magnitude_cap: constants.magnitude_cap,
            dr,
            on_expire: None,
            clock: 0,
        }
    }

    /// Minimum gap between same-type applications; closer ones are dropped
    pub fn set_dampening(&mut self, interval: Millis) {
        self.min_reapply_interval = interval;
    }

    pub fn mark_crowd_control(&mut self, buff_type: BuffType) {
        self.dr.mark_crowd_control(buff_type);
    }

    pub fn is_crowd_control(&self, buff_type: BuffType) -> bool {
        self.dr.is_crowd_control(buff_type)
    }

    /// Percent of its duration the next crowd-control hit of `buff_type` would get
    pub fn dr_percent(&self, buff_type: BuffType, now: Millis) -> u32 {
        self.dr.peek(buff_type, now)
    }

    pub fn set_on_expire(&mut self, listener: impl BuffExpiryListener + 'static) {
        self.on_expire = Some(Box::new(listener));
    }

    pub fn clear_on_expire(&mut self) {
        self.on_expire = None;
    }

    /// Latest time observed by the store
    pub fn clock(&self) -> Millis {
        self.clock
    }

    fn find_type(&self, buff_type: BuffType) -> Option<BuffHandle> {
        self.pool
            .iter()
            .find(|(_, b)| b.buff_type == buff_type)
            .map(|(h, _)| h)
    }

    /// Apply or stack a buff
    ///
    /// Returns `None` when the application is dropped: non-positive magnitude,
    /// zero duration, dampening, full diminishing returns, a `Unique` collision,
    /// `Multiply` with nothing to multiply, or a full pool.
    pub fn apply(
        &mut self,
        buff_type: BuffType,
        magnitude: i32,
        duration: Millis,
        now: Millis,
        rule: StackRule,
        snapshot: bool,
    ) -> Option<BuffHandle> {
        if magnitude <= 0 || duration == 0 {
            return None;
        }
        self.advance_time(now);

        let existing = self.find_type(buff_type);

        // Dampening: drop re-applications that arrive too quickly
        if let Some(buff) = existing.and_then(|h| self.pool.get(h)) {
            if now.saturating_sub(buff.last_apply_time) < self.min_reapply_interval {
                tracing::debug!(?buff_type, now, "buff re-application dampened");
                return None;
            }
        }

        // Diminishing returns scale the granted duration
        let granted = if self.dr.is_crowd_control(buff_type) {
            let percent = self.dr.hit(buff_type, now);
            let granted = scale_duration(duration, percent);
            if granted == 0 {
                tracing::debug!(?buff_type, now, "crowd control suppressed by diminishing returns");
                return None;
            }
            granted
        } else {
            duration
        };

        let cap = self.magnitude_cap;
        if let Some(handle) = existing {
            let buff = self.pool.get_mut(handle)?;
            buff.last_apply_time = now;
            let new_end = now + granted;
            match rule {
                StackRule::Unique => return None,
                StackRule::Refresh => {
                    buff.magnitude = buff.magnitude.max(magnitude);
                    buff.end_time = new_end;
                }
                StackRule::Extend => {
                    buff.end_time = (buff.end_time + granted).max(new_end);
                    buff.magnitude = buff.magnitude.max(magnitude);
                }
                StackRule::Add => {
                    buff.magnitude = buff.magnitude.saturating_add(magnitude).min(cap);
                    buff.end_time = buff.end_time.max(new_end);
                }
                StackRule::Multiply => {
                    // Incoming magnitude is a percentage, e.g. 110 = +10%
                    let percent = i64::from(magnitude.max(1));
                    let scaled = i64::from(buff.magnitude) * percent / 100;
                    buff.magnitude = scaled.clamp(0, i64::from(cap)) as i32;
                    buff.end_time = buff.end_time.max(new_end);
                }
                StackRule::ReplaceIfStronger => {
                    buff.magnitude = buff.magnitude.max(magnitude);
                    buff.end_time = buff.end_time.max(new_end);
                }
            }
            return Some(handle);
        }

        if rule == StackRule::Multiply {
            return None;
        }

        let buff = Buff {
            buff_type,
            magnitude: magnitude.min(cap),
            end_time: now + granted,
            stack_rule: rule,
            snapshot,
            last_apply_time: now,
        };
        match self.pool.insert(buff) {
            Ok(handle) => Some(handle),
            Err(_) => {
                tracing::warn!(
                    ?buff_type,
                    capacity = self.pool.capacity(),
                    "buff pool exhausted; application dropped"
                );
                None
            }
        }
    }

    /// Re-apply onto the buff behind `handle` with its original snapshot flag
    pub fn refresh(
        &mut self,
        handle: BuffHandle,
        magnitude: i32,
        duration: Millis,
        now: Millis,
        rule: StackRule,
    ) -> bool {
        let Some(buff) = self.pool.get(handle).copied() else {
            return false;
        };
        if buff.is_expired(now) {
            return false;
        }
        self.apply(buff.buff_type, magnitude, duration, now, rule, buff.snapshot)
            .is_some()
    }

    /// Remove a buff early, firing the expiry listener
    pub fn remove(&mut self, handle: BuffHandle, now: Millis) -> bool {
        self.clock = self.clock.max(now);
        match self.pool.remove(handle) {
            Some(buff) => {
                self.notify(&buff);
                true
            }
            None => false,
        }
    }

    pub fn query(&self, handle: BuffHandle) -> Option<Buff> {
        self.pool.get(handle).copied()
    }

    /// Sum of live magnitudes of `buff_type` at the store clock
    pub fn total(&self, buff_type: BuffType) -> i64 {
        self.total_at(buff_type, self.clock)
    }

    /// Sum of magnitudes of `buff_type` still running at `now`
    pub fn total_at(&self, buff_type: BuffType, now: Millis) -> i64 {
        self.pool
            .iter()
            .filter(|(_, b)| b.buff_type == buff_type && !b.is_expired(now))
            .map(|(_, b)| i64::from(b.magnitude))
            .sum()
    }

    pub fn active_count(&self) -> usize {
        self.pool.len()
    }

    /// The `index`-th live buff in slot order
    pub fn get_active(&self, index: usize) -> Option<Buff> {
        self.pool.iter().nth(index).map(|(_, b)| *b)
    }

    /// Expire anything due, then copy out up to `max` live buffs
    pub fn snapshot(&mut self, max: usize, now: Millis) -> Vec<Buff> {
        self.advance_time(now);
        self.pool.iter().take(max).map(|(_, b)| *b).collect()
    }

    /// Expire every buff whose end time has been reached; returns how many ended
    pub fn advance_time(&mut self, now: Millis) -> usize {
        self.clock = self.clock.max(now);
        let expired = self.pool.handles_where(|b| b.is_expired(now));
        for handle in &expired {
            if let Some(buff) = self.pool.remove(*handle) {
                self.notify(&buff);
            }
        }
        expired.len()
    }

    fn notify(&mut self, buff: &Buff) {
        if let Some(listener) = self.on_expire.as_mut() {
            listener.on_expire(buff.buff_type, buff.magnitude);
        }
    }

    /// Drop all buffs and DR history without notifying
    pub fn reset(&mut self) {
        self.pool.clear();
        self.dr.reset();
        self.clock = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    const STR: BuffType = BuffType(1);
    const AGI: BuffType = BuffType(2);
    const STUN: BuffType = BuffType(9);

    fn store() -> BuffStore {
        let mut store = BuffStore::default();
        store.set_dampening(0);
        store
    }

    #[test]
    fn test_unique_ignores_second() {
        let mut store = store();
        assert!(store.apply(STR, 5, 1000, 0, StackRule::Unique, false).is_some());
        assert!(store.apply(STR, 7, 1000, 100, StackRule::Unique, false).is_none());
        assert_eq!(store.total(STR), 5);
    }

    #[test]
    fn test_add_sums() {
        let mut store = store();
        store.apply(STR, 3, 1000, 0, StackRule::Add, false);
        store.apply(STR, 3, 1000, 100, StackRule::Add, false);
        assert_eq!(store.total(STR), 6);
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_add_caps_magnitude() {
        let mut store = store();
        store.apply(STR, 900, 1000, 0, StackRule::Add, false);
        store.apply(STR, 900, 1000, 10, StackRule::Add, false);
        assert_eq!(store.total(STR), 999);
    }

    #[test]
    fn test_multiply() {
        let mut store = store();
        store.apply(STR, 10, 1000, 0, StackRule::Add, false);
        let h = store.apply(STR, 150, 1000, 100, StackRule::Multiply, false);
        assert!(h.is_some());
        assert_eq!(store.total(STR), 15);
    }

    #[test]
    fn test_multiply_without_baseline() {
        let mut store = store();
        assert!(store.apply(STR, 150, 1000, 0, StackRule::Multiply, false).is_none());
        assert_eq!(store.total(STR), 0);
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_refresh_and_extend() {
        let mut store = store();
        let h = store.apply(STR, 5, 1000, 0, StackRule::Add, false).unwrap();
        store.apply(STR, 2, 1000, 500, StackRule::Refresh, false);
        let buff = store.query(h).unwrap();
        assert_eq!(buff.end_time, 1500);
        assert_eq!(buff.magnitude, 5);

        store.apply(STR, 8, 1000, 600, StackRule::Extend, false);
        let buff = store.query(h).unwrap();
        assert_eq!(buff.end_time, 2500);
        assert_eq!(buff.magnitude, 8);
    }

    #[test]
    fn test_replace_if_stronger() {
        let mut store = store();
        let h = store.apply(STR, 5, 1000, 0, StackRule::Add, false).unwrap();
        store.apply(STR, 3, 2000, 100, StackRule::ReplaceIfStronger, false);
        assert_eq!(store.query(h).unwrap().magnitude, 5);
        assert_eq!(store.query(h).unwrap().end_time, 2100);
        store.apply(STR, 9, 10, 200, StackRule::ReplaceIfStronger, false);
        assert_eq!(store.query(h).unwrap().magnitude, 9);
        assert_eq!(store.query(h).unwrap().end_time, 2100);
    }

    #[test]
    fn test_dampening() {
        let mut store = BuffStore::default();
        store.apply(STR, 3, 1000, 0, StackRule::Add, false);
        assert!(store.apply(STR, 3, 1000, 20, StackRule::Add, false).is_none());
        assert_eq!(store.total(STR), 3);
        assert!(store.apply(STR, 3, 1000, 50, StackRule::Add, false).is_some());
        assert_eq!(store.total(STR), 6);
        // Other types are not dampened
        assert!(store.apply(AGI, 1, 1000, 51, StackRule::Add, false).is_some());
    }

    #[test]
    fn test_rejects_empty() {
        let mut store = store();
        assert!(store.apply(STR, 0, 1000, 0, StackRule::Add, false).is_none());
        assert!(store.apply(STR, -4, 1000, 0, StackRule::Add, false).is_none());
        assert!(store.apply(STR, 4, 0, 0, StackRule::Add, false).is_none());
    }

    #[test]
    fn test_diminishing_returns() {
        let mut store = store();
        store.mark_crowd_control(STUN);
        assert_eq!(store.dr_percent(STUN, 0), 100);

        let h = store.apply(STUN, 1, 1000, 0, StackRule::Refresh, false).unwrap();
        assert_eq!(store.dr_percent(STUN, 50), 50);
        assert_eq!(store.query(h).unwrap().end_time, 1000);
        store.apply(STUN, 1, 1000, 100, StackRule::Refresh, false);
        assert_eq!(store.query(h).unwrap().end_time, 600);
        store.apply(STUN, 1, 1000, 200, StackRule::Refresh, false);
        assert_eq!(store.query(h).unwrap().end_time, 450);
        assert_eq!(store.dr_percent(STUN, 250), 0);
        // Fourth hit is fully suppressed
        assert!(store.apply(STUN, 1, 1000, 300, StackRule::Refresh, false).is_none());
        assert_eq!(store.query(h).unwrap().end_time, 450);

        // Window elapsed since the last hit: full duration again
        let later = 300 + 15_000;
        assert_eq!(store.dr_percent(STUN, later), 100);
        let h = store.apply(STUN, 1, 1000, later, StackRule::Refresh, false).unwrap();
        assert_eq!(store.query(h).unwrap().end_time, later + 1000);
    }

    #[test]
    fn test_handle_safety() {
        let mut store = store();
        let h1 = store.apply(STR, 5, 1000, 0, StackRule::Add, false).unwrap();
        assert!(store.remove(h1, 10));
        assert!(store.query(h1).is_none());

        let h2 = store.apply(AGI, 7, 1000, 20, StackRule::Add, false).unwrap();
        assert_eq!(h1.index(), h2.index());
        assert!(store.query(h1).is_none());
        assert!(!store.remove(h1, 30));
        assert!(!store.refresh(h1, 1, 100, 30, StackRule::Add));
        assert_eq!(store.query(h2).unwrap().magnitude, 7);
    }

    #[test]
    fn test_refresh_by_handle() {
        let mut store = store();
        let h = store.apply(STR, 5, 1000, 0, StackRule::Add, true).unwrap();
        assert!(store.refresh(h, 5, 1000, 100, StackRule::Add));
        let buff = store.query(h).unwrap();
        assert_eq!(buff.magnitude, 10);
        assert!(buff.snapshot);
        assert!(!store.refresh(h, 5, 1000, 5000, StackRule::Add));
    }

    #[test]
    fn test_expiry_callback_once() {
        let mut store = store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.set_on_expire(move |t: BuffType, m: i32| sink.borrow_mut().push((t, m)));

        let h = store.apply(STR, 4, 100, 0, StackRule::Add, false).unwrap();
        let removed = store.apply(AGI, 2, 500, 0, StackRule::Add, false).unwrap();
        assert_eq!(store.advance_time(100), 1);
        assert_eq!(store.advance_time(200), 0);
        assert!(!store.remove(h, 200));
        assert!(store.remove(removed, 250));
        assert_eq!(*seen.borrow(), vec![(STR, 4), (AGI, 2)]);
    }

    #[test]
    fn test_total_ignores_expired() {
        let mut store = store();
        store.apply(STR, 4, 100, 0, StackRule::Add, false);
        assert_eq!(store.total_at(STR, 99), 4);
        assert_eq!(store.total_at(STR, 100), 0);
    }

    #[test]
    fn test_snapshot_and_active() {
        let mut store = store();
        store.apply(STR, 1, 100, 0, StackRule::Add, false);
        store.apply(AGI, 2, 1000, 0, StackRule::Add, false);
        store.apply(BuffType(3), 3, 1000, 0, StackRule::Add, false);
        let snap = store.snapshot(8, 150);
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].buff_type, AGI);
        assert_eq!(store.get_active(1).unwrap().buff_type, BuffType(3));
        assert_eq!(store.snapshot(1, 150).len(), 1);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut store = BuffStore::new(&BuffConstants {
            capacity: 2,
            ..BuffConstants::default()
        });
        assert!(store.apply(BuffType(1), 1, 100, 0, StackRule::Add, false).is_some());
        assert!(store.apply(BuffType(2), 1, 100, 0, StackRule::Add, false).is_some());
        assert!(store.apply(BuffType(3), 1, 100, 0, StackRule::Add, false).is_none());
        assert_eq!(store.active_count(), 2);
    }

    proptest! {
        #[test]
        fn prop_totals_stay_in_band(
            ops in prop::collection::vec((0u16..4, 1i32..400, 1u64..500, 0usize..6), 1..100)
        ) {
            let rules = [
                StackRule::Unique,
                StackRule::Refresh,
                StackRule::Extend,
                StackRule::Add,
                StackRule::Multiply,
                StackRule::ReplaceIfStronger,
            ];
            let mut store = store();
            for (step, (ty, mag, dur, rule)) in ops.into_iter().enumerate() {
                let now = step as Millis * 10;
                store.apply(BuffType(ty), mag, dur, now, rules[rule], false);
                for t in 0..4 {
                    let total = store.total(BuffType(t));
                    prop_assert!((0..=999).contains(&total));
                }
            }
        }
    }
}
