//! Diminishing returns for crowd-control buff types

use crate::types::{BuffType, Millis};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DrEntry {
    step: usize,
    last_hit: Millis,
}

/// Per-type ledger of crowd-control hits inside a rolling window
///
/// Each hit inside the window advances to the next step of `steps`; the last
/// step repeats once reached. A hit after the window has elapsed since the
/// previous one starts over at step 0.
#[derive(Debug, Clone)]
pub struct DiminishingReturns {
    window: Millis,
    steps: Vec<u32>,
    crowd_control: HashSet<BuffType>,
    ledger: HashMap<BuffType, DrEntry>,
}

impl DiminishingReturns {
    pub fn new(window: Millis, steps: Vec<u32>) -> Self {
        let steps = if steps.is_empty() { vec![100] } else { steps };
        DiminishingReturns {
            window,
            steps,
            crowd_control: HashSet::new(),
            ledger: HashMap::new(),
        }
    }

    pub fn mark_crowd_control(&mut self, buff_type: BuffType) {
        self.crowd_control.insert(buff_type);
    }

    pub fn is_crowd_control(&self, buff_type: BuffType) -> bool {
        self.crowd_control.contains(&buff_type)
    }

    /// Record a hit and return the percentage of duration it is granted
    ///
    /// Non crowd-control types always get 100 and are not recorded.
    pub fn hit(&mut self, buff_type: BuffType, now: Millis) -> u32 {
        if !self.is_crowd_control(buff_type) {
            return 100;
        }
        let last = self.steps.len() - 1;
        let window = self.window;
        let entry = self
            .ledger
            .entry(buff_type)
            .and_modify(|e| {
                e.step = if now.saturating_sub(e.last_hit) < window {
                    (e.step + 1).min(last)
                } else {
                    0
                };
                e.last_hit = now;
            })
            .or_insert(DrEntry {
                step: 0,
                last_hit: now,
            });
        self.steps[entry.step]
    }

    /// Step the next hit would land on, without recording anything
    pub fn peek(&self, buff_type: BuffType, now: Millis) -> u32 {
        if !self.is_crowd_control(buff_type) {
            return 100;
        }
        let step = match self.ledger.get(&buff_type) {
            Some(e) if now.saturating_sub(e.last_hit) < self.window => {
                (e.step + 1).min(self.steps.len() - 1)
            }
            _ => 0,
        };
        self.steps[step]
    }

    pub fn reset(&mut self) {
        self.ledger.clear();
    }
}

/// Scale `duration` by a percentage
pub fn scale_duration(duration: Millis, percent: u32) -> Millis {
    duration.saturating_mul(Millis::from(percent)) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUN: BuffType = BuffType(4);

    fn ledger() -> DiminishingReturns {
        let mut dr = DiminishingReturns::new(1000, vec![100, 50, 25, 0]);
        dr.mark_crowd_control(STUN);
        dr
    }

    #[test]
    fn test_steps_within_window() {
        let mut dr = ledger();
        assert_eq!(dr.hit(STUN, 0), 100);
        assert_eq!(dr.hit(STUN, 100), 50);
        assert_eq!(dr.hit(STUN, 200), 25);
        assert_eq!(dr.hit(STUN, 300), 0);
        // Immunity holds while hits keep landing inside the window
        assert_eq!(dr.hit(STUN, 400), 0);
    }

    #[test]
    fn test_window_reset() {
        let mut dr = ledger();
        dr.hit(STUN, 0);
        dr.hit(STUN, 100);
        assert_eq!(dr.peek(STUN, 1100), 100);
        assert_eq!(dr.hit(STUN, 1100), 100);
    }

    #[test]
    fn test_other_types_untouched() {
        let mut dr = ledger();
        for t in 0..5 {
            assert_eq!(dr.hit(BuffType(1), t), 100);
        }
    }

    #[test]
    fn test_scale_duration() {
        assert_eq!(scale_duration(1000, 50), 500);
        assert_eq!(scale_duration(1000, 0), 0);
        assert_eq!(scale_duration(999, 25), 249);
    }
}
