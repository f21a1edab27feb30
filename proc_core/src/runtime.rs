//! Per-proc runtime state: cooldown stamps, recent triggers and smoothing

use crate::config::ProcConstants;
use arrayvec::ArrayVec;
use effect_core::{EntityId, Millis};

/// Per-target cooldown slots tracked for each proc
pub const TARGET_SLOTS: usize = 16;
/// Recent trigger timestamps kept for dynamic suppression
pub const RECENT_SLOTS: usize = 8;

#[derive(Debug, Clone, Default)]
pub struct ProcRuntime {
    last_global_trigger: Option<Millis>,
    targets: ArrayVec<(EntityId, Millis), TARGET_SLOTS>,
    recent: ArrayVec<Millis, RECENT_SLOTS>,
    /// Pity percentage added to the roll while smoothing
    smoothing: u32,
    triggers: u64,
}

impl ProcRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global_ready(&self, now: Millis, icd: Millis) -> bool {
        match self.last_global_trigger {
            Some(last) if icd > 0 => now.saturating_sub(last) >= icd,
            _ => true,
        }
    }

    /// Check the per-target cooldown and stamp `target` when it passes
    ///
    /// A full ring evicts its oldest stamp.
    pub fn check_target(&mut self, target: EntityId, now: Millis, icd: Millis) -> bool {
        if icd == 0 {
            return true;
        }
        if let Some(slot) = self.targets.iter_mut().find(|(t, _)| *t == target) {
            if now.saturating_sub(slot.1) < icd {
                return false;
            }
            slot.1 = now;
            return true;
        }
        if self.targets.is_full() {
            let oldest = self
                .targets
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(i, _)| i);
            if let Some(i) = oldest {
                self.targets.remove(i);
            }
        }
        self.targets.push((target, now));
        true
    }

    /// Base chance after suppression for recent triggers
    pub fn scaled_chance(&mut self, base: u8, now: Millis, constants: &ProcConstants) -> u32 {
        let window = constants.recent_window_ms;
        self.recent.retain(|t| now.saturating_sub(*t) <= window);
        let recent = self.recent.len() as u32;
        let penalty = if recent > 1 {
            ((recent - 1) * constants.recent_penalty).min(constants.max_recent_penalty)
        } else {
            0
        };
        u32::from(base).saturating_sub(penalty)
    }

    /// Chance actually rolled: scaled chance plus accumulated pity
    pub fn effective_chance(
        &mut self,
        base: u8,
        smoothing: bool,
        now: Millis,
        constants: &ProcConstants,
    ) -> u32 {
        let scaled = self.scaled_chance(base, now, constants);
        let pity = if smoothing { self.smoothing } else { 0 };
        (scaled + pity).min(100)
    }

    pub fn on_miss(&mut self, base: u8) {
        let step = ((100 - u32::from(base.min(100))) / 4).max(1);
        self.smoothing = (self.smoothing + step).min(100);
    }

    pub fn on_trigger(&mut self, now: Millis, base: u8, smoothing: bool) {
        self.last_global_trigger = Some(now);
        if self.recent.is_full() {
            self.recent.remove(0);
        }
        self.recent.push(now);
        if smoothing {
            self.smoothing = self.smoothing.saturating_sub(u32::from(base));
        }
        self.triggers += 1;
    }

    pub fn smoothing(&self) -> u32 {
        self.smoothing
    }

    pub fn triggers(&self) -> u64 {
        self.triggers
    }

    pub fn tracked_targets(&self) -> usize {
        self.targets.len()
    }
}
