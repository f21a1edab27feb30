//! Effect scheduler and application pipeline
//!
//! `apply` lands a template immediately and queues its future pulses and
//! delayed children. `advance_time` drains every due event in
//! `(due, insertion sequence)` order, so runs replay identically.

mod active;
mod dispatch;
mod queue;

pub use active::{ActiveRecord, ActiveTracker};
pub use dispatch::{aura_targets, land_hit, roll_crit, DamageRecord};
pub use queue::{EventKind, EventQueue, ScheduledEvent};

use crate::buff::{BuffHandle, BuffStore};
use crate::config::{CritConstants, EffectConstants, MagnitudeConstants};
use crate::template::{EffectTemplate, TemplateRegistry};
use crate::types::{CritMode, EffectKind, EntityId, Millis, StackRule, TemplateId};
use crate::world::{CombatWorld, FirstLiving, TargetPolicy};
use crate::EffectError;
use std::collections::VecDeque;
use std::fmt;

/// Why an apply landed without any side effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateReason {
    /// Required buff total was not reached
    PreconditionUnmet,
    /// A running aura in the same exclusivity group is at least as strong
    AuraOutclassed,
    /// `Unique` template already running
    UniqueActive,
}

/// What an application did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplyReport {
    /// Resolved magnitude used for the immediate dispatch
    pub magnitude: i32,
    /// Crit decision shared by every pulse of this application
    pub crit: Option<bool>,
    /// Damage hits landed by the immediate dispatch
    pub hits: usize,
    pub pulses: usize,
    pub children: usize,
    /// Buff touched by a StatBuff dispatch, if the store accepted it
    pub buff: Option<BuffHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(ApplyReport),
    Gated(GateReason),
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }

    pub fn report(&self) -> Option<&ApplyReport> {
        match self {
            ApplyOutcome::Applied(report) => Some(report),
            ApplyOutcome::Gated(_) => None,
        }
    }
}

struct DispatchResult {
    hits: usize,
    buff: Option<BuffHandle>,
}

/// Pending events, active instances and the damage log
pub struct EffectScheduler {
    queue: EventQueue,
    dots: ActiveTracker,
    auras: ActiveTracker,
    damage_log: VecDeque<DamageRecord>,
    damage_log_capacity: usize,
    damage_total: u64,
    target_policy: Box<dyn TargetPolicy>,
    crit: CritConstants,
    magnitude: MagnitudeConstants,
    max_cascade_depth: u8,
    dropped_events: u64,
}

impl fmt::Debug for EffectScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectScheduler")
            .field("pending", &self.queue.len())
            .field("active_dots", &self.dots.len())
            .field("active_auras", &self.auras.len())
            .field("damage_log", &self.damage_log.len())
            .field("dropped_events", &self.dropped_events)
            .finish()
    }
}

impl Default for EffectScheduler {
    fn default() -> Self {
        Self::new(&EffectConstants::default())
    }
}

impl EffectScheduler {
    pub fn new(constants: &EffectConstants) -> Self {
        let active = constants.scheduler.active_capacity;
        EffectScheduler {
            queue: EventQueue::new(constants.scheduler.queue_capacity),
            dots: ActiveTracker::new(active),
            auras: ActiveTracker::new(active),
            damage_log: VecDeque::with_capacity(constants.scheduler.damage_log_capacity),
            damage_log_capacity: constants.scheduler.damage_log_capacity.max(1),
            damage_total: 0,
            target_policy: Box::new(FirstLiving),
            crit: constants.crit.clone(),
            magnitude: constants.magnitude.clone(),
            max_cascade_depth: constants.scheduler.max_cascade_depth,
            dropped_events: 0,
        }
    }

    /// Replace how DamageOverTime hits pick their target
    pub fn set_target_policy(&mut self, policy: impl TargetPolicy + 'static) {
        self.target_policy = Box::new(policy);
    }

    /// Override every crit decision (test hook)
    pub fn set_forced_crit(&mut self, forced: Option<bool>) {
        self.crit.forced = forced;
    }

    /// Apply `template` at `now`
    pub fn apply(
        &mut self,
        templates: &TemplateRegistry,
        buffs: &mut BuffStore,
        world: &mut dyn CombatWorld,
        template: TemplateId,
        now: Millis,
    ) -> Result<ApplyOutcome, EffectError> {
        self.apply_at_depth(templates, buffs, world, template, now, 0)
    }

    fn apply_at_depth(
        &mut self,
        templates: &TemplateRegistry,
        buffs: &mut BuffStore,
        world: &mut dyn CombatWorld,
        id: TemplateId,
        now: Millis,
        depth: u8,
    ) -> Result<ApplyOutcome, EffectError> {
        let template = templates.get(id).ok_or(EffectError::UnknownTemplate(id))?;

        // Step 1: Precondition gate
        if let Some(pre) = template.precondition {
            let total = buffs.total_at(pre.buff_type, now);
            if total < pre.minimum.max(1) {
                tracing::debug!(template = %id, total, required = pre.minimum, "precondition unmet");
                return Ok(ApplyOutcome::Gated(GateReason::PreconditionUnmet));
            }
        }

        // Step 2: Magnitude
        let magnitude = self.resolve_magnitude(template, buffs, now);
        let pulse_magnitude = template
            .scale_by
            .filter(|s| s.snapshot)
            .map(|_| magnitude);

        // Step 3: Aura exclusivity
        if template.kind == EffectKind::Aura && template.exclusivity_group_mask != 0 {
            let conflicts = self.auras.conflicts(template.exclusivity_group_mask, now);
            if conflicts.iter().any(|r| r.magnitude >= magnitude) {
                tracing::debug!(template = %id, magnitude, "aura outclassed by its exclusivity group");
                return Ok(ApplyOutcome::Gated(GateReason::AuraOutclassed));
            }
            for weaker in conflicts {
                let cancelled = self
                    .queue
                    .cancel_where(weaker.template, |e| e.kind == EventKind::Pulse);
                self.auras.remove(weaker.template);
                tracing::debug!(replaced = %weaker.template, by = %id, cancelled, "aura replaced");
            }
        }

        // Step 4: Per-application crit
        let crit = (template.kind == EffectKind::DamageOverTime
            && template.crit_mode == CritMode::PerApplication)
            .then(|| {
                let sequence = self.queue.next_sequence() as u32;
                roll_crit(&self.crit, template, None, sequence, now)
            });

        // Step 5: Stacking against the running instance
        let mut pulse_times = Vec::new();
        if template.kind != EffectKind::StatBuff && template.duration > 0 {
            match self.stack(template, magnitude, now) {
                Some(times) => pulse_times = times,
                None => return Ok(ApplyOutcome::Gated(GateReason::UniqueActive)),
            }
        } else if template.is_periodic() {
            pulse_times = grid(now, now, now + template.duration, template.pulse_period);
        }

        // Step 6: Immediate side effect
        let sequence = self.queue.next_sequence();
        let dispatched = self.dispatch(template, magnitude, crit, sequence, now, buffs, world);

        // Step 7: Pulses
        let mut pulses = 0;
        for due in pulse_times {
            if self.enqueue(id, due, EventKind::Pulse, pulse_magnitude, crit) {
                pulses += 1;
            }
        }

        // Step 8: Children
        let mut children = 0;
        for child in &template.children {
            let child_depth = depth.saturating_add(1);
            if child_depth > self.max_cascade_depth {
                tracing::warn!(
                    parent = %id,
                    child = %child.template,
                    depth = child_depth,
                    "child cascade too deep; dropped"
                );
                continue;
            }
            let kind = EventKind::Child { depth: child_depth };
            if self.enqueue(child.template, now + child.delay, kind, None, None) {
                children += 1;
            }
        }

        Ok(ApplyOutcome::Applied(ApplyReport {
            magnitude,
            crit,
            hits: dispatched.hits,
            pulses,
            children,
            buff: dispatched.buff,
        }))
    }

    /// Update the active record and return the pulse times this apply adds
    ///
    /// `None` means a `Unique` collision.
    fn stack(
        &mut self,
        template: &EffectTemplate,
        magnitude: i32,
        now: Millis,
    ) -> Option<Vec<Millis>> {
        let id = template.id;
        let period = template.pulse_period;
        let rule = template.stack_rule();
        let tracker = match template.kind {
            EffectKind::Aura => &mut self.auras,
            _ => &mut self.dots,
        };
        let running = tracker.running(id, now).copied();

        let Some(mut record) = running else {
            let record = ActiveRecord {
                template: id,
                end_time: now + template.duration,
                last_apply_time: now,
                pulse_anchor: now,
                group_mask: template.exclusivity_group_mask,
                magnitude,
            };
            if !tracker.upsert(record) {
                tracing::warn!(template = %id, live = tracker.len(), "active record pool exhausted");
            }
            return Some(grid(now, now, record.end_time, period));
        };

        let times = match rule {
            StackRule::Unique => {
                tracing::debug!(template = %id, "unique effect already running");
                return None;
            }
            StackRule::Refresh => {
                let cancelled = self
                    .queue
                    .cancel_where(id, |e| e.kind == EventKind::Pulse);
                tracing::debug!(template = %id, cancelled, "refresh realigns pulses");
                record.end_time = now + template.duration;
                record.pulse_anchor = now;
                grid(now, now, record.end_time, period)
            }
            StackRule::Extend => {
                let old_end = record.end_time;
                record.end_time = old_end + template.duration;
                grid(record.pulse_anchor, old_end + 1, record.end_time, period)
            }
            StackRule::Add | StackRule::Multiply | StackRule::ReplaceIfStronger => {
                let own_end = now + template.duration;
                record.end_time = record.end_time.max(own_end);
                grid(now, now, own_end, period)
            }
        };
        record.last_apply_time = now;
        record.magnitude = record.magnitude.max(magnitude);

        let tracker = match template.kind {
            EffectKind::Aura => &mut self.auras,
            _ => &mut self.dots,
        };
        tracker.upsert(record);
        Some(times)
    }

    fn resolve_magnitude(&self, template: &EffectTemplate, buffs: &BuffStore, now: Millis) -> i32 {
        let Some(scale) = template.scale_by else {
            return template.magnitude;
        };
        let total = buffs.total_at(scale.buff_type, now);
        let factor = (100 + i64::from(scale.percent_per_point) * total).max(0);
        let scaled = i64::from(template.magnitude) * factor / 100;
        scaled.clamp(i64::from(self.magnitude.floor), i64::from(self.magnitude.cap)) as i32
    }

    /// Push onto the queue; a full queue is logged and counted, never fatal
    fn enqueue(
        &mut self,
        template: TemplateId,
        due: Millis,
        kind: EventKind,
        magnitude: Option<i32>,
        crit: Option<bool>,
    ) -> bool {
        match self.queue.push(template, due, kind, magnitude, crit) {
            Ok(_) => true,
            Err(err) => {
                self.dropped_events += 1;
                tracing::warn!(template = %template, due, error = %err, "scheduled event dropped");
                false
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn dispatch(
        &mut self,
        template: &EffectTemplate,
        magnitude: i32,
        crit: Option<bool>,
        sequence: u64,
        now: Millis,
        buffs: &mut BuffStore,
        world: &mut dyn CombatWorld,
    ) -> DispatchResult {
        match template.kind {
            EffectKind::StatBuff => {
                let buff = buffs.apply(
                    template.buff_type,
                    magnitude,
                    template.duration,
                    now,
                    template.stack_rule(),
                    template.snapshot,
                );
                DispatchResult { hits: 0, buff }
            }
            EffectKind::DamageOverTime => {
                let target = self.target_policy.select(world);
                let hits = match target {
                    Some(target) if magnitude > 0 => {
                        let crit = roll_crit(&self.crit, template, crit, sequence as u32, now);
                        self.hit(world, template, target, magnitude, crit, now)
                    }
                    _ => 0,
                };
                DispatchResult { hits, buff: None }
            }
            EffectKind::Aura => {
                let mut hits = 0;
                if magnitude > 0 {
                    for target in aura_targets(world, template.radius) {
                        let crit = roll_crit(&self.crit, template, None, target.0, now);
                        hits += self.hit(world, template, target, magnitude, crit, now);
                    }
                }
                DispatchResult { hits, buff: None }
            }
        }
    }

    fn hit(
        &mut self,
        world: &mut dyn CombatWorld,
        template: &EffectTemplate,
        target: EntityId,
        magnitude: i32,
        crit: bool,
        now: Millis,
    ) -> usize {
        let multiplier = self.crit.multiplier_percent;
        match land_hit(world, template, target, magnitude, crit, multiplier, now) {
            Some(record) => {
                if self.damage_log.len() >= self.damage_log_capacity {
                    self.damage_log.pop_front();
                }
                self.damage_log.push_back(record);
                self.damage_total += 1;
                1
            }
            None => 0,
        }
    }

    /// Drain every event due at or before `now`; returns how many ran
    pub fn advance_time(
        &mut self,
        templates: &TemplateRegistry,
        buffs: &mut BuffStore,
        world: &mut dyn CombatWorld,
        now: Millis,
    ) -> usize {
        let mut processed = 0;
        while let Some(event) = self.queue.pop_due(now) {
            processed += 1;
            match event.kind {
                EventKind::Pulse => self.pulse(templates, buffs, world, event),
                EventKind::Child { depth } => {
                    let result =
                        self.apply_at_depth(templates, buffs, world, event.template, event.due, depth);
                    if let Err(err) = result {
                        tracing::warn!(template = %event.template, error = %err, "child effect failed");
                    }
                }
            }
        }
        self.dots.prune(now);
        self.auras.prune(now);
        processed
    }

    fn pulse(
        &mut self,
        templates: &TemplateRegistry,
        buffs: &mut BuffStore,
        world: &mut dyn CombatWorld,
        event: ScheduledEvent,
    ) {
        let Some(template) = templates.get(event.template) else {
            tracing::warn!(template = %event.template, "pulse for unknown template");
            return;
        };

        if template.kind == EffectKind::DamageOverTime && template.stack_rule() == StackRule::Refresh {
            let stale = self
                .dots
                .get(event.template)
                .is_some_and(|r| event.due < r.last_apply_time + template.pulse_period);
            if stale {
                tracing::debug!(template = %event.template, due = event.due, "stale pulse skipped");
                return;
            }
        }

        let magnitude = event
            .magnitude
            .unwrap_or_else(|| self.resolve_magnitude(template, buffs, event.due));
        self.dispatch(
            template,
            magnitude,
            event.crit,
            event.sequence,
            event.due,
            buffs,
            world,
        );
    }

    /// Drop every pending event for `template`; returns how many went
    pub fn cancel(&mut self, template: TemplateId) -> usize {
        self.queue.cancel_where(template, |_| true)
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    /// Due time of the earliest pending event
    pub fn next_due(&self) -> Option<Millis> {
        self.queue.peek().map(|e| e.due)
    }

    pub fn active_dot(&self, template: TemplateId) -> Option<&ActiveRecord> {
        self.dots.get(template)
    }

    pub fn active_aura(&self, template: TemplateId) -> Option<&ActiveRecord> {
        self.auras.get(template)
    }

    pub fn active_auras(&self) -> impl Iterator<Item = &ActiveRecord> {
        self.auras.iter()
    }

    /// Most recent hits, oldest first; older hits fall off once the log is full
    pub fn damage_log(&self) -> &VecDeque<DamageRecord> {
        &self.damage_log
    }

    /// Hits landed since construction, including those no longer in the log
    pub fn damage_total(&self) -> u64 {
        self.damage_total
    }

    /// Logged hits landed after the log stood at `cursor` (a past [`damage_total`])
    ///
    /// [`damage_total`]: EffectScheduler::damage_total
    pub fn damage_since(&self, cursor: u64) -> impl Iterator<Item = &DamageRecord> {
        let newer = self.damage_total.saturating_sub(cursor);
        let kept = usize::try_from(newer).unwrap_or(usize::MAX).min(self.damage_log.len());
        self.damage_log.iter().skip(self.damage_log.len() - kept)
    }

    pub fn clear_damage_log(&mut self) {
        self.damage_log.clear();
    }

    /// Events lost to a full queue since construction
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Forget all pending events, records and damage history
    pub fn reset(&mut self) {
        self.queue.clear();
        self.dots.clear();
        self.auras.clear();
        self.damage_log.clear();
        self.damage_total = 0;
        self.dropped_events = 0;
    }
}

/// Points `anchor + k * period` with `from <= t <= until`, skipping `anchor` itself
fn grid(anchor: Millis, from: Millis, until: Millis, period: Millis) -> Vec<Millis> {
    if period == 0 {
        return Vec::new();
    }
    let mut k = if from > anchor {
        (from - anchor).div_ceil(period)
    } else {
        1
    };
    let mut times = Vec::new();
    loop {
        let t = anchor + k * period;
        if t > until {
            break;
        }
        if t >= from {
            times.push(t);
        }
        k += 1;
    }
    times
}
