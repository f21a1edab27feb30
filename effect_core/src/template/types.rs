use crate::types::{BuffType, CritMode, DamageType, EffectKind, Millis, StackRule, TemplateId};
use serde::{Deserialize, Serialize};

/// Maximum number of delayed children a template may carry
pub const MAX_CHILDREN: usize = 4;

/// Scale magnitude by the live total of another buff type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleBy {
    pub buff_type: BuffType,
    /// Percent added per point of the referenced buff total
    pub percent_per_point: i32,
    /// Freeze the scaled magnitude for every pulse of one application
    pub snapshot: bool,
}

/// Minimum buff total required before the effect may land
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Precondition {
    pub buff_type: BuffType,
    /// Values below 1 are treated as 1
    pub minimum: i64,
}

/// Effect applied `delay` after its parent lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEffect {
    pub template: TemplateId,
    pub delay: Millis,
}

/// Immutable description of a gameplay effect
///
/// Build one with [`EffectTemplate::stat_buff`], [`EffectTemplate::damage_over_time`]
/// or [`EffectTemplate::aura`] and register it; the registry assigns `id` and
/// fills unset optional fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectTemplate {
    pub id: TemplateId,
    pub name: String,
    pub kind: EffectKind,
    /// Buff type modified by StatBuff effects
    pub buff_type: BuffType,
    pub magnitude: i32,
    /// 0 = instantaneous
    pub duration: Millis,
    pub stack_rule: Option<StackRule>,
    /// Buff store snapshot flag for StatBuff effects
    pub snapshot: bool,
    pub scale_by: Option<ScaleBy>,
    pub precondition: Option<Precondition>,
    /// 0 = no periodic re-application
    pub pulse_period: Millis,
    pub children: Vec<ChildEffect>,
    pub damage_type: DamageType,
    pub crit_mode: CritMode,
    /// Percent chance in `[0, 100]`
    pub crit_chance: u8,
    pub radius: f32,
    pub exclusivity_group_mask: u32,
    pub debuff: Option<bool>,
}

impl EffectTemplate {
    fn base(name: impl Into<String>, kind: EffectKind, magnitude: i32, duration: Millis) -> Self {
        EffectTemplate {
            id: TemplateId(0),
            name: name.into(),
            kind,
            buff_type: BuffType(0),
            magnitude,
            duration,
            stack_rule: None,
            snapshot: false,
            scale_by: None,
            precondition: None,
            pulse_period: 0,
            children: Vec::new(),
            damage_type: DamageType::Physical,
            crit_mode: CritMode::PerPulse,
            crit_chance: 0,
            radius: 0.0,
            exclusivity_group_mask: 0,
            debuff: None,
        }
    }

    pub fn stat_buff(
        name: impl Into<String>,
        buff_type: BuffType,
        magnitude: i32,
        duration: Millis,
    ) -> Self {
        let mut template = Self::base(name, EffectKind::StatBuff, magnitude, duration);
        template.buff_type = buff_type;
        template
    }

    pub fn damage_over_time(name: impl Into<String>, magnitude: i32, duration: Millis) -> Self {
        Self::base(name, EffectKind::DamageOverTime, magnitude, duration)
    }

    pub fn aura(name: impl Into<String>, magnitude: i32, duration: Millis, radius: f32) -> Self {
        let mut template = Self::base(name, EffectKind::Aura, magnitude, duration);
        template.radius = radius;
        template
    }

    pub fn with_stack_rule(mut self, rule: StackRule) -> Self {
        self.stack_rule = Some(rule);
        self
    }

    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_scale_by(mut self, buff_type: BuffType, percent_per_point: i32, snapshot: bool) -> Self {
        self.scale_by = Some(ScaleBy {
            buff_type,
            percent_per_point,
            snapshot,
        });
        self
    }

    pub fn with_precondition(mut self, buff_type: BuffType, minimum: i64) -> Self {
        self.precondition = Some(Precondition { buff_type, minimum });
        self
    }

    pub fn with_pulse_period(mut self, period: Millis) -> Self {
        self.pulse_period = period;
        self
    }

    pub fn with_child(mut self, template: TemplateId, delay: Millis) -> Self {
        self.children.push(ChildEffect { template, delay });
        self
    }

    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    pub fn with_crit(mut self, mode: CritMode, chance: u8) -> Self {
        self.crit_mode = mode;
        self.crit_chance = chance;
        self
    }

    pub fn with_group_mask(mut self, mask: u32) -> Self {
        self.exclusivity_group_mask = mask;
        self
    }

    pub fn with_debuff(mut self, debuff: bool) -> Self {
        self.debuff = Some(debuff);
        self
    }

    /// Stacking rule after registration defaults have been applied
    pub fn stack_rule(&self) -> StackRule {
        self.stack_rule.unwrap_or(StackRule::Add)
    }

    /// Whether the effect counts as harmful to its target
    pub fn is_debuff(&self) -> bool {
        self.debuff.unwrap_or(false) || self.kind == EffectKind::DamageOverTime
    }

    /// Whether pulses get scheduled for each application
    pub fn is_periodic(&self) -> bool {
        self.pulse_period > 0 && self.duration > 0
    }
}
