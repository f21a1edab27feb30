//! Damage dispatch - land a resolved magnitude on world entities

use crate::config::CritConstants;
use crate::hash::hash_to_pct;
use crate::template::EffectTemplate;
use crate::types::{DamageType, EntityId, Millis, TemplateId};
use crate::world::CombatWorld;
use serde::{Deserialize, Serialize};

/// One hit landed by a DamageOverTime or Aura dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRecord {
    pub time: Millis,
    pub template: TemplateId,
    pub target: EntityId,
    pub damage_type: DamageType,
    pub crit: bool,
    /// Damage before mitigation, crit multiplier included
    pub raw: i32,
    /// Damage after mitigation
    pub dealt: i32,
    /// Portion of `dealt` beyond the target's remaining health
    pub overkill: i32,
}

/// Decide a crit from the hash of `(template, salt, now)`
///
/// An explicit decision wins, then the forced hook, then the hash.
pub fn roll_crit(
    crit: &CritConstants,
    template: &EffectTemplate,
    decided: Option<bool>,
    salt: u32,
    now: Millis,
) -> bool {
    if let Some(decided) = decided {
        return decided;
    }
    if let Some(forced) = crit.forced {
        return forced;
    }
    if template.crit_chance == 0 {
        return false;
    }
    hash_to_pct(template.id.0, salt, now as u32) < u32::from(template.crit_chance)
}

/// Living entities inside the aura's radius around the world anchor
pub fn aura_targets(world: &dyn CombatWorld, radius: f32) -> Vec<EntityId> {
    let anchor = world.aura_anchor();
    let reach = radius * radius;
    world
        .living()
        .into_iter()
        .filter(|id| {
            world
                .position(*id)
                .is_some_and(|pos| pos.distance_squared(anchor) <= reach)
        })
        .collect()
}

/// Resolve a single hit against `target`
///
/// 1. Apply the crit multiplier to the raw magnitude
/// 2. Run the result through the world's mitigation
/// 3. Subtract from health, clamped at zero
pub fn land_hit(
    world: &mut dyn CombatWorld,
    template: &EffectTemplate,
    target: EntityId,
    magnitude: i32,
    crit: bool,
    multiplier_percent: i32,
    now: Millis,
) -> Option<DamageRecord> {
    let health = world.health(target)?;

    // Step 1: Crit
    let raw = if crit {
        let boosted = i64::from(magnitude) * i64::from(multiplier_percent) / 100;
        boosted.clamp(0, i64::from(i32::MAX)) as i32
    } else {
        magnitude
    };

    // Step 2: Mitigation
    let dealt = world
        .apply_mitigation(target, raw, template.damage_type)
        .max(0);

    // Step 3: Health
    let overkill = (dealt - health).max(0);
    world.set_health(target, (health - dealt).max(0));

    Some(DamageRecord {
        time: now,
        template: template.id,
        target,
        damage_type: template.damage_type,
        crit,
        raw,
        dealt,
        overkill,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defense::ResistanceTable;
    use crate::types::CritMode;
    use crate::world::Battlefield;
    use glam::Vec2;

    fn burn() -> EffectTemplate {
        EffectTemplate::damage_over_time("burn", 10, 1000).with_damage_type(DamageType::Fire)
    }

    #[test]
    fn test_land_hit_with_mitigation() {
        let table = ResistanceTable::new().with(EntityId(1), DamageType::Fire, 50);
        let mut world = Battlefield::new().with_mitigation(table);
        world.spawn(EntityId(1), Vec2::ZERO, 100);

        let record = land_hit(&mut world, &burn(), EntityId(1), 10, true, 150, 5).unwrap();
        assert_eq!(record.raw, 15);
        assert_eq!(record.dealt, 7);
        assert_eq!(record.overkill, 0);
        assert_eq!(world.health(EntityId(1)), Some(93));
    }

    #[test]
    fn test_overkill_clamps_health() {
        let mut world = Battlefield::new();
        world.spawn(EntityId(1), Vec2::ZERO, 4);
        let record = land_hit(&mut world, &burn(), EntityId(1), 10, false, 150, 0).unwrap();
        assert_eq!(record.overkill, 6);
        assert_eq!(world.health(EntityId(1)), Some(0));
        assert!(world.living().is_empty());
        assert!(land_hit(&mut world, &burn(), EntityId(7), 10, false, 150, 0).is_none());
    }

    #[test]
    fn test_aura_targets_radius() {
        let mut world = Battlefield::new();
        world.spawn(EntityId(1), Vec2::new(1.0, 0.0), 10);
        world.spawn(EntityId(2), Vec2::new(3.0, 0.0), 10);
        world.spawn(EntityId(3), Vec2::new(0.0, 2.0), 10);
        assert_eq!(aura_targets(&world, 2.0), vec![EntityId(1), EntityId(3)]);
        world.set_anchor(Vec2::new(3.0, 0.0));
        assert_eq!(aura_targets(&world, 2.0), vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn test_roll_crit_precedence() {
        let mut constants = CritConstants::default();
        let never = burn();
        assert!(!roll_crit(&constants, &never, None, 0, 0));
        assert!(roll_crit(&constants, &never, Some(true), 0, 0));

        constants.forced = Some(true);
        assert!(roll_crit(&constants, &never, None, 0, 0));
        assert!(!roll_crit(&constants, &never, Some(false), 0, 0));

        let always = burn().with_crit(CritMode::PerPulse, 100);
        assert!(roll_crit(&CritConstants::default(), &always, None, 3, 9));
    }
}
