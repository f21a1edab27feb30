//! Combat world - the entities effects land on

use crate::defense::{Mitigation, NoMitigation};
use crate::types::{DamageType, EntityId};
use glam::Vec2;
use std::fmt;

/// Game-side view of combat entities consumed by the scheduler
pub trait CombatWorld {
    /// Living entities in a stable iteration order
    fn living(&self) -> Vec<EntityId>;

    fn position(&self, id: EntityId) -> Option<Vec2>;

    /// Point auras are centered on when they pulse
    fn aura_anchor(&self) -> Vec2;

    fn apply_mitigation(&self, target: EntityId, raw: i32, damage_type: DamageType) -> i32;

    fn health(&self, id: EntityId) -> Option<i32>;

    /// Set health; reaching zero kills the entity
    fn set_health(&mut self, id: EntityId, health: i32);
}

/// Chooses the target of a DamageOverTime hit
pub trait TargetPolicy {
    fn select(&self, world: &dyn CombatWorld) -> Option<EntityId>;
}

/// First living entity in iteration order
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstLiving;

impl TargetPolicy for FirstLiving {
    fn select(&self, world: &dyn CombatWorld) -> Option<EntityId> {
        world.living().into_iter().next()
    }
}

/// Always the same entity, while it lives
#[derive(Debug, Clone, Copy)]
pub struct BoundTarget(pub EntityId);

impl TargetPolicy for BoundTarget {
    fn select(&self, world: &dyn CombatWorld) -> Option<EntityId> {
        world.living().into_iter().find(|id| *id == self.0)
    }
}

/// An entity on the battlefield
#[derive(Debug, Clone, PartialEq)]
pub struct Combatant {
    pub id: EntityId,
    pub position: Vec2,
    pub health: i32,
    pub max_health: i32,
    pub alive: bool,
}

impl Combatant {
    pub fn new(id: EntityId, position: Vec2, health: i32) -> Self {
        Combatant {
            id,
            position,
            health,
            max_health: health,
            alive: health > 0,
        }
    }
}

/// In-memory [`CombatWorld`] with pluggable mitigation
pub struct Battlefield {
    combatants: Vec<Combatant>,
    anchor: Vec2,
    mitigation: Box<dyn Mitigation>,
}

impl fmt::Debug for Battlefield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Battlefield")
            .field("combatants", &self.combatants)
            .field("anchor", &self.anchor)
            .finish()
    }
}

impl Default for Battlefield {
    fn default() -> Self {
        Self::new()
    }
}

impl Battlefield {
    pub fn new() -> Self {
        Battlefield {
            combatants: Vec::new(),
            anchor: Vec2::ZERO,
            mitigation: Box::new(NoMitigation),
        }
    }

    pub fn with_mitigation(mut self, mitigation: impl Mitigation + 'static) -> Self {
        self.mitigation = Box::new(mitigation);
        self
    }

    pub fn with_anchor(mut self, anchor: Vec2) -> Self {
        self.anchor = anchor;
        self
    }

    /// Add an entity; spawning an existing id replaces it
    pub fn spawn(&mut self, id: EntityId, position: Vec2, health: i32) {
        let combatant = Combatant::new(id, position, health);
        match self.combatants.iter_mut().find(|c| c.id == id) {
            Some(existing) => *existing = combatant,
            None => self.combatants.push(combatant),
        }
    }

    pub fn move_to(&mut self, id: EntityId, position: Vec2) -> bool {
        match self.combatant_mut(id) {
            Some(c) => {
                c.position = position;
                true
            }
            None => false,
        }
    }

    pub fn set_anchor(&mut self, anchor: Vec2) {
        self.anchor = anchor;
    }

    pub fn combatant(&self, id: EntityId) -> Option<&Combatant> {
        self.combatants.iter().find(|c| c.id == id)
    }

    fn combatant_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.combatants.iter_mut().find(|c| c.id == id)
    }

    pub fn combatants(&self) -> &[Combatant] {
        &self.combatants
    }
}

impl CombatWorld for Battlefield {
    fn living(&self) -> Vec<EntityId> {
        self.combatants
            .iter()
            .filter(|c| c.alive)
            .map(|c| c.id)
            .collect()
    }

    fn position(&self, id: EntityId) -> Option<Vec2> {
        self.combatant(id).map(|c| c.position)
    }

    fn aura_anchor(&self) -> Vec2 {
        self.anchor
    }

    fn apply_mitigation(&self, target: EntityId, raw: i32, damage_type: DamageType) -> i32 {
        self.mitigation.apply_mitigation(target, raw, damage_type)
    }

    fn health(&self, id: EntityId) -> Option<i32> {
        self.combatant(id).map(|c| c.health)
    }

    fn set_health(&mut self, id: EntityId, health: i32) {
        if let Some(c) = self.combatant_mut(id) {
            c.health = health.max(0);
            if c.health == 0 {
                c.alive = false;
            }
        }
    }
}
