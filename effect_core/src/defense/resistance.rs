//! Resistance - percentage mitigation per damage type
//!
//! Formula:
//! - effective_resist = clamp(resistance, min_value, max_cap)
//! - damage_taken = damage * (100 - effective_resist) / 100
//!
//! Negative resistance amplifies damage.

use super::Mitigation;
use crate::types::{DamageType, EntityId};
use std::collections::HashMap;

/// Resistance may not exceed immunity
pub const RESIST_MAX_CAP: i32 = 100;
/// Resistance floor (-200% = triple damage)
pub const RESIST_MIN_VALUE: i32 = -200;

/// Calculate damage after resistance mitigation
///
/// # Arguments
/// * `damage` - The incoming damage
/// * `resistance` - The defender's resistance percentage (can be negative)
///
/// # Returns
/// The damage that gets through, never negative
pub fn calculate_resistance_mitigation(damage: i32, resistance: i32) -> i32 {
    if damage <= 0 {
        return 0;
    }
    let effective = resistance.clamp(RESIST_MIN_VALUE, RESIST_MAX_CAP);
    let through = i64::from(damage) * i64::from(100 - effective) / 100;
    through.clamp(0, i64::from(i32::MAX)) as i32
}

/// Check if resistance is capped
pub fn is_resistance_capped(resistance: i32) -> bool {
    resistance >= RESIST_MAX_CAP
}

/// Per-entity resistance table
///
/// Entities without an entry take full damage.
#[derive(Debug, Clone, Default)]
pub struct ResistanceTable {
    resistances: HashMap<(EntityId, DamageType), i32>,
}

impl ResistanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, entity: EntityId, damage_type: DamageType, resistance: i32) {
        self.resistances.insert((entity, damage_type), resistance);
    }

    pub fn with(mut self, entity: EntityId, damage_type: DamageType, resistance: i32) -> Self {
        self.set(entity, damage_type, resistance);
        self
    }

    pub fn resistance(&self, entity: EntityId, damage_type: DamageType) -> i32 {
        self.resistances
            .get(&(entity, damage_type))
            .copied()
            .unwrap_or(0)
    }
}

impl Mitigation for ResistanceTable {
    fn apply_mitigation(&self, target: EntityId, raw: i32, damage_type: DamageType) -> i32 {
        calculate_resistance_mitigation(raw, self.resistance(target, damage_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_resistance() {
        assert_eq!(calculate_resistance_mitigation(100, 50), 50);
    }

    #[test]
    fn test_negative_resistance() {
        // -50% resistance = 50% extra damage
        assert_eq!(calculate_resistance_mitigation(100, -50), 150);
        // Clamped at the floor
        assert_eq!(calculate_resistance_mitigation(100, -500), 300);
    }

    #[test]
    fn test_capped_resistance() {
        assert_eq!(calculate_resistance_mitigation(100, 100), 0);
        assert_eq!(calculate_resistance_mitigation(100, 140), 0);
        assert!(is_resistance_capped(100));
        assert!(!is_resistance_capped(99));
    }

    #[test]
    fn test_table_lookup() {
        let table = ResistanceTable::new().with(EntityId(1), DamageType::Fire, 25);
        assert_eq!(table.apply_mitigation(EntityId(1), 40, DamageType::Fire), 30);
        assert_eq!(table.apply_mitigation(EntityId(1), 40, DamageType::Cold), 40);
        assert_eq!(table.apply_mitigation(EntityId(2), 40, DamageType::Fire), 40);
    }
}
