//! Defense - mitigation applied to effect damage

mod resistance;

pub use resistance::{
    calculate_resistance_mitigation, is_resistance_capped, ResistanceTable, RESIST_MAX_CAP,
    RESIST_MIN_VALUE,
};

use crate::types::{DamageType, EntityId};

/// Turns raw effect damage into the amount actually taken
///
/// The engine treats the result as opaque: it is clamped at zero and
/// subtracted from the target's health.
pub trait Mitigation {
    fn apply_mitigation(&self, target: EntityId, raw: i32, damage_type: DamageType) -> i32;
}

/// Passes damage through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMitigation;

impl Mitigation for NoMitigation {
    fn apply_mitigation(&self, _target: EntityId, raw: i32, _damage_type: DamageType) -> i32 {
        raw
    }
}
