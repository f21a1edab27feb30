//! Deterministic hashing used in place of an RNG
//!
//! Crit and proc decisions must replay identically for the same inputs, so
//! every roll is a pure function of the values that identify it.

/// Golden-ratio style combine of two 32-bit values
pub fn mix32(a: u32, b: u32) -> u32 {
    a ^ b
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(a << 6)
        .wrapping_add(a >> 2)
}

/// 64-bit variant of [`mix32`], used for cycle signatures
pub fn mix64(a: u64, b: u64) -> u64 {
    a ^ b
        .wrapping_add(0x9e37_79b9_7f4a_7c15)
        .wrapping_add(a << 6)
        .wrapping_add(a >> 2)
}

/// Hash three components into a percentile in `[0, 100)`
pub fn hash_to_pct(a: u32, b: u32, c: u32) -> u32 {
    let mut x = a.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    x ^= b
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(x << 6)
        .wrapping_add(x >> 2);
    x ^= c
        .wrapping_add(0x85eb_ca6b)
        .wrapping_add(x << 13)
        .wrapping_add(x >> 7);
    x % 100
}

/// Roll a percentage chance from a precomputed salt
///
/// `chance` is clamped to `[0, 100]`; 100 always passes, 0 never does.
pub fn roll_percent(chance: u32, salt: u32) -> bool {
    let chance = chance.min(100);
    mix32(salt, 0xa5a5_a5a5) % 100 < chance
}
