//! Deterministic RNG seeding with ChaCha8.
//!
//! Every stochastic component takes its randomness from a seeded
//! generator derived here. Same seed -> same trajectory, always.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// RNG for one registry slot, derived from `(global_seed + slot_index)`.
pub fn slot_rng(global_seed: u64, slot_index: u64) -> ChaCha8Rng {
    let combined = global_seed.wrapping_add(slot_index);
    ChaCha8Rng::seed_from_u64(combined)
}

/// RNG for one sequence execution. Kept in a separate stream family
/// from the slot RNGs so run draws never alias ECU state draws.
pub fn run_rng(global_seed: u64, run_index: u64) -> ChaCha8Rng {
    let combined = global_seed.rotate_left(32).wrapping_add(run_index);
    ChaCha8Rng::seed_from_u64(combined)
}
