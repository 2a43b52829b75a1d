//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ for fast, reproducible randomness. Spawn placement is
//! the only consumer, so a match with a fixed seed always lays out tanks
//! the same way.

use serde::{Serialize, Deserialize};
use sha2::{Sha256, Digest};

use super::vec2::Vec2;

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Example
///
/// ```
/// use tank_arena::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a uniform f64 in [0, 1).
    #[inline]
    pub fn next_f64(&mut self) -> f64 {
        // 53 significant bits
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform f64 in [min, max).
    #[inline]
    pub fn next_f64_range(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            return min;
        }
        min + self.next_f64() * (max - min)
    }

    /// Generate a random point inside the rectangle `[min, max)`.
    pub fn random_point_in(&mut self, min: Vec2, max: Vec2) -> Vec2 {
        let x = self.next_f64_range(min.x, max.x);
        let y = self.next_f64_range(min.y, max.y);
        Vec2::new(x, y)
    }
}

/// SplitMix64 for seed initialization.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive a placement seed from the match id and the participating actors.
///
/// Actor names are hashed in the order given; callers pass them in
/// registration order so a rerun with the same roster reproduces spawns.
pub fn derive_match_seed(match_id: &[u8; 16], actor_names: &[&str]) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"TANK_ARENA_SEED_V1");
    hasher.update(match_id);
    for name in actor_names {
        hasher.update((name.len() as u32).to_le_bytes());
        hasher.update(name.as_bytes());
    }

    let hash = hasher.finalize();
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(seed)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_known_values() {
        // These values must never change, spawn layouts depend on them.
        let mut rng = DeterministicRng::new(42);
        assert_eq!(rng.next_u64(), 16629283624882167704);
        assert_eq!(rng.next_u64(), 1420492921613871959);
        assert_eq!(rng.next_u64(), 9768315062676884790);
    }

    #[test]
    fn test_next_f64_range() {
        let mut rng = DeterministicRng::new(9999);

        for _ in 0..1000 {
            let val = rng.next_f64_range(-5.0, 5.0);
            assert!((-5.0..5.0).contains(&val));
        }
        assert_eq!(rng.next_f64_range(3.0, 3.0), 3.0);
    }

    #[test]
    fn test_random_point_in() {
        let mut rng = DeterministicRng::new(7777);
        let min = Vec2::new(1.0, 2.0);
        let max = Vec2::new(4.0, 8.0);

        for _ in 0..100 {
            let p = rng.random_point_in(min, max);
            assert!(p.x >= min.x && p.x < max.x);
            assert!(p.y >= min.y && p.y < max.y);
        }
    }

    #[test]
    fn test_derive_match_seed() {
        let match_id = [1u8; 16];

        let seed1 = derive_match_seed(&match_id, &["alpha", "bravo"]);
        let seed2 = derive_match_seed(&match_id, &["alpha", "bravo"]);
        assert_eq!(seed1, seed2);

        let seed3 = derive_match_seed(&match_id, &["bravo", "alpha"]);
        assert_ne!(seed1, seed3);

        // Length prefix keeps "ab"+"c" distinct from "a"+"bc"
        assert_ne!(
            derive_match_seed(&match_id, &["ab", "c"]),
            derive_match_seed(&match_id, &["a", "bc"]),
        );
    }
}
