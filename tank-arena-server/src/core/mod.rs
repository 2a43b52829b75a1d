//! Core numeric primitives.
//!
//! Vectors, the epsilon comparison policy, and the seeded RNG used for
//! spawn placement. Everything above this layer compares coordinates
//! through [`numeric`] rather than with `==`.

pub mod numeric;
pub mod vec2;
pub mod rng;

// Re-export core types
pub use numeric::{EPSILON, SPLIT_MARGIN, approx_eq, approx_zero, to_event_fixed};
pub use vec2::{Vec2, Pos2, centroid};
pub use rng::{DeterministicRng, derive_match_seed};
