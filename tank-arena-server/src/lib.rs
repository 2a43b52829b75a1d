//! # Tank Arena Server
//!
//! Authoritative simulation core for a tank combat arena: exact polygon
//! collisions, a quadtree broad phase, a fixed-rate tick loop driven by
//! actor requests, and a replayable JSON event log.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     TANK ARENA SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Numeric primitives                        │
//! │  ├── numeric.rs  - Epsilon comparisons, angles, rounding     │
//! │  ├── vec2.rs     - 2D vector                                 │
//! │  └── rng.rs      - Seeded Xorshift128+ for spawn placement   │
//! │                                                              │
//! │  geometry/       - Collidable shapes                         │
//! │  ├── line.rs     - Segments and their intersections          │
//! │  ├── polygon.rs  - Closed polygons, rectangles               │
//! │  ├── multipart.rs- Rigid composites with a base part         │
//! │  └── shape.rs    - Collidable trait, Shape enum              │
//! │                                                              │
//! │  index/          - Broad phase                               │
//! │  └── quadtree.rs - Counted quadtree over element ids         │
//! │                                                              │
//! │  game/           - Simulation                                │
//! │  ├── map.rs      - World arena and block grid                │
//! │  ├── tick.rs     - Requests, movement, removal sweep         │
//! │  ├── session.rs  - Pacing, actor tasks, spectators           │
//! │  └── replay.rs   - JSON array replay log                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership
//!
//! The simulation loop is the only mutator. Elements live in an arena keyed
//! by [`ElementId`]; the quadtree holds shape snapshots under the same ids.
//! Actors never touch the world: they submit requests over a channel and
//! receive answers through one-shot replies.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod geometry;
pub mod index;
pub mod game;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::DeterministicRng;
pub use core::numeric::EPSILON;
pub use geometry::{Collidable, Shape};
pub use index::QuadTree;
pub use game::element::ElementId;
pub use game::map::GameMap;
pub use game::tick::{Simulation, SimulationConfig};
pub use game::session::GameSession;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default tick budget in milliseconds
pub const TICK_MS: u64 = 16;
