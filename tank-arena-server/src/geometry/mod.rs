//! Geometry Module
//!
//! Shapes and the exact intersection/enclosure math behind collisions.
//!
//! ## Module Structure
//!
//! - `aabb`: Axis-aligned bounding rectangle
//! - `line`: Segment type and segment-vs-segment intersection
//! - `polygon`: Closed polygon and rectangle factories
//! - `multipart`: Rigid composite with a base part
//! - `shape`: `Collidable` trait, shared algorithms, `Shape` enum

pub mod aabb;
pub mod line;
pub mod polygon;
pub mod multipart;
pub mod shape;

// Re-export key types
pub use aabb::AaRect;
pub use line::Line;
pub use polygon::Polygon;
pub use multipart::MultiPart;
pub use shape::{Collidable, GeometryError, Shape, ShapeKind, collides};
