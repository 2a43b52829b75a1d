//! Spatial Index
//!
//! Broad-phase collision candidates. The quadtree returns a superset of
//! colliding shapes; exact filtering is done with the geometry predicate.

pub mod quadtree;

pub use quadtree::{QuadTree, QuadTreeConfig, IndexError};
