//! Collidable Shapes
//!
//! The [`Collidable`] trait is the capability set every shape kind shares.
//! Each kind supplies its boundary (points and edges), an interior test and a
//! point mapper; the trait builds transforms on top of those, and the free
//! functions in this module build the pairwise collision algorithms.
//!
//! ## Collision Predicate
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  collides(A, B) =   AABB(A) ∩ AABB(B) ≠ ∅                    │
//! │                 ∧ ( edges(A) × edges(B) cross                │
//! │                   ∨ some point of B strictly inside A        │
//! │                   ∨ some point of A strictly inside B )      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Checking enclosure in both directions makes the predicate symmetric for
//! every pairing, including a small shape sitting wholly inside a larger one.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::numeric::to_rad;
use crate::core::vec2::{centroid, Vec2};

use super::aabb::AaRect;
use super::line::Line;
use super::multipart::MultiPart;
use super::polygon::Polygon;

/// Concrete kind of a shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    /// Closed polygon (rectangles included)
    Polygon,
    /// Rigid assembly of polygons with a designated base part
    MultiPart,
    /// Open segment
    Line,
}

/// Errors from shape construction and replacement.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// `become_equivalent_to` across different kinds
    #[error("shape type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// Kind of the shape being replaced
        expected: ShapeKind,
        /// Kind of the replacement
        found: ShapeKind,
    },
    /// Polygon built from fewer than three points
    #[error("polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    /// Composite built without parts
    #[error("multi-part shape needs at least one part")]
    EmptyComposite,
    /// Base index outside the part list
    #[error("base part {index} out of range for {len} parts")]
    BaseOutOfRange {
        /// Requested base index
        index: usize,
        /// Number of parts
        len: usize,
    },
}

// =============================================================================
// COLLIDABLE TRAIT
// =============================================================================

/// Capability set shared by every shape kind.
pub trait Collidable {
    /// Concrete kind tag.
    fn kind(&self) -> ShapeKind;

    /// Current boundary points in order.
    fn points(&self) -> Vec<Vec2>;

    /// Boundary as segments.
    fn edges(&self) -> Vec<Line>;

    /// Point lies strictly inside (boundary points are not inside).
    fn contains_point(&self, point: Vec2) -> bool;

    /// Apply `f` to every stored point.
    fn map_points(&mut self, f: &mut dyn FnMut(Vec2) -> Vec2);

    /// Cumulative rotation in radians.
    fn angle(&self) -> f64;

    /// Overwrite the tracked rotation without moving points.
    fn set_angle(&mut self, rad: f64);

    /// Pivot used when no explicit pivot is given.
    fn rotation_center(&self) -> Vec2 {
        centroid(&self.points())
    }

    /// Tight axis-aligned bound.
    fn bounding_rect(&self) -> AaRect {
        AaRect::enclosing(&self.points())
    }

    /// Crossing points of the two boundaries.
    fn intersection_points(&self, other: &dyn Collidable) -> Vec<Vec2> {
        let theirs = other.edges();
        let mut found = Vec::new();
        for mine in self.edges() {
            for edge in &theirs {
                for p in mine.segment_intersections(edge) {
                    push_unique(&mut found, p);
                }
            }
        }
        found
    }

    /// Points of `other` strictly inside this shape.
    fn enclosed_points(&self, other: &dyn Collidable) -> Vec<Vec2> {
        other
            .points()
            .into_iter()
            .filter(|p| self.contains_point(*p))
            .collect()
    }

    /// Every point of `other` is strictly inside this shape.
    fn encloses(&self, other: &dyn Collidable) -> bool {
        let theirs = other.points();
        !theirs.is_empty() && theirs.iter().all(|p| self.contains_point(*p))
    }

    /// Boundaries cross somewhere.
    #[inline]
    fn intersects(&self, other: &dyn Collidable) -> bool {
        !self.intersection_points(other).is_empty()
    }

    /// Symmetric collision test, see [`collides`].
    fn collides(&self, other: &dyn Collidable) -> bool
    where
        Self: Sized,
    {
        collides(self, other)
    }

    /// Crossing points plus enclosed points, see [`collision_points`].
    fn collision_points(&self, other: &dyn Collidable) -> Vec<Vec2>
    where
        Self: Sized,
    {
        collision_points(self, other)
    }

    // -------------------------------------------------------------------------
    // Transforms
    // -------------------------------------------------------------------------

    /// Translate in place.
    fn shift_assign(&mut self, offset: Vec2) {
        self.map_points(&mut |p| p + offset);
    }

    /// Move so that the rotation center lands on `target`.
    fn shift_to_assign(&mut self, target: Vec2) {
        let offset = target - self.rotation_center();
        self.shift_assign(offset);
    }

    /// Rotate in place by `rad` about `pivot` (rotation center if `None`).
    fn rotate_assign(&mut self, rad: f64, pivot: Option<Vec2>) {
        let pivot = pivot.unwrap_or_else(|| self.rotation_center());
        self.map_points(&mut |p| p.rotate_about(rad, pivot));
        let angle = self.angle();
        self.set_angle(angle + rad);
    }

    /// Rotate in place so the tracked angle becomes `rad`.
    fn rotate_to_assign(&mut self, rad: f64, pivot: Option<Vec2>) {
        let delta = rad - self.angle();
        self.rotate_assign(delta, pivot);
    }

    /// Degree variant of [`Collidable::rotate_assign`].
    fn rotate_deg_assign(&mut self, deg: f64, pivot: Option<Vec2>) {
        self.rotate_assign(to_rad(deg), pivot);
    }

    /// Translated copy.
    fn shift(&self, offset: Vec2) -> Self
    where
        Self: Sized + Clone,
    {
        let mut copy = self.clone();
        copy.shift_assign(offset);
        copy
    }

    /// Copy moved so the rotation center lands on `target`.
    fn shift_to(&self, target: Vec2) -> Self
    where
        Self: Sized + Clone,
    {
        let mut copy = self.clone();
        copy.shift_to_assign(target);
        copy
    }

    /// Rotated copy.
    fn rotate(&self, rad: f64, pivot: Option<Vec2>) -> Self
    where
        Self: Sized + Clone,
    {
        let mut copy = self.clone();
        copy.rotate_assign(rad, pivot);
        copy
    }

    /// Copy rotated to absolute angle `rad`.
    fn rotate_to(&self, rad: f64, pivot: Option<Vec2>) -> Self
    where
        Self: Sized + Clone,
    {
        let mut copy = self.clone();
        copy.rotate_to_assign(rad, pivot);
        copy
    }

    /// Degree variant of [`Collidable::rotate`].
    fn rotate_deg(&self, deg: f64, pivot: Option<Vec2>) -> Self
    where
        Self: Sized + Clone,
    {
        self.rotate(to_rad(deg), pivot)
    }

    /// Copy with the tracked rotation undone.
    fn unrotated(&self) -> Self
    where
        Self: Sized + Clone,
    {
        self.rotate_to(0.0, None)
    }

    /// Deep, independent copy.
    fn copy(&self) -> Self
    where
        Self: Sized + Clone,
    {
        self.clone()
    }
}

// =============================================================================
// SHARED ALGORITHMS
// =============================================================================

/// Append `point` unless an approximately equal point is already present.
pub fn push_unique(points: &mut Vec<Vec2>, point: Vec2) {
    if !points.iter().any(|p| p.approx_eq(point)) {
        points.push(point);
    }
}

/// Symmetric collision predicate.
pub fn collides(a: &dyn Collidable, b: &dyn Collidable) -> bool {
    if !a.bounding_rect().overlaps(&b.bounding_rect()) {
        return false;
    }
    a.intersects(b)
        || b.points().iter().any(|p| a.contains_point(*p))
        || a.points().iter().any(|p| b.contains_point(*p))
}

/// Crossing points of `a` and `b` plus points of `b` enclosed by `a`.
pub fn collision_points(a: &dyn Collidable, b: &dyn Collidable) -> Vec<Vec2> {
    let mut points = a.intersection_points(b);
    for p in a.enclosed_points(b) {
        push_unique(&mut points, p);
    }
    points
}

// =============================================================================
// SHAPE ENUM
// =============================================================================

/// Owned shape of any kind.
///
/// Game elements and the spatial index store this closed set; code that
/// only needs the capability set works against `&dyn Collidable`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Closed polygon
    Polygon(Polygon),
    /// Rigid multi-part assembly
    MultiPart(MultiPart),
    /// Open segment
    Line(Line),
}

impl Shape {
    /// Borrow as the capability trait.
    pub fn as_collidable(&self) -> &dyn Collidable {
        match self {
            Shape::Polygon(p) => p,
            Shape::MultiPart(m) => m,
            Shape::Line(l) => l,
        }
    }

    fn as_collidable_mut(&mut self) -> &mut dyn Collidable {
        match self {
            Shape::Polygon(p) => p,
            Shape::MultiPart(m) => m,
            Shape::Line(l) => l,
        }
    }

    /// Replace this shape's geometry with a clone of `other`.
    ///
    /// Fails with [`GeometryError::TypeMismatch`] when kinds differ.
    pub fn become_equivalent_to(&mut self, other: &Shape) -> Result<(), GeometryError> {
        let (expected, found) = (self.kind(), other.kind());
        if expected != found {
            return Err(GeometryError::TypeMismatch { expected, found });
        }
        *self = other.clone();
        Ok(())
    }

    /// Center of the reporting footprint (the base part for composites).
    pub fn base_center(&self) -> Vec2 {
        match self {
            Shape::Polygon(p) => p.rotation_center(),
            Shape::MultiPart(m) => m.base().rotation_center(),
            Shape::Line(l) => l.rotation_center(),
        }
    }

    /// Unrotated width of the reporting footprint.
    pub fn width(&self) -> f64 {
        match self {
            Shape::Polygon(p) => p.width(),
            Shape::MultiPart(m) => m.base().width(),
            Shape::Line(l) => l.length(),
        }
    }

    /// Unrotated height of the reporting footprint.
    pub fn height(&self) -> f64 {
        match self {
            Shape::Polygon(p) => p.height(),
            Shape::MultiPart(m) => m.base().height(),
            Shape::Line(_) => 0.0,
        }
    }
}

impl Collidable for Shape {
    fn kind(&self) -> ShapeKind {
        self.as_collidable().kind()
    }

    fn points(&self) -> Vec<Vec2> {
        self.as_collidable().points()
    }

    fn edges(&self) -> Vec<Line> {
        self.as_collidable().edges()
    }

    fn contains_point(&self, point: Vec2) -> bool {
        self.as_collidable().contains_point(point)
    }

    fn map_points(&mut self, f: &mut dyn FnMut(Vec2) -> Vec2) {
        self.as_collidable_mut().map_points(f)
    }

    fn angle(&self) -> f64 {
        self.as_collidable().angle()
    }

    fn set_angle(&mut self, rad: f64) {
        self.as_collidable_mut().set_angle(rad)
    }

    fn rotation_center(&self) -> Vec2 {
        self.as_collidable().rotation_center()
    }
}

impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}

impl From<MultiPart> for Shape {
    fn from(m: MultiPart) -> Self {
        Shape::MultiPart(m)
    }
}

impl From<Line> for Shape {
    fn from(l: Line) -> Self {
        Shape::Line(l)
    }
}

// =============================================================================
// TESTS
// =============================================================================
