//! Axis-Aligned Bounding Rectangle
//!
//! Tight enclosing rectangle of a shape. Used as the broad-phase key of the
//! quadtree and as the bound of every quadtree node.

use serde::{Serialize, Deserialize};

use crate::core::numeric::{approx_ge, approx_le};
use crate::core::vec2::Vec2;

/// Axis-aligned rectangle described by its min and max corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AaRect {
    /// Bottom-left corner
    pub min: Vec2,
    /// Top-right corner
    pub max: Vec2,
}

impl AaRect {
    /// Create from two corners in any order.
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create from the bottom-left corner and a size.
    pub fn from_bottom_left(bottom_left: Vec2, size: Vec2) -> Self {
        Self::new(bottom_left, bottom_left + size)
    }

    /// Create from a center point and a size.
    pub fn from_center(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    /// Tight rectangle around a point set.
    ///
    /// An empty set yields a degenerate rectangle at the origin.
    pub fn enclosing(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::new(Vec2::ZERO, Vec2::ZERO);
        };
        let (min, max) = points
            .iter()
            .skip(1)
            .fold((*first, *first), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
        Self { min, max }
    }

    /// Width along X.
    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    /// Height along Y.
    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Size as a vector (width, height).
    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Corners in counter-clockwise order starting bottom-left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    /// `other` lies entirely inside this rectangle (boundary inclusive).
    pub fn encloses(&self, other: &AaRect) -> bool {
        approx_le(self.min.x, other.min.x)
            && approx_le(self.min.y, other.min.y)
            && approx_ge(self.max.x, other.max.x)
            && approx_ge(self.max.y, other.max.y)
    }

    /// The two rectangles share at least one point (touching counts).
    pub fn overlaps(&self, other: &AaRect) -> bool {
        approx_le(self.min.x, other.max.x)
            && approx_le(other.min.x, self.max.x)
            && approx_le(self.min.y, other.max.y)
            && approx_le(other.min.y, self.max.y)
    }

    /// Point lies inside or on the boundary.
    pub fn contains_point(&self, point: Vec2) -> bool {
        approx_le(self.min.x, point.x)
            && approx_le(point.x, self.max.x)
            && approx_le(self.min.y, point.y)
            && approx_le(point.y, self.max.y)
    }

    /// Four quadrants, each grown by `margin` past the split lines.
    ///
    /// Order: top-right, top-left, bottom-left, bottom-right.
    pub fn quadrants(&self, margin: f64) -> [AaRect; 4] {
        let mid = self.center();
        [
            AaRect::new(Vec2::new(mid.x - margin, mid.y - margin), self.max),
            AaRect::new(
                Vec2::new(self.min.x, mid.y - margin),
                Vec2::new(mid.x + margin, self.max.y),
            ),
            AaRect::new(self.min, Vec2::new(mid.x + margin, mid.y + margin)),
            AaRect::new(
                Vec2::new(mid.x - margin, self.min.y),
                Vec2::new(self.max.x, mid.y + margin),
            ),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enclosing() {
        let rect = AaRect::enclosing(&[
            Vec2::new(1.0, 5.0),
            Vec2::new(-2.0, 3.0),
            Vec2::new(4.0, -1.0),
        ]);
        assert_eq!(rect.min, Vec2::new(-2.0, -1.0));
        assert_eq!(rect.max, Vec2::new(4.0, 5.0));
        assert_eq!(rect.width(), 6.0);
        assert_eq!(rect.height(), 6.0);
    }

    #[test]
    fn test_encloses_is_boundary_inclusive() {
        let outer = AaRect::new(Vec2::ZERO, Vec2::new(10.0, 10.0));
        assert!(outer.encloses(&outer));
        assert!(outer.encloses(&AaRect::new(Vec2::new(1.0, 1.0), Vec2::new(2.0, 2.0))));
        assert!(!outer.encloses(&AaRect::new(Vec2::new(9.0, 9.0), Vec2::new(11.0, 10.0))));
    }

    #[test]
    fn test_overlaps() {
        let a = AaRect::new(Vec2::ZERO, Vec2::new(1.0, 1.0));
        let touching = AaRect::new(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));
        let apart = AaRect::new(Vec2::new(1.5, 0.0), Vec2::new(2.0, 1.0));
        assert!(a.overlaps(&touching));
        assert!(!a.overlaps(&apart));
    }

    #[test]
    fn test_quadrants_cover_split_lines() {
        let root = AaRect::new(Vec2::ZERO, Vec2::new(100.0, 100.0));
        let quads = root.quadrants(0.01);

        // a shape lying on the vertical split line fits in one child
        let on_line = AaRect::new(Vec2::new(49.0, 10.0), Vec2::new(50.0, 11.0));
        let holders = quads.iter().filter(|q| q.encloses(&on_line)).count();
        assert_eq!(holders, 1);

        // every quadrant stays inside the parent
        for q in &quads {
            assert!(root.encloses(q));
            assert!(q.width() > 50.0 && q.width() < 50.1);
        }
    }
}
