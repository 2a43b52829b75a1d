//! Line Segment
//!
//! The building block of every intersection test: polygons expose their
//! boundary as a list of [`Line`] edges and shape-vs-shape crossing points
//! are the union of edge-vs-edge crossings.
//!
//! ## Segment Intersection Cases
//!
//! ```text
//!   crossing          collinear overlap       touching endpoint
//!
//!    \   /            A o=======o             o-------o
//!     \ /                 B o=======o                  \
//!      X                    ^     ^                     \
//!     / \               reported: 2 pts       reported: 1 pt
//!   reported: 1 pt
//! ```

use serde::{Serialize, Deserialize};

use crate::core::numeric::{approx_zero, EPSILON};
use crate::core::vec2::Vec2;

use super::shape::{Collidable, ShapeKind};

/// A finite straight segment between two points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// First endpoint
    pub start: Vec2,
    /// Second endpoint
    pub end: Vec2,
    /// Cumulative rotation applied since construction (radians)
    pub angle: f64,
}

impl Line {
    /// Create a segment between two points.
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end, angle: 0.0 }
    }

    /// Direction vector from `start` to `end`.
    #[inline]
    pub fn direction(&self) -> Vec2 {
        self.end - self.start
    }

    /// Segment length.
    #[inline]
    pub fn length(&self) -> f64 {
        self.direction().length()
    }

    /// Slope dy/dx, `None` for a vertical segment.
    pub fn slope(&self) -> Option<f64> {
        let d = self.direction();
        if approx_zero(d.x) {
            None
        } else {
            Some(d.y / d.x)
        }
    }

    /// Y-intercept of the supporting line, `None` for a vertical segment.
    pub fn intercept(&self) -> Option<f64> {
        self.slope().map(|k| self.start.y - k * self.start.x)
    }

    /// Distance from `point` to the closest point on this segment.
    pub fn distance_to(&self, point: Vec2) -> f64 {
        let d = self.direction();
        let len_sq = d.length_squared();
        if len_sq <= EPSILON * EPSILON {
            return point.distance(self.start);
        }
        let t = ((point - self.start).dot(d) / len_sq).clamp(0.0, 1.0);
        point.distance(self.start + d * t)
    }

    /// Point lies on this segment within tolerance.
    #[inline]
    pub fn touches(&self, point: Vec2) -> bool {
        self.distance_to(point) <= EPSILON
    }

    /// Points shared by two segments.
    ///
    /// Returns nothing for disjoint or parallel segments, a single point for
    /// a proper crossing or touch, and the two ends of the shared interval
    /// when the segments overlap collinearly.
    pub fn segment_intersections(&self, other: &Line) -> Vec<Vec2> {
        let d1 = self.direction();
        let d2 = other.direction();
        let len1 = d1.length();
        let len2 = d2.length();

        // Degenerate segments behave like points
        if len1 <= EPSILON && len2 <= EPSILON {
            return if self.start.distance(other.start) <= EPSILON {
                vec![self.start]
            } else {
                Vec::new()
            };
        }
        if len1 <= EPSILON {
            return if other.touches(self.start) { vec![self.start] } else { Vec::new() };
        }
        if len2 <= EPSILON {
            return if self.touches(other.start) { vec![other.start] } else { Vec::new() };
        }

        let offset = other.start - self.start;
        let denom = d1.cross(d2);

        if denom.abs() <= EPSILON * len1 * len2 {
            // Parallel: only collinear segments can share points
            if offset.cross(d1).abs() > EPSILON * len1 {
                return Vec::new();
            }
            return collinear_overlap(self, other);
        }

        let t = offset.cross(d2) / denom;
        let u = offset.cross(d1) / denom;
        let tol_t = EPSILON / len1;
        let tol_u = EPSILON / len2;

        if t < -tol_t || t > 1.0 + tol_t || u < -tol_u || u > 1.0 + tol_u {
            return Vec::new();
        }

        vec![self.start + d1 * t.clamp(0.0, 1.0)]
    }
}

/// Shared interval of two collinear segments, as its endpoints ordered along
/// `a`.
fn collinear_overlap(a: &Line, b: &Line) -> Vec<Vec2> {
    let d = a.direction();
    let len_sq = d.length_squared();
    let param = |p: Vec2| (p - a.start).dot(d) / len_sq;

    let (tb0, tb1) = (param(b.start), param(b.end));
    let lo = tb0.min(tb1).max(0.0);
    let hi = tb0.max(tb1).min(1.0);

    let tol = EPSILON / len_sq.sqrt();
    if lo > hi + tol {
        return Vec::new();
    }

    let first = a.start + d * lo;
    let last = a.start + d * hi;
    if first.distance(last) <= EPSILON {
        vec![first]
    } else {
        vec![first, last]
    }
}

impl Collidable for Line {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Line
    }

    fn points(&self) -> Vec<Vec2> {
        vec![self.start, self.end]
    }

    fn edges(&self) -> Vec<Line> {
        vec![self.clone()]
    }

    fn contains_point(&self, _point: Vec2) -> bool {
        // A segment has no interior
        false
    }

    fn map_points(&mut self, f: &mut dyn FnMut(Vec2) -> Vec2) {
        self.start = f(self.start);
        self.end = f(self.end);
    }

    fn angle(&self) -> f64 {
        self.angle
    }

    fn set_angle(&mut self, rad: f64) {
        self.angle = rad;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x0: f64, y0: f64, x1: f64, y1: f64) -> Line {
        Line::new(Vec2::new(x0, y0), Vec2::new(x1, y1))
    }

    #[test]
    fn test_crossing_diagonals() {
        let a = line(0.0, 0.0, 1.0, 1.0);
        let b = line(0.0, 1.0, 1.0, 0.0);

        let pts = a.segment_intersections(&b);
        assert_eq!(pts.len(), 1);
        assert!(pts[0].approx_eq(Vec2::new(0.5, 0.5)));

        // same answer from the other side
        let back = b.segment_intersections(&a);
        assert_eq!(back.len(), 1);
        assert!(back[0].approx_eq(Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn test_vertical_against_sloped() {
        let vertical = line(0.0, 0.0, 0.0, 1.0);
        let sloped = line(-0.1, 0.0, 1.0, 0.1);

        let pts = vertical.segment_intersections(&sloped);
        assert_eq!(pts.len(), 1);
        assert!(pts[0].x.abs() < 1e-9);
        assert!((pts[0].y - 0.01 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_shared_endpoint() {
        let a = line(0.0, 0.0, 1.0, 0.0);
        let b = line(0.0, 0.0, 0.0, 1.0);

        let pts = a.segment_intersections(&b);
        assert_eq!(pts.len(), 1);
        assert!(pts[0].approx_eq(Vec2::ZERO));
    }

    #[test]
    fn test_disjoint_and_parallel() {
        assert!(line(0.0, 0.0, 1.0, 0.0)
            .segment_intersections(&line(0.0, 1.0, 1.0, 1.0))
            .is_empty());
        assert!(line(0.0, 0.0, 1.0, 1.0)
            .segment_intersections(&line(2.0, 0.0, 3.0, -1.0))
            .is_empty());
    }

    #[test]
    fn test_collinear_overlap_reports_endpoints() {
        let a = line(0.0, 0.0, 4.0, 0.0);
        let b = line(3.0, 0.0, 1.0, 0.0);

        let pts = a.segment_intersections(&b);
        assert_eq!(pts.len(), 2);
        assert!(pts[0].approx_eq(Vec2::new(1.0, 0.0)));
        assert!(pts[1].approx_eq(Vec2::new(3.0, 0.0)));
    }

    #[test]
    fn test_collinear_touching_ends() {
        let a = line(0.0, 0.0, 1.0, 1.0);
        let b = line(1.0, 1.0, 2.0, 2.0);

        let pts = a.segment_intersections(&b);
        assert_eq!(pts.len(), 1);
        assert!(pts[0].approx_eq(Vec2::new(1.0, 1.0)));

        let gap = line(1.5, 1.5, 2.0, 2.0);
        assert!(a.segment_intersections(&gap).is_empty());
    }

    #[test]
    fn test_degenerate_point_segment() {
        let seg = line(0.0, 0.0, 2.0, 0.0);
        let dot_on = line(1.0, 0.0, 1.0, 0.0);
        let dot_off = line(1.0, 0.5, 1.0, 0.5);

        assert_eq!(seg.segment_intersections(&dot_on).len(), 1);
        assert!(seg.segment_intersections(&dot_off).is_empty());
        assert_eq!(dot_on.segment_intersections(&dot_on.clone()).len(), 1);
    }

    #[test]
    fn test_slope_and_intercept() {
        let l = line(0.0, 1.0, 2.0, 5.0);
        assert_eq!(l.slope(), Some(2.0));
        assert_eq!(l.intercept(), Some(1.0));
        assert_eq!(line(1.0, 0.0, 1.0, 3.0).slope(), None);
    }

    #[test]
    fn test_line_has_no_interior() {
        let l = line(0.0, 0.0, 2.0, 0.0);
        assert!(!l.contains_point(Vec2::new(1.0, 0.0)));
        assert!(l.touches(Vec2::new(1.0, 0.0)));
    }
}
