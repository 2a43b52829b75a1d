//! Polygon Shape
//!
//! Closed simple polygon stored as an ordered point ring. Rectangles are
//! polygons built by the [`Polygon::rect`] factory, so blocks, bullets and
//! tank parts all share this type.

use serde::{Serialize, Deserialize};

use crate::core::vec2::{centroid, Vec2};

use super::aabb::AaRect;
use super::line::Line;
use super::shape::{Collidable, GeometryError, ShapeKind};

/// Closed polygon with a tracked rotation angle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    points: Vec<Vec2>,
    angle: f64,
}

impl Polygon {
    /// Build from a point ring (at least three points).
    pub fn from_points(points: Vec<Vec2>) -> Result<Self, GeometryError> {
        if points.len() < 3 {
            return Err(GeometryError::TooFewPoints(points.len()));
        }
        Ok(Self { points, angle: 0.0 })
    }

    /// Axis-aligned rectangle centered on `center`.
    ///
    /// Points run counter-clockwise from the bottom-left corner.
    pub fn rect(center: Vec2, width: f64, height: f64) -> Self {
        Self::from_aabb(&AaRect::from_center(center, Vec2::new(width, height)))
    }

    /// Axis-aligned rectangle from its bottom-left corner and size.
    pub fn rect_from_bottom_left(bottom_left: Vec2, width: f64, height: f64) -> Self {
        Self::from_aabb(&AaRect::from_bottom_left(bottom_left, Vec2::new(width, height)))
    }

    /// Rectangle covering an [`AaRect`].
    pub fn from_aabb(rect: &AaRect) -> Self {
        Self {
            points: rect.corners().to_vec(),
            angle: 0.0,
        }
    }

    /// Bound of the shape with its tracked rotation undone.
    fn unrotated_bound(&self) -> AaRect {
        let pivot = centroid(&self.points);
        let straight: Vec<Vec2> = self
            .points
            .iter()
            .map(|p| p.rotate_about(-self.angle, pivot))
            .collect();
        AaRect::enclosing(&straight)
    }

    /// Width before rotation.
    pub fn width(&self) -> f64 {
        self.unrotated_bound().width()
    }

    /// Height before rotation.
    pub fn height(&self) -> f64 {
        self.unrotated_bound().height()
    }
}

impl Collidable for Polygon {
    fn kind(&self) -> ShapeKind {
        ShapeKind::Polygon
    }

    fn points(&self) -> Vec<Vec2> {
        self.points.clone()
    }

    fn edges(&self) -> Vec<Line> {
        let n = self.points.len();
        (0..n)
            .map(|i| Line::new(self.points[i], self.points[(i + 1) % n]))
            .collect()
    }

    fn contains_point(&self, point: Vec2) -> bool {
        // Boundary points are not inside
        if self.edges().iter().any(|e| e.touches(point)) {
            return false;
        }

        // Even-odd ray cast towards +X
        let n = self.points.len();
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (pi, pj) = (self.points[i], self.points[j]);
            if (pi.y > point.y) != (pj.y > point.y) {
                let cross_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
                if point.x < cross_x {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    fn map_points(&mut self, f: &mut dyn FnMut(Vec2) -> Vec2) {
        for p in &mut self.points {
            *p = f(*p);
        }
    }

    fn angle(&self) -> f64 {
        self.angle
    }

    fn set_angle(&mut self, rad: f64) {
        self.angle = rad;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_rect_corners() {
        let r = Polygon::rect(Vec2::new(1.0, 1.0), 2.0, 4.0);
        let pts = r.points();
        assert_eq!(pts[0], Vec2::new(0.0, -1.0));
        assert_eq!(pts[2], Vec2::new(2.0, 3.0));
        assert_eq!(r.edges().len(), 4);
        assert!(r.rotation_center().approx_eq(Vec2::new(1.0, 1.0)));
    }

    #[test]
    fn test_from_points_needs_three() {
        assert_eq!(
            Polygon::from_points(vec![Vec2::ZERO, Vec2::UP]),
            Err(GeometryError::TooFewPoints(2))
        );
        let tri = Polygon::from_points(vec![Vec2::ZERO, Vec2::RIGHT, Vec2::UP]).unwrap();
        assert!(tri.contains_point(Vec2::new(0.2, 0.2)));
        assert!(!tri.contains_point(Vec2::new(0.8, 0.8)));
    }

    #[test]
    fn test_contains_is_strict() {
        let sq = Polygon::rect_from_bottom_left(Vec2::ZERO, 1.0, 1.0);
        assert!(sq.contains_point(Vec2::new(0.5, 0.5)));
        assert!(!sq.contains_point(Vec2::new(0.0, 0.5)));
        assert!(!sq.contains_point(Vec2::new(1.0, 1.0)));
        assert!(!sq.contains_point(Vec2::new(1.5, 0.5)));
    }

    #[test]
    fn test_rotated_rect_dimensions() {
        let r = Polygon::rect(Vec2::ZERO, 2.0, 6.0).rotate(PI / 4.0, None);
        assert!((r.width() - 2.0).abs() < 1e-9);
        assert!((r.height() - 6.0).abs() < 1e-9);

        // the world bound grows with rotation
        let bound = r.bounding_rect();
        assert!(bound.width() > 2.0);
    }

    #[test]
    fn test_quarter_turn_swaps_bound() {
        let r = Polygon::rect(Vec2::ZERO, 2.0, 6.0).rotate(PI / 2.0, None);
        let bound = r.bounding_rect();
        assert!((bound.width() - 6.0).abs() < 1e-9);
        assert!((bound.height() - 2.0).abs() < 1e-9);
    }
}
