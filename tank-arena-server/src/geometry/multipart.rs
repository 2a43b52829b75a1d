//! Multi-Part Shape
//!
//! A rigid assembly of polygons that move and rotate together. One part is
//! the *base*: it supplies the rotation center and the footprint reported
//! in events (a tank reports its hull, not hull plus gun).

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;

use super::line::Line;
use super::polygon::Polygon;
use super::shape::{Collidable, GeometryError, ShapeKind};

/// Rigid composite of polygons with a designated base part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiPart {
    parts: Vec<Polygon>,
    base: usize,
    angle: f64,
}

impl MultiPart {
    /// Assemble from parts; `base` indexes the reporting part.
    pub fn new(parts: Vec<Polygon>, base: usize) -> Result<Self, GeometryError> {
        if parts.is_empty() {
            return Err(GeometryError::EmptyComposite);
        }
        if base >= parts.len() {
            return Err(GeometryError::BaseOutOfRange { index: base, len: parts.len() });
        }
        Ok(Self { parts, base, angle: 0.0 })
    }

    /// The reporting part.
    #[inline]
    pub fn base(&self) -> &Polygon {
        &self.parts[self.base]
    }

    /// Part by index.
    pub fn part(&self, index: usize) -> Option<&Polygon> {
        self.parts.get(index)
    }

    /// All parts in construction order.
    pub fn parts(&self) -> &[Polygon] {
        &self.parts
    }
}

impl Collidable for MultiPart {
    fn kind(&self) -> ShapeKind {
        ShapeKind::MultiPart
    }

    fn points(&self) -> Vec<Vec2> {
        self.parts.iter().flat_map(|p| p.points()).collect()
    }

    fn edges(&self) -> Vec<Line> {
        self.parts.iter().flat_map(|p| p.edges()).collect()
    }

    fn contains_point(&self, point: Vec2) -> bool {
        self.parts.iter().any(|p| p.contains_point(point))
    }

    fn map_points(&mut self, f: &mut dyn FnMut(Vec2) -> Vec2) {
        for part in &mut self.parts {
            part.map_points(f);
        }
    }

    fn angle(&self) -> f64 {
        self.angle
    }

    fn set_angle(&mut self, rad: f64) {
        // parts turn with the assembly
        let delta = rad - self.angle;
        for part in &mut self.parts {
            let a = part.angle();
            part.set_angle(a + delta);
        }
        self.angle = rad;
    }

    fn rotation_center(&self) -> Vec2 {
        self.base().rotation_center()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn hull_and_gun() -> MultiPart {
        let hull = Polygon::rect(Vec2::ZERO, 2.0, 2.0);
        let gun = Polygon::rect(Vec2::new(0.0, 1.5), 0.5, 1.0);
        MultiPart::new(vec![hull, gun], 0).unwrap()
    }

    #[test]
    fn test_construction_errors() {
        assert_eq!(MultiPart::new(vec![], 0), Err(GeometryError::EmptyComposite));
        let one = vec![Polygon::rect(Vec2::ZERO, 1.0, 1.0)];
        assert_eq!(
            MultiPart::new(one, 1),
            Err(GeometryError::BaseOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_rotates_about_base_center() {
        let m = hull_and_gun().rotate(PI / 2.0, None);
        assert!(m.rotation_center().approx_eq(Vec2::ZERO));
        // gun swung from +y to -x
        let gun_center = m.part(1).unwrap().rotation_center();
        assert!(gun_center.approx_eq(Vec2::new(-1.5, 0.0)));
        assert!((m.base().angle() - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_points_and_edges_cover_all_parts() {
        let m = hull_and_gun();
        assert_eq!(m.points().len(), 8);
        assert_eq!(m.edges().len(), 8);
        assert!(m.contains_point(Vec2::new(0.0, 1.8)));
        assert!(!m.contains_point(Vec2::new(0.9, 1.8)));
    }
}
