//! 2D Vector
//!
//! Double-precision point and displacement type used by geometry and the
//! simulation. A position is just a [`Vec2`] measured from the origin.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use serde::{Serialize, Deserialize};

use super::numeric::{approx_eq, EPSILON};

/// 2D vector with `f64` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
}

/// A point in world coordinates.
pub type Pos2 = Vec2;

impl Vec2 {
    /// Zero vector (also the origin)
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Unit vector pointing right (+X)
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };

    /// Unit vector pointing up (+Y)
    pub const UP: Self = Self { x: 0.0, y: 1.0 };

    /// Unit vector pointing left (-X)
    pub const LEFT: Self = Self { x: -1.0, y: 0.0 };

    /// Unit vector pointing down (-Y)
    pub const DOWN: Self = Self { x: 0.0, y: -1.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Create a vector from polar coordinates (angle in radians).
    #[inline]
    pub fn from_polar(len: f64, rad: f64) -> Self {
        Self {
            x: len * rad.cos(),
            y: len * rad.sin(),
        }
    }

    /// Scale by a scalar.
    #[inline]
    pub fn scale(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    /// Squared length (avoids sqrt - prefer this for comparisons).
    #[inline]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Length (magnitude).
    #[inline]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[inline]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    /// Distance to another point.
    #[inline]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Normalize to unit length.
    /// Returns ZERO if length is zero.
    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len <= EPSILON {
            return Self::ZERO;
        }
        self.scale(1.0 / len)
    }

    /// Dot product with another vector.
    #[inline]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (returns scalar z-component).
    /// Positive if other is counter-clockwise from self.
    #[inline]
    pub fn cross(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Angle of the vector in radians, measured from +X.
    #[inline]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Rotate counter-clockwise about the origin.
    #[inline]
    pub fn rotate(self, rad: f64) -> Self {
        let (sin, cos) = rad.sin_cos();
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    /// Rotate counter-clockwise about `pivot`.
    #[inline]
    pub fn rotate_about(self, rad: f64, pivot: Self) -> Self {
        (self - pivot).rotate(rad) + pivot
    }

    /// Component-wise minimum.
    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum.
    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y))
    }

    /// Equality within [`EPSILON`] on both components.
    #[inline]
    pub fn approx_eq(self, other: Self) -> bool {
        approx_eq(self.x, other.x) && approx_eq(self.y, other.y)
    }

    /// X-only part of this vector.
    #[inline]
    pub fn x_vec(self) -> Self {
        Self::new(self.x, 0.0)
    }

    /// Y-only part of this vector.
    #[inline]
    pub fn y_vec(self) -> Self {
        Self::new(0.0, self.y)
    }
}

/// Arithmetic mean of a set of points. Returns ZERO for an empty slice.
pub fn centroid(points: &[Vec2]) -> Vec2 {
    if points.is_empty() {
        return Vec2::ZERO;
    }
    let sum = points.iter().fold(Vec2::ZERO, |acc, p| acc + *p);
    sum.scale(1.0 / points.len() as f64)
}

// Operator overloads for ergonomics
impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;
    #[inline]
    fn div(self, rhs: f64) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({:.3}, {:.3})", self.x, self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_vec2_constants() {
        assert_eq!(Vec2::ZERO.x, 0.0);
        assert_eq!(Vec2::RIGHT.x, 1.0);
        assert_eq!(Vec2::UP.y, 1.0);
        assert_eq!(Vec2::LEFT + Vec2::RIGHT, Vec2::ZERO);
    }

    #[test]
    fn test_vec2_arithmetic() {
        let a = Vec2::new(3.0, 4.0);
        let b = Vec2::new(1.0, 2.0);
        assert_eq!(a + b, Vec2::new(4.0, 6.0));
        assert_eq!(a - b, Vec2::new(2.0, 2.0));
        assert_eq!(a * 2.0, Vec2::new(6.0, 8.0));
        assert_eq!(-a, Vec2::new(-3.0, -4.0));

        let mut c = a;
        c += b;
        c -= b;
        assert_eq!(c, a);
    }

    #[test]
    fn test_vec2_length() {
        // 3-4-5 triangle
        let v = Vec2::new(3.0, 4.0);
        assert_eq!(v.length_squared(), 25.0);
        assert_eq!(v.length(), 5.0);
        assert_eq!(Vec2::ZERO.distance(v), 5.0);
    }

    #[test]
    fn test_vec2_normalize() {
        let norm = Vec2::new(3.0, 4.0).normalize();
        assert!(approx_eq(norm.length(), 1.0));
        assert_eq!(Vec2::ZERO.normalize(), Vec2::ZERO);
    }

    #[test]
    fn test_vec2_rotate() {
        let v = Vec2::RIGHT.rotate(PI / 2.0);
        assert!(v.approx_eq(Vec2::UP));

        let about = Vec2::new(1.0, 0.0).rotate_about(PI / 2.0, Vec2::new(0.5, 0.0));
        assert!(about.approx_eq(Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn test_vec2_cross_dot() {
        assert_eq!(Vec2::RIGHT.cross(Vec2::UP), 1.0);
        assert_eq!(Vec2::UP.cross(Vec2::RIGHT), -1.0);
        assert_eq!(Vec2::new(2.0, 3.0).dot(Vec2::new(4.0, 5.0)), 23.0);
    }

    #[test]
    fn test_centroid() {
        let square = [
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ];
        assert!(centroid(&square).approx_eq(Vec2::new(1.0, 1.0)));
        assert_eq!(centroid(&[]), Vec2::ZERO);
    }
}
