//! Floating-Point Tolerance Policy
//!
//! All geometric comparisons in the simulation go through the helpers in
//! this module. Exact `==` on coordinates is never used for coincidence
//! tests, because shifts and rotations accumulate rounding error.
//!
//! ## Tolerances
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  EPSILON       1e-7   point / scalar coincidence            │
//! │  SPLIT_MARGIN  1e-5   quadtree child bound overlap          │
//! │  EVENT_DIGITS  3      decimals kept in serialized events    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::f64::consts::PI;

/// Tolerance used for every geometric comparison.
pub const EPSILON: f64 = 1e-7;

/// Extra margin added to each quadtree child so that shapes lying exactly on
/// a split line are still enclosed by one child.
pub const SPLIT_MARGIN: f64 = EPSILON * 100.0;

/// Number of decimals kept when coordinates are written into events.
pub const EVENT_DIGITS: i32 = 3;

// =============================================================================
// COMPARISONS
// =============================================================================

/// `a` and `b` are equal within [`EPSILON`].
#[inline]
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON
}

/// `a` and `b` differ by more than [`EPSILON`].
#[inline]
pub fn approx_ne(a: f64, b: f64) -> bool {
    !approx_eq(a, b)
}

/// `a <= b` within tolerance.
#[inline]
pub fn approx_le(a: f64, b: f64) -> bool {
    a <= b + EPSILON
}

/// `a >= b` within tolerance.
#[inline]
pub fn approx_ge(a: f64, b: f64) -> bool {
    a + EPSILON >= b
}

/// Value is zero within tolerance.
#[inline]
pub fn approx_zero(a: f64) -> bool {
    a.abs() <= EPSILON
}

// =============================================================================
// CONVERSIONS
// =============================================================================

/// Degrees to radians.
#[inline]
pub fn to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Wrap an angle into `[0, 2π)`.
#[inline]
pub fn normalize_angle(rad: f64) -> f64 {
    let wrapped = rad.rem_euclid(2.0 * PI);
    // rem_euclid can return exactly 2π for tiny negative inputs
    if wrapped >= 2.0 * PI {
        0.0
    } else {
        wrapped
    }
}

/// Round a value for event payloads so the replay log stays compact.
#[inline]
pub fn to_event_fixed(value: f64) -> f64 {
    let scale = 10f64.powi(EVENT_DIGITS);
    let rounded = (value * scale).round() / scale;
    // avoid serializing "-0.0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(0.1 + 0.2, 0.3));
        assert!(approx_ne(1.0, 1.001));
        assert!(approx_le(1.0 + EPSILON / 2.0, 1.0));
        assert!(approx_ge(1.0 - EPSILON / 2.0, 1.0));
    }

    #[test]
    fn test_angle_conversions() {
        assert!(approx_eq(to_rad(180.0), PI));
        assert!(approx_eq(normalize_angle(-PI / 2.0), 3.0 * PI / 2.0));
        assert!(approx_eq(normalize_angle(5.0 * PI), PI));
    }

    #[test]
    fn test_event_fixed() {
        assert_eq!(to_event_fixed(1.23456), 1.235);
        assert_eq!(to_event_fixed(-0.0001), 0.0);
        assert_eq!(to_event_fixed(10.0), 10.0);
    }
}
