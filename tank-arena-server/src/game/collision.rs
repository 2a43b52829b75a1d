//! Collision Effects
//!
//! What happens to two elements once the index and geometry agree they
//! collide. Detection lives in [`crate::index`] and [`crate::geometry`];
//! this module only applies consequences, to both sides.
//!
//! ```text
//!   Tank   vs Tank    both blocked, no hp change
//!   Tank   vs Block   blocked, no hp change
//!   Bullet vs Tank    tank loses bullet damage, bullet destroyed
//!   Bullet vs Block   bullet destroyed
//!   Bullet vs Bullet  both destroyed
//! ```

use std::collections::BTreeMap;

use crate::game::element::{ElementId, ElementKind, GameElement};

/// Effect one element has on the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Impact {
    /// Hit points taken from the target
    pub damage: i32,
    /// Target is destroyed outright
    pub destroys: bool,
}

/// Hit point changes produced by one pairwise collision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CollisionOutcome {
    /// First element's hp changed
    pub first_hp_changed: bool,
    /// Second element's hp changed
    pub second_hp_changed: bool,
}

/// Impact that `source` has on `target`.
///
/// An element already marked for removal deals no damage, so a bullet
/// that hit something earlier in the tick cannot hit twice.
pub fn impact_on(target: &GameElement, source: &GameElement) -> Impact {
    let damage = match &source.kind {
        ElementKind::Bullet(b) if source.is_alive() => b.damage,
        _ => 0,
    };
    Impact {
        damage,
        destroys: target.is_bullet(),
    }
}

/// Apply an impact. Returns whether hp changed.
pub fn apply_impact(target: &mut GameElement, impact: Impact) -> bool {
    if impact.destroys {
        target.destroy()
    } else {
        target.take_damage(impact.damage)
    }
}

/// Apply the effects of `first` colliding with `second` to both sides.
///
/// Impacts are computed from the pre-collision state of both elements
/// before either is modified. Missing ids produce no effect.
pub fn resolve_collision(
    elements: &mut BTreeMap<ElementId, GameElement>,
    first: ElementId,
    second: ElementId,
) -> CollisionOutcome {
    let (on_first, on_second) = match (elements.get(&first), elements.get(&second)) {
        (Some(a), Some(b)) => (impact_on(a, b), impact_on(b, a)),
        _ => return CollisionOutcome::default(),
    };

    let first_hp_changed = elements
        .get_mut(&first)
        .map(|a| apply_impact(a, on_first))
        .unwrap_or(false);
    let second_hp_changed = elements
        .get_mut(&second)
        .map(|b| apply_impact(b, on_second))
        .unwrap_or(false);

    CollisionOutcome {
        first_hp_changed,
        second_hp_changed,
    }
}

// =============================================================================
// TESTS
// =============================================================================
