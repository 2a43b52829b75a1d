//! Game Elements
//!
//! Tanks, bullets and blocks. Every element owns exactly one [`Shape`];
//! the map indexes a snapshot of it under the element's id.
//!
//! ## Tank Layout (angle 0, facing +Y)
//!
//! ```text
//!            ┌─┐  weapon (gun barrel)
//!            │ │
//!        ┌───┴─┴───┐
//!        │         │
//!        │  body   │  base part: position, footprint, pivot
//!        │    +    │
//!        │         │
//!        └─────────┘
//!       left      right
//!       track     track
//! ```

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::numeric::approx_zero;
use crate::core::vec2::Vec2;
use crate::geometry::{Collidable, GeometryError, MultiPart, Polygon, Shape};

/// Hit points of an undamaged tank.
pub const INIT_TANK_HP: i32 = 100;

/// Hit points reported for blocks (never reduced).
pub const BLOCK_HP: i32 = 1;

/// Side length of a map grid cell.
pub const CELL_SIZE: f64 = 1.0;

// =============================================================================
// IDENTIFIERS AND STATUS
// =============================================================================

/// Stable element id, also the spatial index key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Removal status. Only ever moves from `Alive` to `ToRemove`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoveStatus {
    /// In play
    Alive,
    /// Destroyed, swept at the end of the tick
    ToRemove,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tank hull and drive parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TankConfig {
    /// Body width (distance between tracks)
    pub width: f64,
    /// Body length along the heading
    pub length: f64,
    /// Starting and maximum hit points
    pub max_hp: i32,
    /// Track speed limit (units per second)
    pub track_max_speed: f64,
    /// Radius within which the tank sees other elements
    pub vision_range: f64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            width: 0.6,
            length: 0.8,
            max_hp: INIT_TANK_HP,
            track_max_speed: 2.0,
            vision_range: 8.0,
        }
    }
}

/// Weapon mounted on every tank.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponConfig {
    /// Barrel width
    pub width: f64,
    /// Barrel length
    pub length: f64,
    /// Rounds regained per second
    pub reload_rate: f64,
    /// Magazine size
    pub max_capacity: u32,
    /// Damage dealt by each bullet
    pub damage: i32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            width: 0.12,
            length: 0.35,
            reload_rate: 1.0,
            max_capacity: 5,
            damage: 10,
        }
    }
}

/// Bullet geometry and speed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulletConfig {
    /// Bullet width
    pub width: f64,
    /// Bullet length along travel
    pub length: f64,
    /// Travel speed (units per second)
    pub speed: f64,
}

impl Default for BulletConfig {
    fn default() -> Self {
        Self {
            width: 0.08,
            length: 0.16,
            speed: 6.0,
        }
    }
}

impl BulletConfig {
    /// Bullet footprint centered at the origin, unrotated.
    pub fn footprint(&self) -> Polygon {
        Polygon::rect(Vec2::ZERO, self.width, self.length)
    }
}

// =============================================================================
// ELEMENT KINDS
// =============================================================================

/// Reloading weapon state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Rounds regained per second
    pub reload_rate: f64,
    /// Magazine size
    pub max_capacity: u32,
    /// Rounds available, fractional while reloading
    pub cur_capacity: f64,
    /// Damage per bullet
    pub damage: i32,
    /// Bullets this weapon fires
    pub bullet: BulletConfig,
}

impl Weapon {
    /// Full magazine built from config.
    pub fn new(config: &WeaponConfig, bullet: &BulletConfig) -> Self {
        Self {
            reload_rate: config.reload_rate,
            max_capacity: config.max_capacity,
            cur_capacity: config.max_capacity as f64,
            damage: config.damage,
            bullet: bullet.clone(),
        }
    }

    /// Whole rounds ready to fire.
    #[inline]
    pub fn rounds(&self) -> u32 {
        self.cur_capacity.floor() as u32
    }

    /// Regain ammunition for `dt` seconds.
    pub fn reload(&mut self, dt: f64) {
        let cap = self.max_capacity as f64;
        self.cur_capacity = (self.cur_capacity + self.reload_rate * dt).min(cap);
    }

    /// Spend one round if available.
    pub fn try_fire(&mut self) -> bool {
        if self.cur_capacity >= 1.0 {
            self.cur_capacity -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Tank-specific state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TankState {
    /// Name of the controlling player
    pub player: String,
    /// Left track speed
    pub left_track: f64,
    /// Right track speed
    pub right_track: f64,
    /// Track speed limit
    pub track_max_speed: f64,
    /// Distance between tracks
    pub track_width: f64,
    /// Vision radius
    pub vision_range: f64,
    /// Maximum hit points
    pub max_hp: i32,
    /// Mounted weapon
    pub weapon: Weapon,
}

/// Bullet-specific state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulletState {
    /// Displacement per second
    pub velocity: Vec2,
    /// Damage dealt on impact
    pub damage: i32,
}

/// What kind of element this is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ElementKind {
    /// Player tank
    Tank(TankState),
    /// Bullet in flight
    Bullet(BulletState),
    /// Static map block
    Block,
}

// =============================================================================
// GAME ELEMENT
// =============================================================================

/// An entity in the world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameElement {
    /// Unique id
    pub id: ElementId,
    /// Owned collision shape
    pub shape: Shape,
    /// Hit points
    pub hp: i32,
    /// Removal status
    pub status: RemoveStatus,
    /// Kind-specific state
    pub kind: ElementKind,
}

impl GameElement {
    /// Tank facing +Y with its body centered on `center`.
    pub fn tank(
        id: ElementId,
        player: &str,
        center: Vec2,
        tank: &TankConfig,
        weapon: &WeaponConfig,
        bullet: &BulletConfig,
    ) -> Result<Self, GeometryError> {
        let body = Polygon::rect(center, tank.width, tank.length);
        let barrel_center = center + Vec2::new(0.0, (tank.length + weapon.length) / 2.0);
        let barrel = Polygon::rect(barrel_center, weapon.width, weapon.length);
        let shape = MultiPart::new(vec![body, barrel], 0)?;

        Ok(Self {
            id,
            shape: shape.into(),
            hp: tank.max_hp,
            status: RemoveStatus::Alive,
            kind: ElementKind::Tank(TankState {
                player: player.to_string(),
                left_track: 0.0,
                right_track: 0.0,
                track_max_speed: tank.track_max_speed,
                track_width: tank.width,
                vision_range: tank.vision_range,
                max_hp: tank.max_hp,
                weapon: Weapon::new(weapon, bullet),
            }),
        })
    }

    /// Bullet centered on `center`, travelling along heading `angle`
    /// (0 faces +Y).
    pub fn bullet(id: ElementId, center: Vec2, angle: f64, config: &BulletConfig, damage: i32) -> Self {
        let shape = Polygon::rect(center, config.width, config.length).rotate(angle, None);
        Self {
            id,
            shape: shape.into(),
            hp: 1,
            status: RemoveStatus::Alive,
            kind: ElementKind::Bullet(BulletState {
                velocity: Vec2::UP.rotate(angle) * config.speed,
                damage,
            }),
        }
    }

    /// Block filling grid cell `(x, y)`.
    pub fn block(id: ElementId, x: i64, y: i64) -> Self {
        let corner = Vec2::new(x as f64 * CELL_SIZE, y as f64 * CELL_SIZE);
        Self {
            id,
            shape: Polygon::rect_from_bottom_left(corner, CELL_SIZE, CELL_SIZE).into(),
            hp: BLOCK_HP,
            status: RemoveStatus::Alive,
            kind: ElementKind::Block,
        }
    }

    /// Display name written into spawn events.
    pub fn serial_name(&self) -> &'static str {
        match self.kind {
            ElementKind::Tank(_) => "Tank",
            ElementKind::Bullet(_) => "Bullet",
            ElementKind::Block => "Block",
        }
    }

    /// Owning player for tanks.
    pub fn player_name(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Tank(t) => Some(&t.player),
            _ => None,
        }
    }

    /// Tank state if this is a tank.
    pub fn as_tank(&self) -> Option<&TankState> {
        match &self.kind {
            ElementKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    /// Mutable tank state if this is a tank.
    pub fn as_tank_mut(&mut self) -> Option<&mut TankState> {
        match &mut self.kind {
            ElementKind::Tank(t) => Some(t),
            _ => None,
        }
    }

    /// Element is a tank.
    #[inline]
    pub fn is_tank(&self) -> bool {
        matches!(self.kind, ElementKind::Tank(_))
    }

    /// Element is a bullet.
    #[inline]
    pub fn is_bullet(&self) -> bool {
        matches!(self.kind, ElementKind::Bullet(_))
    }

    /// Element takes part in the per-tick update.
    #[inline]
    pub fn is_time_updatable(&self) -> bool {
        !matches!(self.kind, ElementKind::Block)
    }

    /// Still in play.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.status == RemoveStatus::Alive
    }

    /// Mark for removal at the end of the tick.
    pub fn mark_removed(&mut self) {
        self.status = RemoveStatus::ToRemove;
    }

    /// Reported position (base footprint center).
    pub fn position(&self) -> Vec2 {
        self.shape.base_center()
    }

    /// Element would change pose over a nonzero interval.
    pub fn will_move(&self) -> bool {
        match &self.kind {
            ElementKind::Tank(t) => !approx_zero(t.left_track) || !approx_zero(t.right_track),
            ElementKind::Bullet(b) => !approx_zero(b.velocity.length()),
            ElementKind::Block => false,
        }
    }

    /// Tentative shape after moving for `dt` seconds.
    ///
    /// Tanks use differential drive: they turn by `(r - l) / track_width`
    /// radians per second about the body center, then advance `(l + r) / 2`
    /// along the new heading.
    pub fn shape_after_move(&self, dt: f64) -> Shape {
        let mut next = self.shape.clone();
        match &self.kind {
            ElementKind::Tank(t) => {
                let speed = (t.left_track + t.right_track) / 2.0;
                let omega = (t.right_track - t.left_track) / t.track_width;
                next.rotate_assign(omega * dt, None);
                let heading = Vec2::UP.rotate(next.angle());
                next.shift_assign(heading * (speed * dt));
            }
            ElementKind::Bullet(b) => next.shift_assign(b.velocity * dt),
            ElementKind::Block => {}
        }
        next
    }

    /// Time-driven state that does not involve motion.
    pub fn update_by_time(&mut self, dt: f64) {
        if let ElementKind::Tank(t) = &mut self.kind {
            t.weapon.reload(dt);
        }
    }

    /// Subtract `damage` hit points. Returns whether hp changed.
    ///
    /// Blocks ignore damage; reaching zero marks the element for removal.
    pub fn take_damage(&mut self, damage: i32) -> bool {
        if damage <= 0 || matches!(self.kind, ElementKind::Block) {
            return false;
        }
        let before = self.hp;
        self.hp = (self.hp - damage).max(0);
        if self.hp == 0 {
            self.mark_removed();
        }
        self.hp != before
    }

    /// Destroy outright (bullets on impact). Returns whether hp changed.
    pub fn destroy(&mut self) -> bool {
        let before = self.hp;
        self.hp = 0;
        self.mark_removed();
        before != 0
    }
}

// =============================================================================
// TESTS
// =============================================================================
