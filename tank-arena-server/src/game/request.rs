//! Controller Requests
//!
//! Commands and queries that actor tasks submit to the simulation loop.
//! Queries carry a one-shot reply slot that the loop fulfils exactly once;
//! commands carry none.
//!
//! ## Request Flow
//!
//! ```text
//! ┌──────────────┐   ControllerRequest    ┌──────────────────┐
//! │ actor task   │ ─────────────────────▶ │ simulation loop  │
//! │ (Controller) │   unbounded mpsc       │ drain, sort by   │
//! │              │ ◀───────────────────── │ submitted_at     │
//! └──────────────┘   oneshot reply        └──────────────────┘
//! ```

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::vec2::Vec2;
use crate::game::element::{ElementId, GameElement};
use crate::geometry::{Collidable, Shape};

/// Index of an actor (bot or human proxy) in registration order.
pub type ActorId = u32;

/// Reply slot of a query.
pub type ReplySender = oneshot::Sender<Result<Response, RequestError>>;

/// Request failures seen by actors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    /// The loop does not know this request kind
    #[error("invalid request kind: {0}")]
    InvalidKind(String),
    /// The loop dropped the request (no live tank for this actor)
    #[error("request dropped without a response")]
    Dropped,
    /// The simulation loop is gone
    #[error("simulation loop closed")]
    Closed,
    /// The answer was of a different type than asked for
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

// =============================================================================
// REQUEST KINDS
// =============================================================================

/// Read-only questions about the actor's own tank and weapon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TankQuery {
    /// Current hit points
    Hp,
    /// Maximum hit points
    MaxHp,
    /// Left track speed
    LeftTrackSpeed,
    /// Right track speed
    RightTrackSpeed,
    /// Track speed limit
    TrackMaxSpeed,
    /// Body footprint
    TankFootprint,
    /// Body center
    Position,
    /// Heading angle, 0 along +X
    HeadingAngle,
    /// Vision radius
    VisionRange,
    /// Rounds regained per second
    WeaponReloadRate,
    /// Magazine size
    WeaponMaxCapacity,
    /// Rounds ready
    WeaponCurCapacity,
    /// Damage per bullet
    WeaponDamage,
    /// Barrel footprint
    WeaponFootprint,
    /// Body plus barrel
    CombinedFootprint,
    /// Bullet footprint
    BulletFootprint,
    /// Bullet speed
    BulletSpeed,
}

/// Questions about the surroundings, limited by vision range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorldQuery {
    /// Every other element in range
    VisibleElements,
    /// Other tanks in range
    VisibleTanks,
    /// Bullets in range
    VisibleBullets,
    /// Block in grid cell, `None` when the cell is out of range
    BlockAt {
        /// Cell x
        x: i64,
        /// Cell y
        y: i64,
    },
    /// Elements the tank has collided with, in range
    CollidingElements,
    /// Elements visited so far (always empty)
    VisitedElements,
}

/// State-changing commands.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Set left track speed (clamped to the limit)
    SetLeftTrackSpeed(f64),
    /// Set right track speed (clamped to the limit)
    SetRightTrackSpeed(f64),
    /// Fire one round if loaded
    Fire,
}

/// Any request kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Own tank / weapon query
    Tank(TankQuery),
    /// Surroundings query
    World(WorldQuery),
    /// Command
    Command(Command),
    /// A tag the loop does not understand
    Unrecognized(String),
}

impl RequestKind {
    /// Parse a wire tag with numeric parameters, as sent by remote players.
    ///
    /// Unknown tags, or known tags with missing parameters, become
    /// [`RequestKind::Unrecognized`] and are rejected by the loop.
    pub fn parse(tag: &str, params: &[f64]) -> Self {
        use TankQuery::*;

        let tank = RequestKind::Tank;
        match (tag, params) {
            ("TANK_HP", _) => tank(Hp),
            ("TANK_MAX_HP", _) => tank(MaxHp),
            ("TANK_LTRACK_SPEED", _) => tank(LeftTrackSpeed),
            ("TANK_RTRACK_SPEED", _) => tank(RightTrackSpeed),
            ("TANK_TRACK_MAX_SPEED", _) => tank(TrackMaxSpeed),
            ("TANK_COLBOX", _) => tank(TankFootprint),
            ("TANK_POS", _) => tank(Position),
            ("TANK_ANGLE", _) => tank(HeadingAngle),
            ("TANK_VIS_RANGE", _) => tank(VisionRange),
            ("WEAPON_RELOAD_RATE_PER_SEC", _) => tank(WeaponReloadRate),
            ("WEAPON_MAX_CAPACITY", _) => tank(WeaponMaxCapacity),
            ("WEAPON_CUR_CAPACITY", _) => tank(WeaponCurCapacity),
            ("WEAPON_DAMAGE", _) => tank(WeaponDamage),
            ("WEAPON_COLBOX", _) => tank(WeaponFootprint),
            ("COMBINED_COLBOX", _) => tank(CombinedFootprint),
            ("BULLET_COLBOX", _) => tank(BulletFootprint),
            ("BULLET_SPEED", _) => tank(BulletSpeed),
            ("GET_VISIBLE_ELEMENTS", _) => RequestKind::World(WorldQuery::VisibleElements),
            ("GET_VISIBLE_TANKS", _) => RequestKind::World(WorldQuery::VisibleTanks),
            ("GET_VISIBLE_BULLETS", _) => RequestKind::World(WorldQuery::VisibleBullets),
            ("CHECK_BLOCK_AT", [x, y, ..]) if x.is_finite() && y.is_finite() => RequestKind::World(WorldQuery::BlockAt {
                x: *x as i64,
                y: *y as i64,
            }),
            ("CHECK_COLLIDING_GAME_ELES", _) => RequestKind::World(WorldQuery::CollidingElements),
            ("GET_VISITED_ELEMENTS", _) => RequestKind::World(WorldQuery::VisitedElements),
            ("FIRE", _) => RequestKind::Command(Command::Fire),
            ("SET_LTRACK_SPEED", [v, ..]) if v.is_finite() => {
                RequestKind::Command(Command::SetLeftTrackSpeed(*v))
            }
            ("SET_RTRACK_SPEED", [v, ..]) if v.is_finite() => {
                RequestKind::Command(Command::SetRightTrackSpeed(*v))
            }
            (other, _) => RequestKind::Unrecognized(other.to_string()),
        }
    }

    /// Commands expect no reply.
    #[inline]
    pub fn is_command(&self) -> bool {
        matches!(self, RequestKind::Command(_))
    }
}

// =============================================================================
// RESPONSES
// =============================================================================

/// Read-only copy of an element handed to actors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementView {
    /// Element id
    pub uid: ElementId,
    /// Display name
    pub name: String,
    /// Owning player (tanks only)
    pub player: Option<String>,
    /// Hit points
    pub hp: i32,
    /// Base center
    pub position: Vec2,
    /// Rotation
    pub rad: f64,
    /// Full shape
    pub shape: Shape,
}

impl From<&GameElement> for ElementView {
    fn from(e: &GameElement) -> Self {
        Self {
            uid: e.id,
            name: e.serial_name().to_string(),
            player: e.player_name().map(str::to_string),
            hp: e.hp,
            position: e.position(),
            rad: e.shape.angle(),
            shape: e.shape.clone(),
        }
    }
}

/// Answer to a query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Whole number
    Int(i64),
    /// Real number
    Float(f64),
    /// Point
    Point(Vec2),
    /// Shape
    Shape(Shape),
    /// Element list
    Elements(Vec<ElementView>),
    /// Optional block
    Block(Option<ElementView>),
}

impl Response {
    fn mismatch(&self, wanted: &str) -> RequestError {
        RequestError::UnexpectedResponse(format!("wanted {}, got {:?}", wanted, self))
    }

    /// Whole number answer.
    pub fn into_int(self) -> Result<i64, RequestError> {
        match self {
            Response::Int(v) => Ok(v),
            other => Err(other.mismatch("int")),
        }
    }

    /// Real number answer (whole numbers widen).
    pub fn into_float(self) -> Result<f64, RequestError> {
        match self {
            Response::Float(v) => Ok(v),
            Response::Int(v) => Ok(v as f64),
            other => Err(other.mismatch("float")),
        }
    }

    /// Point answer.
    pub fn into_point(self) -> Result<Vec2, RequestError> {
        match self {
            Response::Point(p) => Ok(p),
            other => Err(other.mismatch("point")),
        }
    }

    /// Shape answer.
    pub fn into_shape(self) -> Result<Shape, RequestError> {
        match self {
            Response::Shape(s) => Ok(s),
            other => Err(other.mismatch("shape")),
        }
    }

    /// Element list answer.
    pub fn into_elements(self) -> Result<Vec<ElementView>, RequestError> {
        match self {
            Response::Elements(v) => Ok(v),
            other => Err(other.mismatch("elements")),
        }
    }

    /// Block answer.
    pub fn into_block(self) -> Result<Option<ElementView>, RequestError> {
        match self {
            Response::Block(b) => Ok(b),
            other => Err(other.mismatch("block")),
        }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// One submitted request.
#[derive(Debug)]
pub struct ControllerRequest {
    /// Submitting actor
    pub actor: ActorId,
    /// Submission time in simulation milliseconds
    pub submitted_at: u64,
    /// What is asked
    pub kind: RequestKind,
    /// Reply slot, absent for commands
    pub reply: Option<ReplySender>,
}

impl ControllerRequest {
    /// Query with a fresh reply slot; returns the request and its receiver.
    pub fn query(
        actor: ActorId,
        submitted_at: u64,
        kind: RequestKind,
    ) -> (Self, oneshot::Receiver<Result<Response, RequestError>>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            actor,
            submitted_at,
            kind,
            reply: Some(tx),
        };
        (request, rx)
    }

    /// Fire-and-forget command.
    pub fn command(actor: ActorId, submitted_at: u64, command: Command) -> Self {
        Self {
            actor,
            submitted_at,
            kind: RequestKind::Command(command),
            reply: None,
        }
    }

    /// Fulfil the reply slot, if any. A vanished receiver is ignored.
    pub fn respond(&mut self, answer: Result<Response, RequestError>) {
        if let Some(tx) = self.reply.take() {
            let _ = tx.send(answer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_tags() {
        assert_eq!(RequestKind::parse("TANK_HP", &[]), RequestKind::Tank(TankQuery::Hp));
        assert_eq!(
            RequestKind::parse("CHECK_BLOCK_AT", &[3.0, 4.0]),
            RequestKind::World(WorldQuery::BlockAt { x: 3, y: 4 })
        );
        assert_eq!(
            RequestKind::parse("SET_LTRACK_SPEED", &[0.5]),
            RequestKind::Command(Command::SetLeftTrackSpeed(0.5))
        );
        assert!(RequestKind::parse("FIRE", &[]).is_command());
    }

    #[test]
    fn test_parse_unknown_or_incomplete() {
        assert_eq!(
            RequestKind::parse("SELF_DESTRUCT", &[]),
            RequestKind::Unrecognized("SELF_DESTRUCT".into())
        );
        // missing parameter
        assert_eq!(
            RequestKind::parse("SET_RTRACK_SPEED", &[]),
            RequestKind::Unrecognized("SET_RTRACK_SPEED".into())
        );
    }

    #[test]
    fn test_parse_rejects_non_finite_params() {
        assert_eq!(
            RequestKind::parse("SET_LTRACK_SPEED", &[f64::NAN]),
            RequestKind::Unrecognized("SET_LTRACK_SPEED".into())
        );
        assert_eq!(
            RequestKind::parse("SET_RTRACK_SPEED", &[f64::INFINITY]),
            RequestKind::Unrecognized("SET_RTRACK_SPEED".into())
        );
        assert_eq!(
            RequestKind::parse("CHECK_BLOCK_AT", &[f64::NAN, 2.0]),
            RequestKind::Unrecognized("CHECK_BLOCK_AT".into())
        );
    }

    #[test]
    fn test_respond_once() {
        let (mut req, mut rx) = ControllerRequest::query(0, 5, RequestKind::Tank(TankQuery::Hp));
        req.respond(Ok(Response::Int(100)));
        // second answer goes nowhere
        req.respond(Ok(Response::Int(1)));
        assert_eq!(rx.try_recv().unwrap(), Ok(Response::Int(100)));
    }

    #[test]
    fn test_response_conversions() {
        assert_eq!(Response::Int(3).into_float(), Ok(3.0));
        assert!(Response::Float(1.0).into_int().is_err());
        assert_eq!(Response::Block(None).into_block(), Ok(None));
    }
}
