//! Actor Controller
//!
//! Handle that an actor task uses to talk to the simulation loop. Queries
//! wait on their own one-shot reply and never block the loop; commands are
//! fire-and-forget.

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::core::vec2::Vec2;
use crate::game::request::{
    ActorId, Command, ControllerRequest, ElementView, RequestError, RequestKind, Response,
    TankQuery, WorldQuery,
};
use crate::geometry::Shape;

/// Sending half of the shared request queue.
pub type RequestSender = mpsc::UnboundedSender<ControllerRequest>;

/// Receiving half of the shared request queue.
pub type RequestReceiver = mpsc::UnboundedReceiver<ControllerRequest>;

/// Milliseconds since the simulation started, on the tokio clock.
#[derive(Clone, Copy, Debug)]
pub struct SimClock {
    start: Instant,
}

impl SimClock {
    /// Clock starting now.
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    /// Elapsed simulation milliseconds.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Request handle owned by one actor task.
#[derive(Clone, Debug)]
pub struct Controller {
    actor: ActorId,
    tx: RequestSender,
    clock: SimClock,
}

impl Controller {
    /// Handle for `actor` submitting into `tx`.
    pub fn new(actor: ActorId, tx: RequestSender, clock: SimClock) -> Self {
        Self { actor, tx, clock }
    }

    /// Actor this handle speaks for.
    #[inline]
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Submit a query and wait for its answer.
    pub async fn query(&self, kind: RequestKind) -> Result<Response, RequestError> {
        let (request, rx) = ControllerRequest::query(self.actor, self.clock.now_ms(), kind);
        self.tx.send(request).map_err(|_| RequestError::Closed)?;
        rx.await.map_err(|_| RequestError::Dropped)?
    }

    /// Submit a command without waiting.
    pub fn command(&self, command: Command) -> Result<(), RequestError> {
        let request = ControllerRequest::command(self.actor, self.clock.now_ms(), command);
        self.tx.send(request).map_err(|_| RequestError::Closed)
    }

    /// Submit a raw wire request (tag plus numeric parameters).
    ///
    /// Commands resolve immediately once queued; everything else waits.
    pub async fn raw(&self, tag: &str, params: &[f64]) -> Result<Option<Response>, RequestError> {
        match RequestKind::parse(tag, params) {
            RequestKind::Command(c) => self.command(c).map(|_| None),
            kind => self.query(kind).await.map(Some),
        }
    }

    async fn tank(&self, q: TankQuery) -> Result<Response, RequestError> {
        self.query(RequestKind::Tank(q)).await
    }

    async fn world(&self, q: WorldQuery) -> Result<Response, RequestError> {
        self.query(RequestKind::World(q)).await
    }

    // =========================================================================
    // Typed queries
    // =========================================================================

    /// Current hit points.
    pub async fn hp(&self) -> Result<i64, RequestError> {
        self.tank(TankQuery::Hp).await?.into_int()
    }

    /// Maximum hit points.
    pub async fn max_hp(&self) -> Result<i64, RequestError> {
        self.tank(TankQuery::MaxHp).await?.into_int()
    }

    /// Left track speed.
    pub async fn left_track_speed(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::LeftTrackSpeed).await?.into_float()
    }

    /// Right track speed.
    pub async fn right_track_speed(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::RightTrackSpeed).await?.into_float()
    }

    /// Track speed limit.
    pub async fn track_max_speed(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::TrackMaxSpeed).await?.into_float()
    }

    /// Body footprint.
    pub async fn tank_footprint(&self) -> Result<Shape, RequestError> {
        self.tank(TankQuery::TankFootprint).await?.into_shape()
    }

    /// Body center.
    pub async fn position(&self) -> Result<Vec2, RequestError> {
        self.tank(TankQuery::Position).await?.into_point()
    }

    /// Heading angle in `[0, 2π)`, 0 along +X.
    pub async fn heading(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::HeadingAngle).await?.into_float()
    }

    /// Vision radius.
    pub async fn vision_range(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::VisionRange).await?.into_float()
    }

    /// Rounds regained per second.
    pub async fn weapon_reload_rate(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::WeaponReloadRate).await?.into_float()
    }

    /// Magazine size.
    pub async fn weapon_max_capacity(&self) -> Result<i64, RequestError> {
        self.tank(TankQuery::WeaponMaxCapacity).await?.into_int()
    }

    /// Rounds ready to fire.
    pub async fn weapon_cur_capacity(&self) -> Result<i64, RequestError> {
        self.tank(TankQuery::WeaponCurCapacity).await?.into_int()
    }

    /// Damage per bullet.
    pub async fn weapon_damage(&self) -> Result<i64, RequestError> {
        self.tank(TankQuery::WeaponDamage).await?.into_int()
    }

    /// Barrel footprint.
    pub async fn weapon_footprint(&self) -> Result<Shape, RequestError> {
        self.tank(TankQuery::WeaponFootprint).await?.into_shape()
    }

    /// Body plus barrel.
    pub async fn combined_footprint(&self) -> Result<Shape, RequestError> {
        self.tank(TankQuery::CombinedFootprint).await?.into_shape()
    }

    /// Bullet footprint.
    pub async fn bullet_footprint(&self) -> Result<Shape, RequestError> {
        self.tank(TankQuery::BulletFootprint).await?.into_shape()
    }

    /// Bullet speed.
    pub async fn bullet_speed(&self) -> Result<f64, RequestError> {
        self.tank(TankQuery::BulletSpeed).await?.into_float()
    }

    /// Other elements within vision range.
    pub async fn visible_elements(&self) -> Result<Vec<ElementView>, RequestError> {
        self.world(WorldQuery::VisibleElements).await?.into_elements()
    }

    /// Other tanks within vision range.
    pub async fn visible_tanks(&self) -> Result<Vec<ElementView>, RequestError> {
        self.world(WorldQuery::VisibleTanks).await?.into_elements()
    }

    /// Bullets within vision range.
    pub async fn visible_bullets(&self) -> Result<Vec<ElementView>, RequestError> {
        self.world(WorldQuery::VisibleBullets).await?.into_elements()
    }

    /// Block at grid cell, `None` when empty or out of range.
    pub async fn block_at(&self, x: i64, y: i64) -> Result<Option<ElementView>, RequestError> {
        self.world(WorldQuery::BlockAt { x, y }).await?.into_block()
    }

    /// Elements this tank has collided with, within vision range.
    pub async fn colliding_elements(&self) -> Result<Vec<ElementView>, RequestError> {
        self.world(WorldQuery::CollidingElements).await?.into_elements()
    }

    /// Elements visited so far.
    pub async fn visited_elements(&self) -> Result<Vec<ElementView>, RequestError> {
        self.world(WorldQuery::VisitedElements).await?.into_elements()
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Set left track speed.
    pub fn set_left_track_speed(&self, speed: f64) -> Result<(), RequestError> {
        self.command(Command::SetLeftTrackSpeed(speed))
    }

    /// Set right track speed.
    pub fn set_right_track_speed(&self, speed: f64) -> Result<(), RequestError> {
        self.command(Command::SetRightTrackSpeed(speed))
    }

    /// Fire one round.
    pub fn fire(&self) -> Result<(), RequestError> {
        self.command(Command::Fire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_round_trip() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new(3, tx, SimClock::start());

        let server = tokio::spawn(async move {
            let mut req = rx.recv().await.unwrap();
            assert_eq!(req.actor, 3);
            assert_eq!(req.kind, RequestKind::Tank(TankQuery::Hp));
            req.respond(Ok(Response::Int(80)));
        });

        assert_eq!(controller.hp().await, Ok(80));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_request() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new(0, tx, SimClock::start());

        let server = tokio::spawn(async move {
            // drop without answering, as the loop does for stale actors
            let _ = rx.recv().await;
        });

        assert_eq!(controller.position().await, Err(RequestError::Dropped));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_loop() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let controller = Controller::new(0, tx, SimClock::start());
        assert_eq!(controller.fire(), Err(RequestError::Closed));
        assert_eq!(controller.hp().await, Err(RequestError::Closed));
    }

    #[tokio::test]
    async fn test_raw_command_needs_no_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new(1, tx, SimClock::start());

        assert_eq!(controller.raw("SET_LTRACK_SPEED", &[1.5]).await, Ok(None));
        let req = rx.recv().await.unwrap();
        assert!(req.reply.is_none());
        assert_eq!(req.kind, RequestKind::Command(Command::SetLeftTrackSpeed(1.5)));
    }
}
