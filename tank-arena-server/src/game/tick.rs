//! Authoritative Simulation Tick
//!
//! The single mutator of the world. Each tick runs three phases in a fixed
//! order; pacing between ticks belongs to the session.
//!
//! ```text
//!   requests ──▶ 1. handle requests    (sorted by submitted_at, stable)
//!                2. advance movables   (tentative move, reject on any hit)
//!                3. sweep removals     (map, index, actor bindings)
//!                        │
//!                        ▼
//!                   TickResult { events, removed, cancelled_actors }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::f64::consts::PI;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::numeric::{approx_ne, normalize_angle};
use crate::core::rng::DeterministicRng;
use crate::core::vec2::Vec2;
use crate::game::element::{BulletConfig, ElementId, GameElement, TankConfig, WeaponConfig};
use crate::game::events::{EventLog, GameEvent, GameEventData, UpdateMask};
use crate::game::map::{GameMap, MapError};
use crate::game::request::{
    ActorId, Command, ControllerRequest, ElementView, RequestError, RequestKind, Response,
    TankQuery, WorldQuery,
};
use crate::geometry::{Collidable, GeometryError, Shape};
use crate::index::IndexError;
use crate::TICK_MS;

/// Gap between the weapon tip and a freshly fired bullet.
const MUZZLE_GAP: f64 = 0.01;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, in emission order
    pub events: Vec<GameEvent>,
    /// Elements swept this tick
    pub removed: Vec<ElementId>,
    /// Bot actors whose tank was swept; their tasks must be cancelled
    pub cancelled_actors: Vec<ActorId>,
}

/// Configuration for a simulation.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    /// Tick budget in milliseconds
    pub tick_ms: u64,
    /// Tank parameters
    pub tank: TankConfig,
    /// Weapon parameters
    pub weapon: WeaponConfig,
    /// Bullet parameters
    pub bullet: BulletConfig,
    /// Replay flush interval in milliseconds
    pub replay_flush_ms: u64,
    /// Spectator channel capacity
    pub spectator_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: TICK_MS,
            tank: TankConfig::default(),
            weapon: WeaponConfig::default(),
            bullet: BulletConfig::default(),
            replay_flush_ms: 100,
            spectator_capacity: 1024,
        }
    }
}

/// Simulation errors. All of them stop the loop.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// World invariant broken
    #[error(transparent)]
    Map(#[from] MapError),
    /// Index out of sync
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Shape construction failed
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    /// Tick timestamps went backwards
    #[error("clock went backwards: {prev}ms -> {now}ms")]
    NonMonotonicClock {
        /// Previous tick time
        prev: u64,
        /// Offending tick time
        now: u64,
    },
    /// No free spot for a new tank
    #[error("no unoccupied spawn position for {0}")]
    NoSpawnPosition(String),
}

/// Live link between an actor and its tank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActorBinding {
    /// Player name
    pub name: String,
    /// Controlled tank
    pub tank: ElementId,
    /// Human proxies survive the loss of their tank
    pub human: bool,
}

/// The simulation state and its side tables.
#[derive(Debug)]
pub struct Simulation {
    map: GameMap,
    config: SimulationConfig,
    actors: BTreeMap<ActorId, ActorBinding>,
    tank_owner: BTreeMap<ElementId, ActorId>,
    /// Collision history per element, deduplicated every tick
    last_collided: BTreeMap<ElementId, Vec<ElementId>>,
    log: EventLog,
    next_actor: ActorId,
    last_tick_ms: u64,
    ticks: u64,
}

impl Simulation {
    /// Simulation over `map`; the world-init event is logged at t=0.
    pub fn new(map: GameMap, config: SimulationConfig) -> Self {
        let mut log = EventLog::new();
        log.push(0, GameEventData::world_init(&map));
        for block in map.elements() {
            log.push(0, GameEventData::spawn(block));
        }
        Self {
            map,
            config,
            actors: BTreeMap::new(),
            tank_owner: BTreeMap::new(),
            last_collided: BTreeMap::new(),
            log,
            next_actor: 0,
            last_tick_ms: 0,
            ticks: 0,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The world.
    pub fn map(&self) -> &GameMap {
        &self.map
    }

    /// Mutable world, for setup and tests.
    pub fn map_mut(&mut self) -> &mut GameMap {
        &mut self.map
    }

    /// Configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Binding of an actor, if its tank is alive.
    pub fn binding(&self, actor: ActorId) -> Option<&ActorBinding> {
        self.actors.get(&actor)
    }

    /// Number of bound actors.
    pub fn live_actors(&self) -> usize {
        self.actors.len()
    }

    /// Ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Time of the last tick.
    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }

    /// Take events logged outside a tick (setup, spawns).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        self.log.take()
    }

    // =========================================================================
    // Spawning
    // =========================================================================

    /// Spawn a tank for a new actor at a random free position.
    pub fn spawn_tank(
        &mut self,
        name: &str,
        human: bool,
        rng: &mut DeterministicRng,
        now_ms: u64,
    ) -> Result<(ActorId, ElementId), SimulationError> {
        let probe = GameElement::tank(
            ElementId(0),
            name,
            Vec2::ZERO,
            &self.config.tank,
            &self.config.weapon,
            &self.config.bullet,
        )?;
        // the footprint is placed by its rotation center, which is the body center
        let center = self
            .map
            .unoccupied_random_position(&probe.shape, rng)
            .ok_or_else(|| SimulationError::NoSpawnPosition(name.to_string()))?;
        self.spawn_tank_at(name, human, center, now_ms)
    }

    /// Spawn a tank for a new actor with its body centered on `center`.
    pub fn spawn_tank_at(
        &mut self,
        name: &str,
        human: bool,
        center: Vec2,
        now_ms: u64,
    ) -> Result<(ActorId, ElementId), SimulationError> {
        let id = self.map.next_id();
        let tank = GameElement::tank(
            id,
            name,
            center,
            &self.config.tank,
            &self.config.weapon,
            &self.config.bullet,
        )?;
        self.map.add_element(tank)?;
        if let Some(tank) = self.map.get(id) {
            self.log.push(now_ms, GameEventData::spawn(tank));
        }

        let actor = self.next_actor;
        self.next_actor += 1;
        self.actors.insert(
            actor,
            ActorBinding {
                name: name.to_string(),
                tank: id,
                human,
            },
        );
        self.tank_owner.insert(id, actor);
        info!("Spawned tank {} for {} (actor {}) at {}", id, name, actor, center);
        Ok((actor, id))
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Run one tick at simulation time `now_ms`.
    ///
    /// `requests` are everything drained from the request queue since the
    /// last tick. An error leaves the world in an unspecified state and the
    /// loop must stop.
    pub fn tick(
        &mut self,
        now_ms: u64,
        mut requests: Vec<ControllerRequest>,
    ) -> Result<TickResult, SimulationError> {
        if now_ms < self.last_tick_ms {
            return Err(SimulationError::NonMonotonicClock {
                prev: self.last_tick_ms,
                now: now_ms,
            });
        }
        let dt = (now_ms - self.last_tick_ms) as f64 / 1000.0;
        let mut result = TickResult::default();

        // 1. Requests, in submission order (sort is stable: ties keep arrival order)
        requests.sort_by_key(|r| r.submitted_at);
        for request in requests {
            self.handle_request(request, now_ms)?;
        }

        // 2. Movement and collisions
        self.advance(dt, now_ms)?;
        for hits in self.last_collided.values_mut() {
            hits.sort();
            hits.dedup();
        }

        // 3. Removals
        self.sweep(now_ms, &mut result)?;

        self.last_tick_ms = now_ms;
        self.ticks += 1;

        #[cfg(feature = "debug-tracing")]
        debug!(
            "tick {} at {}ms: {} elements, index depth {}, {} partitions",
            self.ticks,
            now_ms,
            self.map.len(),
            self.map.index().depth(),
            self.map.index().partition_bounds().len()
        );

        result.events = self.log.take();
        Ok(result)
    }

    /// Answer or apply one request.
    fn handle_request(
        &mut self,
        mut request: ControllerRequest,
        now_ms: u64,
    ) -> Result<(), SimulationError> {
        let Some(tank_id) = self.actors.get(&request.actor).map(|b| b.tank) else {
            // stale actor: dropping the request drops its reply slot
            debug!("Dropping request from unbound actor {}", request.actor);
            return Ok(());
        };
        if self.map.get(tank_id).is_none() {
            return Ok(());
        }

        match &request.kind {
            RequestKind::Command(command) => self.apply_command(tank_id, *command, now_ms)?,
            RequestKind::Unrecognized(tag) => {
                warn!("Actor {} sent unknown request {:?}", request.actor, tag);
                let tag = tag.clone();
                request.respond(Err(RequestError::InvalidKind(tag)));
            }
            kind => {
                let answer = self.answer(tank_id, kind);
                request.respond(answer);
            }
        }
        Ok(())
    }

    fn apply_command(
        &mut self,
        tank_id: ElementId,
        command: Command,
        now_ms: u64,
    ) -> Result<(), SimulationError> {
        match command {
            Command::SetLeftTrackSpeed(v) | Command::SetRightTrackSpeed(v) if !v.is_finite() => {
                warn!("Tank {} ignored non-finite track speed {}", tank_id, v);
            }
            Command::SetLeftTrackSpeed(v) | Command::SetRightTrackSpeed(v) => {
                if let Some(tank) = self.map.get_mut(tank_id).and_then(|e| e.as_tank_mut()) {
                    let v = v.clamp(-tank.track_max_speed, tank.track_max_speed);
                    if matches!(command, Command::SetLeftTrackSpeed(_)) {
                        tank.left_track = v;
                    } else {
                        tank.right_track = v;
                    }
                }
            }
            Command::Fire => self.fire(tank_id, now_ms)?,
        }
        Ok(())
    }

    /// Spawn a bullet just ahead of the weapon tip if a round is loaded.
    fn fire(&mut self, tank_id: ElementId, now_ms: u64) -> Result<(), SimulationError> {
        let Some(element) = self.map.get(tank_id) else {
            return Ok(());
        };
        let Some(tank) = element.as_tank() else {
            return Ok(());
        };
        if tank.weapon.rounds() == 0 {
            return Ok(());
        }

        let angle = element.shape.angle();
        let barrel = weapon_footprint(element).map(|w| w.height()).unwrap_or(0.0);
        let bullet_cfg = tank.weapon.bullet.clone();
        let damage = tank.weapon.damage;
        let reach = element.shape.height() / 2.0 + barrel + MUZZLE_GAP + bullet_cfg.length / 2.0;
        let center = element.position() + Vec2::UP.rotate(angle) * reach;

        let id = self.map.next_id();
        let bullet = GameElement::bullet(id, center, angle, &bullet_cfg, damage);
        if !self.map.bound().encloses(&bullet.shape.bounding_rect()) {
            debug!("Tank {} fired into the wall at {}", tank_id, center);
            return Ok(());
        }

        let loaded = self
            .map
            .get_mut(tank_id)
            .and_then(|e| e.as_tank_mut())
            .map(|t| t.weapon.try_fire())
            .unwrap_or(false);
        if !loaded {
            return Ok(());
        }

        self.map.add_element(bullet)?;
        if let Some(bullet) = self.map.get(id) {
            self.log.push(now_ms, GameEventData::spawn(bullet));
        }
        Ok(())
    }

    /// Answer a query about the tank `tank_id`.
    fn answer(&self, tank_id: ElementId, kind: &RequestKind) -> Result<Response, RequestError> {
        let element = self.map.get(tank_id).ok_or(RequestError::Dropped)?;
        let tank = element
            .as_tank()
            .ok_or_else(|| RequestError::InvalidKind(format!("{} is not a tank", tank_id)))?;
        let weapon = &tank.weapon;

        let response = match kind {
            RequestKind::Tank(query) => match query {
                TankQuery::Hp => Response::Int(element.hp as i64),
                TankQuery::MaxHp => Response::Int(tank.max_hp as i64),
                TankQuery::LeftTrackSpeed => Response::Float(tank.left_track),
                TankQuery::RightTrackSpeed => Response::Float(tank.right_track),
                TankQuery::TrackMaxSpeed => Response::Float(tank.track_max_speed),
                TankQuery::TankFootprint => Response::Shape(body_footprint(element)),
                TankQuery::Position => Response::Point(element.position()),
                TankQuery::HeadingAngle => {
                    Response::Float(normalize_angle(element.shape.angle() + PI / 2.0))
                }
                TankQuery::VisionRange => Response::Float(tank.vision_range),
                TankQuery::WeaponReloadRate => Response::Float(weapon.reload_rate),
                TankQuery::WeaponMaxCapacity => Response::Int(weapon.max_capacity as i64),
                TankQuery::WeaponCurCapacity => Response::Int(weapon.rounds() as i64),
                TankQuery::WeaponDamage => Response::Int(weapon.damage as i64),
                TankQuery::WeaponFootprint => Response::Shape(
                    weapon_footprint(element).unwrap_or_else(|| body_footprint(element)),
                ),
                TankQuery::CombinedFootprint => Response::Shape(element.shape.clone()),
                TankQuery::BulletFootprint => Response::Shape(weapon.bullet.footprint().into()),
                TankQuery::BulletSpeed => Response::Float(weapon.bullet.speed),
            },
            RequestKind::World(query) => {
                let origin = element.position();
                let range = tank.vision_range;
                let in_range = |e: &GameElement| e.position().distance(origin) <= range;
                match query {
                    WorldQuery::VisibleElements => Response::Elements(
                        self.map
                            .elements()
                            .filter(|e| e.id != tank_id && in_range(*e))
                            .map(ElementView::from)
                            .collect(),
                    ),
                    WorldQuery::VisibleTanks => Response::Elements(
                        self.map
                            .tanks()
                            .filter(|e| e.id != tank_id && in_range(*e))
                            .map(ElementView::from)
                            .collect(),
                    ),
                    WorldQuery::VisibleBullets => Response::Elements(
                        self.map
                            .bullets()
                            .filter(|e| in_range(*e))
                            .map(ElementView::from)
                            .collect(),
                    ),
                    WorldQuery::BlockAt { x, y } => {
                        let cell = Vec2::new(*x as f64, *y as f64);
                        if cell.distance(origin) > range {
                            Response::Block(None)
                        } else {
                            Response::Block(self.map.block_at(*x, *y).map(ElementView::from))
                        }
                    }
                    WorldQuery::CollidingElements => Response::Elements(
                        self.last_collided
                            .get(&tank_id)
                            .into_iter()
                            .flatten()
                            .filter_map(|id| self.map.get(*id))
                            .filter(|e| in_range(*e))
                            .map(ElementView::from)
                            .collect(),
                    ),
                    WorldQuery::VisitedElements => Response::Elements(Vec::new()),
                }
            }
            RequestKind::Command(_) | RequestKind::Unrecognized(_) => {
                return Err(RequestError::InvalidKind(format!("{:?} is not a query", kind)));
            }
        };
        Ok(response)
    }

    /// Move every time-updatable element, rejecting moves that hit anything.
    ///
    /// Hit point changes are reported once per element after every element
    /// has moved, however many collisions it took part in.
    fn advance(&mut self, dt: f64, now_ms: u64) -> Result<(), SimulationError> {
        let mut hp_changed = BTreeSet::new();
        for id in self.map.time_updatable_ids() {
            let (before, next) = match self.map.get_mut(id) {
                Some(element) if element.is_alive() => {
                    element.update_by_time(dt);
                    if !element.will_move() {
                        continue;
                    }
                    let before = (element.position(), element.shape.angle());
                    (before, element.shape_after_move(dt))
                }
                _ => continue,
            };

            let hits: Vec<ElementId> = self
                .map
                .collided_with(id, &next)
                .into_iter()
                .filter(|other| self.map.get(*other).map(|e| e.is_alive()).unwrap_or(false))
                .collect();

            if !hits.is_empty() {
                for other in hits {
                    let outcome = self.map.resolve_collision(id, other);
                    self.last_collided.entry(id).or_default().push(other);
                    self.last_collided.entry(other).or_default().push(id);
                    if outcome.first_hp_changed {
                        hp_changed.insert(id);
                    }
                    if outcome.second_hp_changed {
                        hp_changed.insert(other);
                    }
                }
                continue;
            }

            let (pos, angle) = (next.base_center(), next.angle());
            let mask = UpdateMask {
                hp: false,
                x: approx_ne(before.0.x, pos.x),
                y: approx_ne(before.0.y, pos.y),
                rad: approx_ne(before.1, angle),
            };
            if !mask.any() {
                continue;
            }

            if self.map.move_element(id, next)? {
                self.emit_update(id, mask, now_ms);
            } else if let Some(element) = self.map.get_mut(id) {
                // bullets leaving the world are spent, tanks just stop
                if element.is_bullet() {
                    element.mark_removed();
                }
            }
        }

        for id in hp_changed {
            self.emit_update(id, UpdateMask::HP, now_ms);
        }
        Ok(())
    }

    /// Remove destroyed elements and release their actors.
    fn sweep(&mut self, now_ms: u64, result: &mut TickResult) -> Result<(), SimulationError> {
        let doomed: Vec<ElementId> = self
            .map
            .elements()
            .filter(|e| !e.is_alive())
            .map(|e| e.id)
            .collect();

        for id in doomed {
            let element = self.map.remove_element(id)?;
            self.last_collided.remove(&id);
            for hits in self.last_collided.values_mut() {
                hits.retain(|other| *other != id);
            }

            if let Some(actor) = self.tank_owner.remove(&id) {
                if let Some(binding) = self.actors.remove(&actor) {
                    info!(
                        "Tank {} of {} destroyed (actor {}, human: {})",
                        id, binding.name, actor, binding.human
                    );
                    if !binding.human {
                        result.cancelled_actors.push(actor);
                    }
                }
            } else {
                debug!("Removed {} {}", element.serial_name(), id);
            }

            self.log.push(now_ms, GameEventData::removed(id));
            result.removed.push(id);
        }
        Ok(())
    }

    fn emit_update(&mut self, id: ElementId, mask: UpdateMask, now_ms: u64) {
        if let Some(element) = self.map.get(id) {
            self.log.push(now_ms, GameEventData::update(element, mask));
        }
    }
}

/// Tank body, the base part of its composite.
fn body_footprint(element: &GameElement) -> Shape {
    match &element.shape {
        Shape::MultiPart(m) => m.base().clone().into(),
        other => other.clone(),
    }
}

/// Gun barrel, the second part of a tank composite.
fn weapon_footprint(element: &GameElement) -> Option<Shape> {
    match &element.shape {
        Shape::MultiPart(m) => m.part(1).map(|p| p.clone().into()),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================
