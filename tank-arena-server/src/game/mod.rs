//! Game Logic Module
//!
//! Elements, the world, the simulation loop and everything that talks to it.
//!
//! ## Module Structure
//!
//! - `element`: Tanks, bullets, blocks and their configuration
//! - `collision`: Pairwise collision effects
//! - `map`: World arena, block grid and spatial index
//! - `events`: Game events and the ordered event log
//! - `request`: Commands and queries submitted by actors
//! - `controller`: Typed async handle actors talk through
//! - `bot`: Actor trait, scripted bots and remote proxies
//! - `tick`: Authoritative simulation tick
//! - `replay`: JSON replay writer and saver task
//! - `session`: Tick pacing, actor tasks, spectators, shutdown

pub mod element;
pub mod collision;
pub mod map;
pub mod events;
pub mod request;
pub mod controller;
pub mod bot;
pub mod tick;
pub mod replay;
pub mod session;

// Re-export key types
pub use element::{ElementId, ElementKind, GameElement, RemoveStatus};
pub use map::{GameMap, MapError};
pub use events::{GameEvent, GameEventData, UpdateMask};
pub use request::{ActorId, Command, ControllerRequest, RequestError, RequestKind, Response};
pub use controller::{Controller, SimClock};
pub use bot::{Bot, RemoteProxy, ScriptedBot};
pub use tick::{Simulation, SimulationConfig, SimulationError, TickResult};
pub use session::{GameSession, SessionError, SessionReport};
