//! Match Session
//!
//! Owns one simulation and everything around it: actor tasks, the request
//! queue, tick pacing, the spectator stream and the replay saver.
//!
//! ```text
//!  bot tasks ──ControllerRequest──▶ request queue
//!                                        │ drained each tick
//!                                        ▼
//!  interval(tick_ms, Skip) ──────▶ Simulation::tick
//!                                        │ events
//!                    ┌───────────────────┴──────────────┐
//!                    ▼                                  ▼
//!           spectators (broadcast)           replay saver (mpsc, 100ms)
//! ```
//!
//! Shutdown (signal, tick limit or simulation error): abort actor tasks,
//! publish pending events, close the saver channel, await the terminated
//! replay.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::core::rng::{derive_match_seed, DeterministicRng};
use crate::game::bot::Bot;
use crate::game::controller::{Controller, RequestReceiver, RequestSender, SimClock};
use crate::game::events::GameEvent;
use crate::game::map::GameMap;
use crate::game::replay::{run_saver, ReplayError, ReplayWriter};
use crate::game::request::ActorId;
use crate::game::tick::{Simulation, SimulationConfig, SimulationError};

/// Unique match identifier.
pub type MatchId = [u8; 16];

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Simulation stopped
    #[error("simulation: {0}")]
    Simulation(#[from] SimulationError),
    /// Replay could not be written
    #[error("replay: {0}")]
    Replay(#[from] ReplayError),
    /// Replay saver task panicked or was cancelled
    #[error("replay saver task: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Summary of a finished match.
#[derive(Debug)]
pub struct SessionReport<W> {
    /// Match id
    pub match_id: MatchId,
    /// Ticks run
    pub ticks: u64,
    /// Events published
    pub events: usize,
    /// Replay sink, array terminated
    pub replay: W,
}

/// One running match.
pub struct GameSession {
    match_id: MatchId,
    sim: Simulation,
    clock: SimClock,
    requests_tx: RequestSender,
    requests_rx: RequestReceiver,
    /// Bots waiting for `run` to start them
    pending: Vec<(ActorId, Box<dyn Bot>)>,
    actors: BTreeMap<ActorId, JoinHandle<()>>,
    spectators: broadcast::Sender<GameEvent>,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
    published: usize,
}

impl GameSession {
    /// Session over `map` with one tank per bot, placed from a seed derived
    /// from the match id and the roster.
    pub fn new(
        map: GameMap,
        config: SimulationConfig,
        bots: Vec<Box<dyn Bot>>,
    ) -> Result<Self, SessionError> {
        let match_id = uuid::Uuid::new_v4().into_bytes();
        let names: Vec<&str> = bots.iter().map(|b| b.name()).collect();
        let seed = derive_match_seed(&match_id, &names);
        let mut rng = DeterministicRng::new(seed);
        info!(
            "Match {} with {} actors, seed {:016x}",
            hex::encode(&match_id[..4]),
            bots.len(),
            seed
        );

        let (spectators, _) = broadcast::channel(config.spectator_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let mut sim = Simulation::new(map, config);
        let mut pending = Vec::with_capacity(bots.len());
        for bot in bots {
            let (actor, _) = sim.spawn_tank(bot.name(), bot.is_human(), &mut rng, 0)?;
            pending.push((actor, bot));
        }

        Ok(Self {
            match_id,
            sim,
            clock: SimClock::start(),
            requests_tx,
            requests_rx,
            pending,
            actors: BTreeMap::new(),
            spectators,
            shutdown_tx,
            shutdown_rx,
            published: 0,
        })
    }

    /// Match id.
    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// The simulation.
    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    /// Receive every event as it is published.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.spectators.subscribe()
    }

    /// Sender that stops the session when signalled.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run until shutdown, `max_ticks` ticks or a simulation error, writing
    /// every event to `replay`.
    ///
    /// The replay is terminated in every case; a simulation error is
    /// returned after that.
    #[instrument(skip_all)]
    pub async fn run<W>(
        mut self,
        replay: ReplayWriter<W>,
        max_ticks: Option<u64>,
    ) -> Result<SessionReport<W>, SessionError>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let config = self.sim.config().clone();
        let (saver_tx, saver_rx) = mpsc::unbounded_channel();
        let saver = tokio::spawn(run_saver(
            replay,
            saver_rx,
            Duration::from_millis(config.replay_flush_ms.max(1)),
        ));

        self.clock = SimClock::start();
        for (actor, bot) in std::mem::take(&mut self.pending) {
            let controller = Controller::new(actor, self.requests_tx.clone(), self.clock);
            debug!("Starting actor {} ({})", actor, bot.name());
            self.actors.insert(actor, tokio::spawn(bot.run(controller)));
        }

        let setup = self.sim.take_events();
        self.publish(setup, &saver_tx);

        let mut ticker = interval(Duration::from_millis(config.tick_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome: Result<(), SimulationError> = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break Ok(());
                }
            }

            let mut requests = Vec::new();
            while let Ok(request) = self.requests_rx.try_recv() {
                requests.push(request);
            }

            match self.sim.tick(self.clock.now_ms(), requests) {
                Ok(result) => {
                    for actor in result.cancelled_actors {
                        if let Some(handle) = self.actors.remove(&actor) {
                            handle.abort();
                            info!("Actor {} cancelled, its tank is gone", actor);
                        }
                    }
                    self.publish(result.events, &saver_tx);
                }
                Err(e) => {
                    error!("Simulation stopped: {}", e);
                    break Err(e);
                }
            }

            if matches!(max_ticks, Some(limit) if self.sim.ticks() >= limit) {
                info!("Tick limit reached");
                break Ok(());
            }
        };

        for (actor, handle) in std::mem::take(&mut self.actors) {
            handle.abort();
            debug!("Actor {} stopped", actor);
        }
        let rest = self.sim.take_events();
        self.publish(rest, &saver_tx);

        // closing the channel tells the saver to finish the array
        drop(saver_tx);
        let replay = saver.await??;
        info!(
            "Match {} finished after {} ticks, {} events",
            hex::encode(&self.match_id[..4]),
            self.sim.ticks(),
            self.published
        );

        outcome?;
        Ok(SessionReport {
            match_id: self.match_id,
            ticks: self.sim.ticks(),
            events: self.published,
            replay,
        })
    }

    fn publish(&mut self, events: Vec<GameEvent>, saver: &mpsc::UnboundedSender<GameEvent>) {
        for event in events {
            self.published += 1;
            // no spectators is fine
            let _ = self.spectators.send(event.clone());
            if saver.send(event).is_err() {
                error!("Replay saver is gone, event dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bot::ScriptedBot;
    use crate::game::replay::is_terminated;
    use serde_json::Value;

    fn bots() -> Vec<Box<dyn Bot>> {
        vec![
            Box::new(ScriptedBot::new("alice").with_tracks(1.0, 1.0).firing_every(2)),
            Box::new(ScriptedBot::new("bob").with_tracks(-0.5, 0.5)),
        ]
    }

    #[tokio::test]
    async fn test_session_runs_to_tick_limit() {
        let map = GameMap::bordered(12, 12).unwrap();
        let session = GameSession::new(map, SimulationConfig::default(), bots()).unwrap();
        assert_eq!(session.simulation().live_actors(), 2);

        let replay = ReplayWriter::open(Vec::new()).await.unwrap();
        let report = session.run(replay, Some(5)).await.unwrap();
        assert_eq!(report.ticks, 5);

        let text = String::from_utf8(report.replay).unwrap();
        assert!(is_terminated(&text));
        let parsed: Vec<Value> = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), report.events);
        assert_eq!(parsed[0]["type"], "MapCrt");
        let tanks = parsed
            .iter()
            .filter(|v| v["type"] == "EleCrt" && v["name"] == "Tank")
            .count();
        assert_eq!(tanks, 2);
    }

    #[tokio::test]
    async fn test_shutdown_signal_finalizes_replay() {
        let map = GameMap::bordered(10, 10).unwrap();
        let session = GameSession::new(map, SimulationConfig::default(), bots()).unwrap();
        let shutdown = session.shutdown_handle();

        let replay = ReplayWriter::open(Vec::new()).await.unwrap();
        let running = tokio::spawn(session.run(replay, None));
        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.send(()).unwrap();

        let report = running.await.unwrap().unwrap();
        assert!(report.ticks > 0);
        let parsed: Vec<Value> = serde_json::from_slice(&report.replay).unwrap();
        assert_eq!(parsed.len(), report.events);
    }

    #[tokio::test]
    async fn test_spectators_see_world_init_first() {
        let map = GameMap::bordered(8, 8).unwrap();
        let session = GameSession::new(map, SimulationConfig::default(), Vec::new()).unwrap();
        let mut spectator = session.subscribe();

        let replay = ReplayWriter::open(Vec::new()).await.unwrap();
        session.run(replay, Some(1)).await.unwrap();

        let first = spectator.recv().await.unwrap();
        assert_eq!(first.tag(), "MapCrt");
        // 28 wall blocks follow
        let mut blocks = 0;
        while let Ok(event) = spectator.try_recv() {
            if event.tag() == "EleCrt" {
                blocks += 1;
            }
        }
        assert_eq!(blocks, 28);
    }

    #[test]
    fn test_crowded_map_refuses_spawn() {
        let grid = vec![vec![true; 4]; 4];
        let map = GameMap::from_grid(&grid).unwrap();
        let result = GameSession::new(map, SimulationConfig::default(), bots());
        assert!(matches!(
            result,
            Err(SessionError::Simulation(SimulationError::NoSpawnPosition(_)))
        ));
    }
}
