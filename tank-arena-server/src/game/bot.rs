//! Actors
//!
//! A bot drives one tank through its [`Controller`]. Each bot runs as its
//! own tokio task and is cancelled by the session when its tank is swept.
//! Remote players are represented by [`RemoteProxy`], which is never
//! cancelled on tank loss so the connection can keep spectating.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::game::controller::Controller;
use crate::game::request::{RequestError, Response};

/// A tank driver.
pub trait Bot: Send {
    /// Player name shown in events.
    fn name(&self) -> &str;

    /// Human proxies are not cancelled when their tank is destroyed.
    fn is_human(&self) -> bool {
        false
    }

    /// Drive the tank until the controller stops answering.
    fn run(self: Box<Self>, controller: Controller) -> BoxFuture<'static, ()>;
}

// =============================================================================
// SCRIPTED BOT
// =============================================================================

/// Bot with fixed track speeds that fires on a cadence.
#[derive(Clone, Debug)]
pub struct ScriptedBot {
    name: String,
    left: f64,
    right: f64,
    /// Fire every this many turns, 0 never fires
    fire_every: u32,
    turn: Duration,
}

impl ScriptedBot {
    /// Bot that stands still and never fires.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            left: 0.0,
            right: 0.0,
            fire_every: 0,
            turn: Duration::from_millis(50),
        }
    }

    /// Track speeds to hold.
    pub fn with_tracks(mut self, left: f64, right: f64) -> Self {
        self.left = left;
        self.right = right;
        self
    }

    /// Fire every `turns` turns.
    pub fn firing_every(mut self, turns: u32) -> Self {
        self.fire_every = turns;
        self
    }

    /// Pause between turns.
    pub fn with_turn(mut self, turn: Duration) -> Self {
        self.turn = turn;
        self
    }

    async fn drive(self, controller: Controller) -> Result<(), RequestError> {
        controller.set_left_track_speed(self.left)?;
        controller.set_right_track_speed(self.right)?;

        let mut turn: u32 = 0;
        loop {
            turn = turn.wrapping_add(1);
            if self.fire_every > 0 && turn % self.fire_every == 0 {
                let loaded = controller.weapon_cur_capacity().await?;
                if loaded > 0 {
                    controller.fire()?;
                }
            }
            let hp = controller.hp().await?;
            debug!("{} turn {} hp {}", self.name, turn, hp);
            tokio::time::sleep(self.turn).await;
        }
    }
}

impl Bot for ScriptedBot {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(self: Box<Self>, controller: Controller) -> BoxFuture<'static, ()> {
        let name = self.name.clone();
        async move {
            match self.drive(controller).await {
                Ok(()) => {}
                Err(RequestError::Closed) | Err(RequestError::Dropped) => {
                    debug!("{} stopped: simulation no longer answers", name);
                }
                Err(e) => info!("{} stopped: {}", name, e),
            }
        }
        .boxed()
    }
}

// =============================================================================
// REMOTE PROXY
// =============================================================================

/// A raw wire request from a remote player.
#[derive(Debug)]
pub struct RemoteRequest {
    /// Wire tag, e.g. `TANK_POS`
    pub tag: String,
    /// Numeric parameters
    pub params: Vec<f64>,
    /// Answer slot; `Ok(None)` for commands
    pub reply: oneshot::Sender<Result<Option<Response>, RequestError>>,
}

/// Forwards raw requests from a remote player to the simulation.
#[derive(Debug)]
pub struct RemoteProxy {
    name: String,
    inbox: mpsc::Receiver<RemoteRequest>,
}

impl RemoteProxy {
    /// Proxy plus the sender the transport layer feeds.
    pub fn new(name: impl Into<String>, buffer: usize) -> (Self, mpsc::Sender<RemoteRequest>) {
        let (tx, inbox) = mpsc::channel(buffer);
        (Self { name: name.into(), inbox }, tx)
    }
}

impl Bot for RemoteProxy {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_human(&self) -> bool {
        true
    }

    fn run(mut self: Box<Self>, controller: Controller) -> BoxFuture<'static, ()> {
        async move {
            while let Some(request) = self.inbox.recv().await {
                let answer = controller.raw(&request.tag, &request.params).await;
                let _ = request.reply.send(answer);
            }
            info!("Remote player {} disconnected", self.name);
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::controller::SimClock;
    use crate::game::request::{Command, RequestKind, TankQuery};

    #[tokio::test]
    async fn test_scripted_bot_sets_tracks_then_stops() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new(2, tx, SimClock::start());
        let bot: Box<dyn Bot> = Box::new(ScriptedBot::new("scout").with_tracks(1.0, -1.0));
        assert!(!bot.is_human());
        let task = tokio::spawn(bot.run(controller));

        let left = rx.recv().await.unwrap();
        assert_eq!(left.kind, RequestKind::Command(Command::SetLeftTrackSpeed(1.0)));
        let right = rx.recv().await.unwrap();
        assert_eq!(right.kind, RequestKind::Command(Command::SetRightTrackSpeed(-1.0)));

        // dropping the hp query ends the bot
        let hp = rx.recv().await.unwrap();
        assert_eq!(hp.kind, RequestKind::Tank(TankQuery::Hp));
        drop(hp);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_scripted_bot_fires_when_loaded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new(0, tx, SimClock::start());
        let bot = Box::new(ScriptedBot::new("gunner").firing_every(1));
        let task = tokio::spawn(bot.run(controller));

        rx.recv().await.unwrap();
        rx.recv().await.unwrap();
        let mut ask = rx.recv().await.unwrap();
        assert_eq!(ask.kind, RequestKind::Tank(TankQuery::WeaponCurCapacity));
        ask.respond(Ok(Response::Int(3)));
        let fire = rx.recv().await.unwrap();
        assert_eq!(fire.kind, RequestKind::Command(Command::Fire));

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_remote_proxy_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let controller = Controller::new(5, tx, SimClock::start());
        let (proxy, inbox) = RemoteProxy::new("carol", 4);
        let bot: Box<dyn Bot> = Box::new(proxy);
        assert!(bot.is_human());
        let task = tokio::spawn(bot.run(controller));

        let (reply, answer) = oneshot::channel();
        inbox
            .send(RemoteRequest { tag: "TANK_HP".into(), params: vec![], reply })
            .await
            .unwrap();
        let mut request = rx.recv().await.unwrap();
        assert_eq!(request.actor, 5);
        request.respond(Ok(Response::Int(64)));
        assert_eq!(answer.await.unwrap(), Ok(Some(Response::Int(64))));

        drop(inbox);
        task.await.unwrap();
    }
}
