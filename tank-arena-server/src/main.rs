//! Tank Arena Server
//!
//! Runs a demo match between scripted bots on a walled arena and records
//! the replay under `replays/`. Stops on Ctrl-C or after
//! `TANK_ARENA_MAX_TICKS` ticks when that variable is set.

use std::path::Path;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tank_arena::{
    GameMap, GameSession, SimulationConfig, TICK_MS, VERSION,
    game::{
        bot::{Bot, ScriptedBot},
        replay::create_replay_file,
    },
};

/// Arena side length in cells.
const ARENA_SIZE: usize = 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Tank Arena Server v{}", VERSION);
    info!("Tick budget: {} ms", TICK_MS);

    let max_ticks = match std::env::var("TANK_ARENA_MAX_TICKS") {
        Ok(v) => Some(v.parse::<u64>().context("TANK_ARENA_MAX_TICKS must be a number")?),
        Err(_) => None,
    };

    let map = GameMap::bordered(ARENA_SIZE, ARENA_SIZE)?;
    let bots: Vec<Box<dyn Bot>> = vec![
        Box::new(ScriptedBot::new("circler").with_tracks(1.2, 0.8).firing_every(10)),
        Box::new(ScriptedBot::new("spinner").with_tracks(-0.6, 0.6).firing_every(4)),
        Box::new(ScriptedBot::new("runner").with_tracks(1.5, 1.5)),
        Box::new(ScriptedBot::new("turret").firing_every(6)),
    ];

    let session = GameSession::new(map, SimulationConfig::default(), bots)?;
    let (path, replay) = create_replay_file(Path::new("replays")).await?;

    let shutdown = session.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    let report = session.run(replay, max_ticks).await?;
    info!(
        "Match {} done: {} ticks, {} events, replay at {}",
        hex::encode(&report.match_id[..4]),
        report.ticks,
        report.events,
        path.display()
    );
    Ok(())
}
