//! Replay Log
//!
//! Append-only JSON array of events. The array is opened when the match
//! starts and closed on clean shutdown; a crash leaves it unterminated.
//!
//! ```text
//! [
//! {"t":0,"type":"MapCrt",...},
//! {"t":0,"type":"EleCrt",...},
//! {"t":16,"type":"EleUpd",...}
//! ]
//! ```
//!
//! Events reach the saver task through an unbounded channel and are written
//! in batches every flush interval. Closing the channel is the stop signal:
//! the saver drains what is left, terminates the array and returns.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::game::events::GameEvent;

/// Replay errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Write failed
    #[error("replay io: {0}")]
    Io(#[from] std::io::Error),
    /// Event did not serialize
    #[error("replay encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// Writer for one replay array.
#[derive(Debug)]
pub struct ReplayWriter<W> {
    inner: W,
    written: usize,
}

impl<W: AsyncWrite + Unpin> ReplayWriter<W> {
    /// Open the array.
    pub async fn open(mut inner: W) -> Result<Self, ReplayError> {
        inner.write_all(b"[\n").await?;
        Ok(Self { inner, written: 0 })
    }

    /// Append one event. The separator goes before every entry but the
    /// first, so the array never carries a trailing comma.
    pub async fn write_event(&mut self, event: &GameEvent) -> Result<(), ReplayError> {
        let json = serde_json::to_vec(event)?;
        if self.written > 0 {
            self.inner.write_all(b",\n").await?;
        }
        self.inner.write_all(&json).await?;
        self.written += 1;
        Ok(())
    }

    /// Push buffered bytes to the sink.
    pub async fn flush(&mut self) -> Result<(), ReplayError> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Events written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Close the array and hand back the sink.
    pub async fn finish(mut self) -> Result<W, ReplayError> {
        self.inner.write_all(b"\n]\n").await?;
        self.inner.flush().await?;
        Ok(self.inner)
    }
}

/// Whether a replay was closed cleanly. Unterminated logs are reported,
/// never repaired.
pub fn is_terminated(text: &str) -> bool {
    let text = text.trim();
    text.starts_with('[') && text.ends_with(']')
}

/// Default replay file name for a match started at `started`.
pub fn replay_file_name(started: DateTime<Local>) -> String {
    format!("replay_@{}.json", started.format("%Y-%m-%d_%H-%M-%S%.3f"))
}

/// Create `dir/replay_@<date>_<time>.json` and open the array in it.
pub async fn create_replay_file(
    dir: &Path,
) -> Result<(PathBuf, ReplayWriter<BufWriter<File>>), ReplayError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(replay_file_name(Local::now()));
    let file = File::create(&path).await?;
    let writer = ReplayWriter::open(BufWriter::new(file)).await?;
    info!("Recording replay to {}", path.display());
    Ok((path, writer))
}

/// Background saver: batch events into `writer` every `flush_every` until
/// the channel closes, then terminate the array.
pub async fn run_saver<W: AsyncWrite + Unpin>(
    mut writer: ReplayWriter<W>,
    mut events: mpsc::UnboundedReceiver<GameEvent>,
    flush_every: Duration,
) -> Result<W, ReplayError> {
    let mut ticker = interval(flush_every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        loop {
            match events.try_recv() {
                Ok(event) => writer.write_event(&event).await?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!("Replay saver stopped after {} events", writer.written());
                    return writer.finish().await;
                }
            }
        }
        writer.flush().await?;
        debug!("Replay flushed, {} events so far", writer.written());
    }
}
