//! Progress poller: once a second, reads the engine's position and volume
//! and pushes a transport update.  Read-only with respect to the session.

use std::sync::Arc;
use std::time::Duration;

use navi_proto::error::EngineError;
use navi_proto::protocol::{PlaybackStatus, VolumeLevel};
use tokio::time::{timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::display::{DisplayUpdate, ProgressSnapshot, RedrawQueue, Transport};
use crate::engine::AudioEngine;
use crate::session::SessionState;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const QUERY_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Loading,
    QueryFailed,
    /// Duration unknown or zero.
    NoDuration,
    NegativePosition,
}

/// What a single tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    Idle,
    Paused,
    Progress(ProgressSnapshot),
}

pub struct ProgressPoller {
    session: Arc<SessionState>,
    engine: Arc<dyn AudioEngine>,
    redraw: RedrawQueue,
    query_timeout: Duration,
}

impl ProgressPoller {
    pub fn new(session: Arc<SessionState>, engine: Arc<dyn AudioEngine>, redraw: RedrawQueue) -> Self {
        Self {
            session,
            engine,
            redraw,
            query_timeout: QUERY_TIMEOUT,
        }
    }

    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let outcome = self.tick().await;
                    trace!("poller tick: {:?}", outcome);
                }
            }
        }
        debug!("progress poller exiting");
    }

    pub async fn tick(&self) -> TickOutcome {
        let snapshot = self.session.snapshot();
        if snapshot.loading() {
            return TickOutcome::Skipped(SkipReason::Loading);
        }

        // Only an answered "no session" clears the display.
        match timeout(self.query_timeout, self.engine.has_session()).await {
            Ok(true) => {}
            Ok(false) => {
                self.redraw.enqueue(DisplayUpdate::Transport(Transport::Idle));
                return TickOutcome::Idle;
            }
            Err(_) => return TickOutcome::Skipped(SkipReason::QueryFailed),
        }

        if matches!(snapshot.status, PlaybackStatus::Paused(_)) {
            return match self.read_volume().await {
                Ok(volume) => {
                    self.redraw
                        .enqueue(DisplayUpdate::Transport(Transport::Paused { volume }));
                    TickOutcome::Paused
                }
                Err(_) => TickOutcome::Skipped(SkipReason::QueryFailed),
            };
        }

        let reading = timeout(self.query_timeout, async {
            let position = self.engine.get_f64("time-pos").await?;
            let duration = self.engine.get_f64("duration").await?;
            let volume = self.engine.get_f64("volume").await?;
            let muted = self.engine.get_flag("mute").await?;
            Ok::<_, EngineError>((position, duration, VolumeLevel::new(volume, muted)))
        })
        .await;

        let (position, duration, volume) = match reading {
            Ok(Ok(r)) => r,
            _ => return TickOutcome::Skipped(SkipReason::QueryFailed),
        };

        let progress = match compute_progress(position, duration) {
            Ok(p) => p,
            Err(reason) => return TickOutcome::Skipped(reason),
        };

        let snap = ProgressSnapshot {
            position,
            duration,
            progress,
            volume,
        };
        self.redraw
            .enqueue(DisplayUpdate::Transport(Transport::Progress(snap.clone())));
        TickOutcome::Progress(snap)
    }

    /// Volume and mute, each under its own bound.
    async fn read_volume(&self) -> Result<VolumeLevel, EngineError> {
        let volume = timeout(self.query_timeout, self.engine.get_f64("volume"))
            .await
            .map_err(|_| self.timeout_error("volume"))??;
        let muted = timeout(self.query_timeout, self.engine.get_flag("mute"))
            .await
            .map_err(|_| self.timeout_error("mute"))??;
        Ok(VolumeLevel::new(volume, muted))
    }

    fn timeout_error(&self, operation: &'static str) -> EngineError {
        EngineError::Timeout {
            operation,
            timeout_ms: self.query_timeout.as_millis(),
        }
    }
}

/// `position / duration` clamped to 0..=1.
pub fn compute_progress(position: f64, duration: f64) -> Result<f64, SkipReason> {
    if duration.is_nan() || duration <= 0.0 {
        return Err(SkipReason::NoDuration);
    }
    if position < 0.0 {
        return Err(SkipReason::NegativePosition);
    }
    Ok((position / duration).clamp(0.0, 1.0))
}
