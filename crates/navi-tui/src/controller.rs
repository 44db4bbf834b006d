//! Playback controller: the only writer of session state and the only
//! issuer of mutating engine commands.
//!
//! Every operation that touches the engine or the network runs in a spawned
//! task and hands back its `JoinHandle`; callers on the UI path drop it,
//! tests await it.
//!
//! ```text
//!   Idle | Playing(j) | Paused(j) | Failed(j)
//!          │ play_at(i) / advance(Δ) / end-of-track
//!          ▼
//!      Loading(i) ──resolve ok, engine ok──▶ Playing(i) ⇄ Paused(i)
//!          │
//!          └──resolve err/timeout, engine fault──▶ Failed(i)
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use navi_proto::catalog::{CatalogView, SearchOutcome};
use navi_proto::error::{CatalogError, EngineError};
use navi_proto::protocol::{PlaybackStatus, Track, VolumeLevel};
use navi_proto::subsonic::CatalogService;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::display::{DisplayUpdate, NoticeLevel, RedrawQueue};
use crate::engine::{AudioEngine, PropertyValue};
use crate::session::SessionState;

pub type SharedCatalog = Arc<RwLock<CatalogView>>;

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub resolve_timeout: Duration,
    /// Gap between stopping the old track and starting the new one.
    pub settle_delay: Duration,
    pub property_timeout: Duration,
    pub command_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            resolve_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(50),
            property_timeout: Duration::from_millis(200),
            command_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Clone)]
pub struct PlaybackController {
    session: Arc<SessionState>,
    catalog: SharedCatalog,
    service: Arc<dyn CatalogService>,
    engine: Arc<dyn AudioEngine>,
    redraw: RedrawQueue,
    timings: Timings,
    volume_step: f64,
    /// Serializes pause query+toggle pairs.
    pause_lock: Arc<tokio::sync::Mutex<()>>,
}

impl PlaybackController {
    pub fn new(
        session: Arc<SessionState>,
        catalog: SharedCatalog,
        service: Arc<dyn CatalogService>,
        engine: Arc<dyn AudioEngine>,
        redraw: RedrawQueue,
    ) -> Self {
        Self {
            session,
            catalog,
            service,
            engine,
            redraw,
            timings: Timings::default(),
            volume_step: 5.0,
            pause_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_volume_step(mut self, step: f64) -> Self {
        self.volume_step = step;
        self
    }

    pub fn catalog(&self) -> &SharedCatalog {
        &self.catalog
    }

    // ── Loading ───────────────────────────────────────────────────────────────

    /// Start loading catalog entry `index`.  `None` if a load is already in
    /// flight or `index` is out of range.
    pub fn play_at(&self, index: usize) -> Option<JoinHandle<PlaybackStatus>> {
        let handle = self.start_load(|_, view| (index < view.len()).then_some(index));
        if handle.is_none() {
            debug!("play_at({}) rejected", index);
        }
        handle
    }

    /// Map a visible table row to its catalog index and play it.
    pub fn select_row(&self, row: usize) -> Option<JoinHandle<PlaybackStatus>> {
        let index = self.catalog.read().select_row(row)?;
        self.play_at(index)
    }

    /// Move `delta` entries from the current track, wrapping both ways.
    pub fn advance(&self, delta: isize) -> Option<JoinHandle<PlaybackStatus>> {
        self.start_load(|current, view| next_index(current, delta, view.len()))
    }

    pub fn next(&self) -> Option<JoinHandle<PlaybackStatus>> {
        self.advance(1)
    }

    pub fn previous(&self) -> Option<JoinHandle<PlaybackStatus>> {
        self.advance(-1)
    }

    /// The engine finished a track on its own.
    pub fn on_end_of_track(&self) -> Option<JoinHandle<PlaybackStatus>> {
        debug!("end of track");
        self.advance(1)
    }

    /// The engine gave up on the current track after accepting it.  Marks it
    /// failed; a load in flight is left alone.
    pub fn on_load_failed(&self, reason: &str) -> Option<PlaybackStatus> {
        let status = self.session.fail_current()?;
        let track = self.session.snapshot().current_track;
        let title = track.as_ref().map(|t| t.title.clone()).unwrap_or_default();
        warn!("engine dropped {}: {}", title, reason);
        self.redraw.now_playing(status, track);
        self.redraw.notice(
            NoticeLevel::Error,
            format!("Play failed: {} ({})", title, reason),
        );
        Some(status)
    }

    fn start_load<F>(&self, pick: F) -> Option<JoinHandle<PlaybackStatus>>
    where
        F: FnOnce(Option<usize>, &CatalogView) -> Option<usize>,
    {
        let (index, track) = self.session.try_begin_load(|current| {
            let view = self.catalog.read();
            let index = pick(current, &view)?;
            view.get(index).cloned().map(|t| (index, t))
        })?;

        info!("loading #{}: {} - {}", index, track.artist, track.title);
        self.redraw
            .now_playing(PlaybackStatus::Loading(index), Some(track.clone()));

        let this = self.clone();
        Some(tokio::spawn(async move { this.run_load(index, track).await }))
    }

    async fn run_load(self, index: usize, track: Track) -> PlaybackStatus {
        let url = match timeout(
            self.timings.resolve_timeout,
            self.service.resolve_play_url(&track.id),
        )
        .await
        {
            Ok(Ok(url)) => url,
            Ok(Err(e)) => return self.fail_load(index, &track, &e.to_string()),
            Err(_) => {
                let e = CatalogError::ResolutionTimeout {
                    id: track.id.clone(),
                    timeout_ms: self.timings.resolve_timeout.as_millis(),
                };
                return self.fail_load(index, &track, &e.to_string());
            }
        };

        // Engine work runs in its own task so a panic in it lands here as a
        // JoinError instead of unwinding through the session.
        let work = tokio::spawn(start_playback(self.engine.clone(), url, self.timings));
        let outcome = match work.await {
            Ok(result) => result.map_err(into_fault),
            Err(join) => Err(EngineError::Fault(join.to_string())),
        };

        match outcome {
            Ok(()) => {
                let status = self.session.finish_load(index, true);
                info!("playing #{}: {}", index, track.title);
                self.redraw.now_playing(status, Some(track));
                status
            }
            Err(e) => self.fail_load(index, &track, &e.to_string()),
        }
    }

    fn fail_load(&self, index: usize, track: &Track, reason: &str) -> PlaybackStatus {
        warn!("play failed for {} ({}): {}", track.id, track.title, reason);
        let status = self.session.finish_load(index, false);
        self.redraw.now_playing(status, Some(track.clone()));
        self.redraw.notice(
            NoticeLevel::Error,
            format!("Play failed: {} ({})", track.title, reason),
        );
        status
    }

    // ── Pause ─────────────────────────────────────────────────────────────────

    /// Flip between `Playing(i)` and `Paused(i)`.  `None` in any other state.
    ///
    /// The engine's own `pause` flag is read first and wins over the session
    /// if they disagree; then exactly one toggle command is sent.
    pub fn toggle_pause(&self) -> Option<JoinHandle<Result<PlaybackStatus, EngineError>>> {
        let index = match self.session.status() {
            PlaybackStatus::Playing(i) | PlaybackStatus::Paused(i) => i,
            _ => return None,
        };
        let this = self.clone();
        Some(tokio::spawn(async move {
            let result = this.run_toggle_pause(index).await;
            if let Err(e) = &result {
                warn!("pause toggle failed: {}", e);
                this.redraw
                    .notice(NoticeLevel::Error, format!("Pause failed: {}", e));
            }
            result
        }))
    }

    async fn run_toggle_pause(&self, index: usize) -> Result<PlaybackStatus, EngineError> {
        let _guard = self.pause_lock.lock().await;

        let was_paused = match timeout(self.timings.property_timeout, self.engine.get_flag("pause"))
            .await
        {
            Ok(Ok(paused)) => {
                self.session.set_paused(index, paused);
                paused
            }
            _ => {
                debug!("pause query failed, trusting session state");
                self.session.status() == PlaybackStatus::Paused(index)
            }
        };

        // A load may have started while the query was out.
        let current = self.session.status();
        if !matches!(current, PlaybackStatus::Playing(i) | PlaybackStatus::Paused(i) if i == index) {
            debug!("pause toggle dropped, session moved to {:?}", current);
            return Ok(current);
        }

        bounded(
            self.timings.command_timeout,
            "toggle pause",
            self.engine.toggle_pause(),
        )
        .await?;

        let status = self.session.set_paused(index, !was_paused);
        self.redraw
            .now_playing(status, self.session.snapshot().current_track);
        Ok(status)
    }

    // ── Volume ────────────────────────────────────────────────────────────────

    pub fn volume_up(&self) -> JoinHandle<Result<f64, EngineError>> {
        self.adjust_volume(self.volume_step)
    }

    pub fn volume_down(&self) -> JoinHandle<Result<f64, EngineError>> {
        self.adjust_volume(-self.volume_step)
    }

    /// Read `volume`, add `delta`, clamp to 0..=100 and write it back.
    pub fn adjust_volume(&self, delta: f64) -> JoinHandle<Result<f64, EngineError>> {
        let this = self.clone();
        tokio::spawn(async move {
            let result = this.run_adjust_volume(delta).await;
            if let Err(e) = &result {
                warn!("volume change failed: {}", e);
                this.redraw
                    .notice(NoticeLevel::Warning, format!("Volume change failed: {}", e));
            }
            result
        })
    }

    async fn run_adjust_volume(&self, delta: f64) -> Result<f64, EngineError> {
        let t = self.timings;
        let current = bounded(t.property_timeout, "get volume", self.engine.get_f64("volume")).await?;
        let volume = (current + delta).clamp(0.0, 100.0);
        bounded(
            t.command_timeout,
            "set volume",
            self.engine.set_property("volume", PropertyValue::Double(volume)),
        )
        .await?;

        let muted = bounded(t.property_timeout, "get mute", self.engine.get_flag("mute"))
            .await
            .unwrap_or(false);
        self.redraw
            .enqueue(DisplayUpdate::Volume(VolumeLevel::new(volume, muted)));
        Ok(volume)
    }

    /// Negate `mute`.  Resolves to the new mute state.
    pub fn toggle_mute(&self) -> JoinHandle<Result<bool, EngineError>> {
        let this = self.clone();
        tokio::spawn(async move {
            let result = this.run_toggle_mute().await;
            if let Err(e) = &result {
                warn!("mute toggle failed: {}", e);
                this.redraw
                    .notice(NoticeLevel::Warning, format!("Mute failed: {}", e));
            }
            result
        })
    }

    async fn run_toggle_mute(&self) -> Result<bool, EngineError> {
        let t = self.timings;
        let muted = !bounded(t.property_timeout, "get mute", self.engine.get_flag("mute")).await?;
        bounded(
            t.command_timeout,
            "set mute",
            self.engine.set_property("mute", PropertyValue::Flag(muted)),
        )
        .await?;

        if let Ok(volume) = bounded(t.property_timeout, "get volume", self.engine.get_f64("volume")).await {
            self.redraw
                .enqueue(DisplayUpdate::Volume(VolumeLevel::new(volume, muted)));
        }
        Ok(muted)
    }

    /// Apply the startup volume.  Failures are logged only.
    pub async fn set_initial_volume(&self, volume: f64) {
        let result = bounded(
            self.timings.command_timeout,
            "set volume",
            self.engine
                .set_property("volume", PropertyValue::Double(volume.clamp(0.0, 100.0))),
        )
        .await;
        if let Err(e) = result {
            warn!("could not set initial volume: {}", e);
        }
    }

    // ── Catalog ───────────────────────────────────────────────────────────────

    /// Fetch the catalog and swap it in if it changed.  Resolves to whether
    /// the view was replaced.
    pub fn reload_catalog(&self) -> JoinHandle<Result<bool, CatalogError>> {
        let this = self.clone();
        tokio::spawn(async move {
            match this.service.fetch_catalog().await {
                Ok(tracks) => {
                    let count = tracks.len();
                    let changed = this.catalog.write().replace_if_changed(tracks);
                    info!("catalog fetched: {} songs (changed: {})", count, changed);
                    if changed {
                        this.redraw.enqueue(DisplayUpdate::CatalogChanged);
                    }
                    this.redraw
                        .notice(NoticeLevel::Info, format!("{} songs loaded", count));
                    Ok(changed)
                }
                Err(e) => {
                    error!("load music failed: {}", e);
                    this.redraw
                        .notice(NoticeLevel::Error, format!("load music failed: {}", e));
                    Err(e)
                }
            }
        })
    }

    /// Filter the catalog view in place.  An empty result leaves it as is.
    pub fn search(&self, query: &str) -> SearchOutcome {
        let outcome = self.catalog.write().search(query);
        match outcome {
            SearchOutcome::Replaced { matches } => {
                info!("search {:?}: {} matches", query, matches);
                self.redraw.enqueue(DisplayUpdate::CatalogChanged);
            }
            SearchOutcome::NoResults => {
                self.redraw.notice(
                    NoticeLevel::Warning,
                    format!("No results found for: {}", query),
                );
            }
        }
        outcome
    }

    /// Step the table one page forward or back.  False at either end.
    pub fn turn_page(&self, forward: bool) -> bool {
        let moved = {
            let mut view = self.catalog.write();
            if forward {
                view.next_page()
            } else {
                view.prev_page()
            }
        };
        if moved {
            self.redraw.enqueue(DisplayUpdate::CatalogChanged);
        }
        moved
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────

    /// Tell the engine to quit, bounded by the shutdown grace, then drop the
    /// session.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let result = bounded(self.timings.shutdown_grace, "quit", self.engine.quit()).await;
        if let Err(e) = &result {
            warn!("engine quit: {}", e);
        }
        self.session.clear();
        result
    }
}

/// Index `delta` steps from `current` in a list of `len`, wrapping both
/// ways.  With no current index, forward starts at the first entry and
/// backward at the last.
pub fn next_index(current: Option<usize>, delta: isize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let next = match current {
        None if delta >= 0 => 0,
        None => len - 1,
        Some(c) => (c as isize + delta).rem_euclid(len as isize) as usize,
    };
    Some(next)
}

async fn start_playback(
    engine: Arc<dyn AudioEngine>,
    url: String,
    timings: Timings,
) -> Result<(), EngineError> {
    let loaded = timeout(timings.property_timeout, engine.has_session())
        .await
        .unwrap_or(true);
    if loaded {
        if let Err(e) = bounded(timings.command_timeout, "stop", engine.stop()).await {
            debug!("stop before load failed: {}", e);
        }
        tokio::time::sleep(timings.settle_delay).await;
    }
    bounded(timings.command_timeout, "play", engine.play(&url)).await
}

async fn bounded<T, F>(limit: Duration, operation: &'static str, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    timeout(limit, fut).await.map_err(|_| EngineError::Timeout {
        operation,
        timeout_ms: limit.as_millis(),
    })?
}

fn into_fault(e: EngineError) -> EngineError {
    match e {
        EngineError::Fault(_) => e,
        other => EngineError::Fault(other.to_string()),
    }
}
