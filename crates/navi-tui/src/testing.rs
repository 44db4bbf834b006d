//! In-memory catalog and engine fakes plus a wired-up controller harness.

use std::sync::Arc;

use async_trait::async_trait;
use navi_proto::catalog::CatalogView;
use navi_proto::error::{CatalogError, EngineError};
use navi_proto::protocol::Track;
use navi_proto::subsonic::CatalogService;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use crate::controller::{PlaybackController, SharedCatalog};
use crate::display::{DisplayUpdate, RedrawQueue};
use crate::engine::{AudioEngine, PropertyValue};
use crate::session::SessionState;

pub fn numbered_tracks(n: usize) -> Vec<Track> {
    (0..n)
        .map(|i| Track {
            id: format!("t{i}"),
            title: format!("Title {i}"),
            artist: "Artist".to_string(),
            album: "Album".to_string(),
            duration: 120,
            size: 3 * 1024 * 1024,
        })
        .collect()
}

// ── Catalog ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum ResolveMode {
    Ok,
    Hang,
    Fail,
}

pub struct FakeCatalog {
    tracks: Vec<Track>,
    resolve: ResolveMode,
}

impl FakeCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            resolve: ResolveMode::Ok,
        }
    }

    /// `resolve_play_url` never completes.
    pub fn hanging(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            resolve: ResolveMode::Hang,
        }
    }

    pub fn failing(tracks: Vec<Track>) -> Self {
        Self {
            tracks,
            resolve: ResolveMode::Fail,
        }
    }

    pub fn url_for(id: &str) -> String {
        format!("http://fake/rest/stream?id={id}")
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn fetch_catalog(&self) -> Result<Vec<Track>, CatalogError> {
        Ok(self.tracks.clone())
    }

    async fn resolve_play_url(&self, track_id: &str) -> Result<String, CatalogError> {
        match self.resolve {
            ResolveMode::Ok => Ok(Self::url_for(track_id)),
            ResolveMode::Hang => std::future::pending().await,
            ResolveMode::Fail => Err(CatalogError::Resolution {
                id: track_id.to_string(),
                reason: "not found".to_string(),
            }),
        }
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Mutating commands the fake engine received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Play(String),
    Stop,
    TogglePause,
    Set(String, PropertyValue),
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineMode {
    Normal,
    FailingPlay,
    PanickingPlay,
    UnresponsiveProperties,
}

#[derive(Debug)]
struct EngineModel {
    calls: Vec<EngineCall>,
    loaded: bool,
    paused: bool,
    volume: f64,
    muted: bool,
    time_pos: f64,
    duration: f64,
}

pub struct FakeEngine {
    model: Mutex<EngineModel>,
    mode: EngineMode,
}

impl FakeEngine {
    fn with_mode(mode: EngineMode) -> Self {
        Self {
            model: Mutex::new(EngineModel {
                calls: Vec::new(),
                loaded: false,
                paused: false,
                volume: 50.0,
                muted: false,
                time_pos: 0.0,
                duration: 0.0,
            }),
            mode,
        }
    }

    pub fn new() -> Self {
        Self::with_mode(EngineMode::Normal)
    }

    pub fn failing_play() -> Self {
        Self::with_mode(EngineMode::FailingPlay)
    }

    pub fn panicking_play() -> Self {
        Self::with_mode(EngineMode::PanickingPlay)
    }

    /// Property reads never answer.
    pub fn unresponsive_properties() -> Self {
        Self::with_mode(EngineMode::UnresponsiveProperties)
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.model.lock().calls.clone()
    }

    pub fn plays(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Play(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn toggle_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == EngineCall::TogglePause)
            .count()
    }

    pub fn set_paused(&self, paused: bool) {
        self.model.lock().paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.model.lock().paused
    }

    pub fn is_muted(&self) -> bool {
        self.model.lock().muted
    }

    pub fn set_volume(&self, volume: f64) {
        self.model.lock().volume = volume;
    }

    pub fn set_position(&self, time_pos: f64, duration: f64) {
        let mut m = self.model.lock();
        m.time_pos = time_pos;
        m.duration = duration;
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn play(&self, url: &str) -> Result<(), EngineError> {
        match self.mode {
            EngineMode::FailingPlay => {
                return Err(EngineError::Command {
                    command: "loadfile".to_string(),
                    reason: "unsupported format".to_string(),
                })
            }
            EngineMode::PanickingPlay => panic!("engine blew up"),
            _ => {}
        }
        let mut m = self.model.lock();
        m.calls.push(EngineCall::Play(url.to_string()));
        m.loaded = true;
        m.paused = false;
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        let mut m = self.model.lock();
        m.calls.push(EngineCall::Stop);
        m.loaded = false;
        Ok(())
    }

    async fn toggle_pause(&self) -> Result<(), EngineError> {
        let mut m = self.model.lock();
        m.calls.push(EngineCall::TogglePause);
        m.paused = !m.paused;
        Ok(())
    }

    async fn get_property(&self, name: &str) -> Result<PropertyValue, EngineError> {
        if self.mode == EngineMode::UnresponsiveProperties {
            return std::future::pending().await;
        }
        let m = self.model.lock();
        match name {
            "pause" => Ok(PropertyValue::Flag(m.paused)),
            "mute" => Ok(PropertyValue::Flag(m.muted)),
            "volume" => Ok(PropertyValue::Double(m.volume)),
            "time-pos" => Ok(PropertyValue::Double(m.time_pos)),
            "duration" => Ok(PropertyValue::Double(m.duration)),
            _ => Err(EngineError::Command {
                command: format!("get_property {name}"),
                reason: "property unavailable".to_string(),
            }),
        }
    }

    async fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), EngineError> {
        let mut m = self.model.lock();
        m.calls.push(EngineCall::Set(name.to_string(), value));
        match (name, value) {
            ("volume", PropertyValue::Double(v)) => m.volume = v,
            ("mute", PropertyValue::Flag(b)) => m.muted = b,
            ("pause", PropertyValue::Flag(b)) => m.paused = b,
            _ => {}
        }
        Ok(())
    }

    async fn has_session(&self) -> bool {
        if self.mode == EngineMode::UnresponsiveProperties {
            return std::future::pending().await;
        }
        self.model.lock().loaded
    }

    async fn quit(&self) -> Result<(), EngineError> {
        let mut m = self.model.lock();
        m.calls.push(EngineCall::Quit);
        m.loaded = false;
        Ok(())
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub struct Harness {
    pub controller: PlaybackController,
    pub session: Arc<SessionState>,
    pub catalog: SharedCatalog,
    pub engine: Arc<FakeEngine>,
    pub redraw: RedrawQueue,
    updates: Mutex<mpsc::Receiver<DisplayUpdate>>,
}

impl Harness {
    /// `n` tracks both in the view and behind the fake catalog.
    pub fn new(n: usize) -> Self {
        Self::build(FakeCatalog::new(numbered_tracks(n)), FakeEngine::new())
    }

    pub fn with_catalog(catalog: FakeCatalog) -> Self {
        Self::build(catalog, FakeEngine::new())
    }

    pub fn with_engine(engine: FakeEngine) -> Self {
        Self::build(FakeCatalog::new(numbered_tracks(3)), engine)
    }

    fn build(service: FakeCatalog, engine: FakeEngine) -> Self {
        let session = Arc::new(SessionState::new());
        let catalog: SharedCatalog = Arc::new(RwLock::new(CatalogView::with_tracks(
            500,
            service.tracks.clone(),
        )));
        let engine = Arc::new(engine);
        let (redraw, rx) = RedrawQueue::channel(1024);
        let controller = PlaybackController::new(
            session.clone(),
            catalog.clone(),
            Arc::new(service),
            engine.clone(),
            redraw.clone(),
        );
        Self {
            controller,
            session,
            catalog,
            engine,
            redraw,
            updates: Mutex::new(rx),
        }
    }

    /// Everything enqueued so far.
    pub fn drain_updates(&self) -> Vec<DisplayUpdate> {
        let mut rx = self.updates.lock();
        let mut out = Vec::new();
        while let Ok(update) = rx.try_recv() {
            out.push(update);
        }
        out
    }
}
