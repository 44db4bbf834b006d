//! AppState: shared read-only data passed to all components during render/event.
//!
//! Components read this but never mutate it.  The App event-loop is the only
//! thing that writes to AppState, and it does so from `DisplayUpdate`s.

use std::collections::VecDeque;
use std::sync::Arc;

use navi_proto::config::KeyBindings;
use navi_proto::protocol::{PlaybackStatus, Track, VolumeLevel};
use parking_lot::Mutex;

use crate::controller::SharedCatalog;
use crate::display::{DisplayUpdate, Transport};

const MAX_LOG_LINES: usize = 50;

/// Whether the search overlay owns the keyboard.  Guarded separately from
/// the session.
#[derive(Clone, Default)]
pub struct SearchMode(Arc<Mutex<bool>>);

impl SearchMode {
    pub fn is_active(&self) -> bool {
        *self.0.lock()
    }

    pub fn set(&self, active: bool) {
        *self.0.lock() = active;
    }
}

pub struct AppState {
    pub catalog: SharedCatalog,
    pub status: PlaybackStatus,
    /// Track the status refers to.
    pub current_track: Option<Track>,
    pub transport: Transport,
    pub volume: VolumeLevel,
    pub log_lines: VecDeque<String>,
    pub keys: KeyBindings,
    pub search: SearchMode,
    /// Bumped on every catalog change so the table can reset its cursor.
    pub catalog_generation: u64,
}

impl AppState {
    pub fn new(catalog: SharedCatalog, keys: KeyBindings, volume: VolumeLevel) -> Self {
        Self {
            catalog,
            status: PlaybackStatus::Idle,
            current_track: None,
            transport: Transport::Idle,
            volume,
            log_lines: VecDeque::new(),
            keys,
            search: SearchMode::default(),
            catalog_generation: 0,
        }
    }

    pub fn song_count(&self) -> usize {
        self.catalog.read().len()
    }

    pub fn push_log(&mut self, line: String) {
        self.log_lines.push_back(line);
        while self.log_lines.len() > MAX_LOG_LINES {
            self.log_lines.pop_front();
        }
    }

    /// Fold a display update into the state.  Notices are left to the caller
    /// since they go to the toast layer.
    pub fn apply(&mut self, update: &DisplayUpdate) {
        match update {
            DisplayUpdate::NowPlaying { status, track } => {
                self.status = *status;
                self.current_track = track.clone();
            }
            DisplayUpdate::Transport(transport) => {
                match transport {
                    Transport::Paused { volume } => self.volume = *volume,
                    Transport::Progress(snap) => self.volume = snap.volume,
                    Transport::Idle => {}
                }
                self.transport = transport.clone();
            }
            DisplayUpdate::Volume(volume) => self.volume = *volume,
            DisplayUpdate::CatalogChanged => {
                self.catalog_generation = self.catalog_generation.wrapping_add(1);
            }
            DisplayUpdate::Log(line) => self.push_log(line.clone()),
            DisplayUpdate::Notice { .. } => {}
        }
    }
}
