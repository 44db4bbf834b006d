//! Session state: what is playing, or being loaded, right now.
//!
//! One mutex guards the whole record.  The loading and playing flags are
//! both derived from a single [`PlaybackStatus`], so they can never be set
//! together.  No method holds the lock across an await.

use navi_proto::protocol::{PlaybackStatus, SessionSnapshot, Track};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct Inner {
    status: PlaybackStatus,
    current_track: Option<Track>,
}

#[derive(Debug, Default)]
pub struct SessionState {
    inner: Mutex<Inner>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.inner.lock();
        SessionSnapshot {
            status: inner.status,
            current_index: inner.status.index(),
            current_track: inner.current_track.clone(),
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.inner.lock().status
    }

    /// Claim the single load slot.
    ///
    /// `pick` sees the current index and returns the index and track to
    /// load, or `None` to decline.  Returns `None` without calling `pick` if a
    /// load is already in flight.  On success the session is `Loading(i)`
    /// with the new track snapshot before this returns.
    pub fn try_begin_load<F>(&self, pick: F) -> Option<(usize, Track)>
    where
        F: FnOnce(Option<usize>) -> Option<(usize, Track)>,
    {
        let mut inner = self.inner.lock();
        if inner.status.is_loading() {
            return None;
        }
        let (index, track) = pick(inner.status.index())?;
        inner.status = PlaybackStatus::Loading(index);
        inner.current_track = Some(track.clone());
        Some((index, track))
    }

    /// Settle the load for `index`.  Ignored unless the session is still
    /// `Loading(index)`.
    pub fn finish_load(&self, index: usize, started: bool) -> PlaybackStatus {
        let mut inner = self.inner.lock();
        if inner.status == PlaybackStatus::Loading(index) {
            inner.status = if started {
                PlaybackStatus::Playing(index)
            } else {
                PlaybackStatus::Failed(index)
            };
        }
        inner.status
    }

    /// Record the engine's pause state for `index`.  Only moves between
    /// `Playing(index)` and `Paused(index)`; anything else is left alone.
    pub fn set_paused(&self, index: usize, paused: bool) -> PlaybackStatus {
        let mut inner = self.inner.lock();
        match inner.status {
            PlaybackStatus::Playing(i) | PlaybackStatus::Paused(i) if i == index => {
                inner.status = if paused {
                    PlaybackStatus::Paused(i)
                } else {
                    PlaybackStatus::Playing(i)
                };
            }
            _ => {}
        }
        inner.status
    }

    /// The engine dropped the track after accepting it.  Moves `Playing(i)`
    /// or `Paused(i)` to `Failed(i)`; `None` in any other state.
    pub fn fail_current(&self) -> Option<PlaybackStatus> {
        let mut inner = self.inner.lock();
        match inner.status {
            PlaybackStatus::Playing(i) | PlaybackStatus::Paused(i) => {
                inner.status = PlaybackStatus::Failed(i);
                Some(inner.status)
            }
            _ => None,
        }
    }

    /// Back to `Idle` with no track.
    pub fn clear(&self) {
        *self.inner.lock() = Inner::default();
    }
}
