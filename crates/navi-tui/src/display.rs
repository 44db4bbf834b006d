//! Display update messages and the single-consumer redraw queue.
//!
//! Background tasks never touch widgets.  They enqueue a [`DisplayUpdate`]
//! and the app loop, the only consumer, applies it on its next turn.

use navi_proto::protocol::{PlaybackStatus, Track, VolumeLevel};
use tokio::sync::mpsc;
use tracing::debug;

pub const REDRAW_QUEUE_CAPACITY: usize = 256;

/// One progress-poller reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub position: f64,
    pub duration: f64,
    /// `position / duration`, clamped to 0..=1.
    pub progress: f64,
    pub volume: VolumeLevel,
}

/// Contents of the transport line.
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    Idle,
    Paused { volume: VolumeLevel },
    Progress(ProgressSnapshot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// Now-playing panel: session status plus the track it refers to.
    NowPlaying {
        status: PlaybackStatus,
        track: Option<Track>,
    },
    Transport(Transport),
    Volume(VolumeLevel),
    /// The catalog view changed; rebuild the table from it.
    CatalogChanged,
    Notice { level: NoticeLevel, text: String },
    /// Timestamped line for the log strip.
    Log(String),
}

#[derive(Clone)]
pub struct RedrawQueue {
    tx: mpsc::Sender<DisplayUpdate>,
}

impl RedrawQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<DisplayUpdate>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Never blocks.  Returns false if the update was dropped because the
    /// consumer is gone or behind.
    pub fn enqueue(&self, update: DisplayUpdate) -> bool {
        match self.tx.try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                debug!("redraw queue full, dropping {:?}", update);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn notice(&self, level: NoticeLevel, text: impl Into<String>) -> bool {
        self.enqueue(DisplayUpdate::Notice {
            level,
            text: text.into(),
        })
    }

    pub fn now_playing(&self, status: PlaybackStatus, track: Option<Track>) -> bool {
        self.enqueue(DisplayUpdate::NowPlaying { status, track })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_drops_when_full() {
        let (queue, mut rx) = RedrawQueue::channel(1);
        assert!(queue.enqueue(DisplayUpdate::CatalogChanged));
        assert!(!queue.notice(NoticeLevel::Info, "dropped"));
        assert_eq!(rx.recv().await, Some(DisplayUpdate::CatalogChanged));
        assert!(queue.notice(NoticeLevel::Info, "fits"));
    }

    #[test]
    fn test_enqueue_after_consumer_gone() {
        let (queue, rx) = RedrawQueue::channel(4);
        drop(rx);
        assert!(!queue.enqueue(DisplayUpdate::CatalogChanged));
    }
}
