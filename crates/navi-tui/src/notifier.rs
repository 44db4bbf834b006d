//! Track-end notifier: turns the engine's end-of-track events into
//! `advance(+1)` on the controller.  It shares the controller's guarded load
//! path, so an end-of-track that races a manual skip cannot double-advance.
//! Tracks the engine could not open are marked failed instead.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::controller::PlaybackController;
use crate::engine::EngineEvent;

/// Runs until cancelled or the event stream ends.  Returns how many
/// end-of-track events started a new load.
pub async fn run(
    controller: PlaybackController,
    mut events: mpsc::Receiver<EngineEvent>,
    cancel: CancellationToken,
) -> usize {
    let mut advanced = 0;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(EngineEvent::EndOfTrack) => {
                    if controller.on_end_of_track().is_some() {
                        advanced += 1;
                    } else {
                        debug!("end of track ignored, load in flight");
                    }
                }
                Some(EngineEvent::LoadFailed { reason }) => {
                    if controller.on_load_failed(&reason).is_none() {
                        debug!("load failure ignored, nothing playing");
                    }
                }
                None => break,
            },
        }
    }
    debug!("track-end notifier exiting after {} advances", advanced);
    advanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{DisplayUpdate, NoticeLevel};
    use crate::testing::Harness;
    use navi_proto::protocol::PlaybackStatus;

    #[tokio::test(start_paused = true)]
    async fn test_end_of_track_advances() {
        let h = Harness::new(3);
        h.controller.play_at(2).unwrap().await.unwrap();

        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(h.controller.clone(), rx, cancel.clone()));

        tx.send(EngineEvent::EndOfTrack).await.unwrap();
        drop(tx);
        assert_eq!(task.await.unwrap(), 1);

        // Let the spawned load settle.
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        assert_eq!(h.session.status(), PlaybackStatus::Playing(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_track_during_manual_skip_is_dropped() {
        let h = Harness::new(3);
        h.controller.play_at(0).unwrap().await.unwrap();

        let (tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        // Manual skip first; the load is in flight when the event lands.
        let skip = h.controller.next().unwrap();
        tx.send(EngineEvent::EndOfTrack).await.unwrap();
        drop(tx);
        let advanced = run(h.controller.clone(), rx, cancel).await;

        assert_eq!(advanced, 0);
        assert_eq!(skip.await.unwrap(), PlaybackStatus::Playing(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_load_failure_marks_track_failed() {
        let h = Harness::new(3);
        h.controller.play_at(1).unwrap().await.unwrap();
        assert_eq!(h.session.status(), PlaybackStatus::Playing(1));
        h.drain_updates();

        let (tx, rx) = mpsc::channel(4);
        tx.send(EngineEvent::LoadFailed {
            reason: "loading failed".to_string(),
        })
        .await
        .unwrap();
        drop(tx);
        let advanced = run(h.controller.clone(), rx, CancellationToken::new()).await;

        assert_eq!(advanced, 0);
        assert_eq!(h.session.status(), PlaybackStatus::Failed(1));
        let updates = h.drain_updates();
        assert!(updates.iter().any(|u| matches!(
            u,
            DisplayUpdate::NowPlaying { status: PlaybackStatus::Failed(1), track: Some(t) } if t.id == "t1"
        )));
        assert!(updates.iter().any(|u| matches!(
            u,
            DisplayUpdate::Notice { level: NoticeLevel::Error, text } if text.contains("loading failed")
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_while_loading_is_ignored() {
        let h = Harness::new(3);
        let load = h.controller.play_at(0).unwrap();

        let (tx, rx) = mpsc::channel(4);
        tx.send(EngineEvent::LoadFailed {
            reason: "stale".to_string(),
        })
        .await
        .unwrap();
        drop(tx);
        run(h.controller.clone(), rx, CancellationToken::new()).await;

        assert_eq!(load.await.unwrap(), PlaybackStatus::Playing(0));
    }

    #[tokio::test]
    async fn test_cancel_stops_notifier() {
        let h = Harness::new(1);
        let (_tx, rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(run(h.controller.clone(), rx, cancel).await, 0);
    }
}
