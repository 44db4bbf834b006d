//! Audio engine seam.  The controller and poller talk to [`AudioEngine`];
//! [`MpvEngine`] implements it over the mpv IPC handle.

use async_trait::async_trait;
use navi_proto::error::EngineError;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::mpv::{MpvEvent, MpvHandle};

/// A scalar engine property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Double(f64),
    Flag(bool),
}

impl PropertyValue {
    fn to_json(self) -> Value {
        match self {
            Self::Double(v) => json!(v),
            Self::Flag(b) => json!(b),
        }
    }
}

/// Out-of-band notifications from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The current track played to its natural end.
    EndOfTrack,
    /// The engine accepted the track but could not open or decode it.
    LoadFailed { reason: String },
}

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Replace the queue with `url` and start playing it unpaused.
    async fn play(&self, url: &str) -> Result<(), EngineError>;
    async fn stop(&self) -> Result<(), EngineError>;
    async fn toggle_pause(&self) -> Result<(), EngineError>;
    async fn get_property(&self, name: &str) -> Result<PropertyValue, EngineError>;
    async fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), EngineError>;
    /// True when a track is loaded (playing or paused).
    async fn has_session(&self) -> bool;
    async fn quit(&self) -> Result<(), EngineError>;

    async fn get_f64(&self, name: &str) -> Result<f64, EngineError> {
        match self.get_property(name).await? {
            PropertyValue::Double(v) => Ok(v),
            PropertyValue::Flag(_) => Err(type_mismatch(name, "number")),
        }
    }

    async fn get_flag(&self, name: &str) -> Result<bool, EngineError> {
        match self.get_property(name).await? {
            PropertyValue::Flag(b) => Ok(b),
            PropertyValue::Double(_) => Err(type_mismatch(name, "flag")),
        }
    }
}

fn type_mismatch(name: &str, expected: &str) -> EngineError {
    EngineError::Command {
        command: format!("get_property {}", name),
        reason: format!("expected a {}", expected),
    }
}

pub struct MpvEngine {
    handle: MpvHandle,
}

impl MpvEngine {
    pub fn new(handle: MpvHandle) -> Self {
        Self { handle }
    }
}

#[async_trait]
impl AudioEngine for MpvEngine {
    async fn play(&self, url: &str) -> Result<(), EngineError> {
        debug!("mpv: loadfile replace");
        self.handle.send(json!(["loadfile", url, "replace"])).await?;
        self.handle.set_property("pause", json!(false)).await
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.handle.send(json!(["stop"])).await.map(|_| ())
    }

    async fn toggle_pause(&self) -> Result<(), EngineError> {
        self.handle.send(json!(["cycle", "pause"])).await.map(|_| ())
    }

    async fn get_property(&self, name: &str) -> Result<PropertyValue, EngineError> {
        let data = self.handle.get_property(name).await?;
        if let Some(b) = data.as_bool() {
            Ok(PropertyValue::Flag(b))
        } else if let Some(v) = data.as_f64() {
            Ok(PropertyValue::Double(v))
        } else {
            Err(EngineError::Command {
                command: format!("get_property {}", name),
                reason: format!("unexpected value {}", data),
            })
        }
    }

    async fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), EngineError> {
        self.handle.set_property(name, value.to_json()).await
    }

    async fn has_session(&self) -> bool {
        // idle-active is true when nothing is loaded
        matches!(
            self.handle.get_property("idle-active").await.map(|v| v.as_bool()),
            Ok(Some(false))
        )
    }

    async fn quit(&self) -> Result<(), EngineError> {
        info!("mpv: quit");
        self.handle.send(json!(["quit"])).await.map(|_| ())
    }
}

/// Map a raw mpv event to an engine event.  Only a natural end of file
/// counts as end-of-track; stops and replacements do not.
pub fn translate_event(event: &MpvEvent) -> Option<EngineEvent> {
    match event.end_file_reason()? {
        "eof" => Some(EngineEvent::EndOfTrack),
        "error" => Some(EngineEvent::LoadFailed {
            reason: event
                .raw
                .get("file_error")
                .and_then(Value::as_str)
                .unwrap_or("playback error")
                .to_string(),
        }),
        _ => None,
    }
}

/// Forward translated mpv events until cancelled or either channel closes.
pub async fn pump_events(
    mut raw_rx: mpsc::Receiver<MpvEvent>,
    tx: mpsc::Sender<EngineEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            raw = raw_rx.recv() => {
                let Some(raw) = raw else { break };
                if let Some(event) = translate_event(&raw) {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
    debug!("engine event pump exiting");
}
