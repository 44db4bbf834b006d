/// mpv IPC driver with separated reader/writer tasks.
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, serialises → socket
///         └── reader_task   ← reads JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event                      → event_tx channel
/// ```
///
/// `MpvHandle` is cheaply cloneable; `send(cmd)` resolves to mpv's reply.
/// `MpvDriver` owns the child process.
///
/// Unix uses a domain socket, Windows a named pipe `\\.\pipe\<name>`.
use navi_proto::error::EngineError;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

/// Upper bound on any single IPC round trip.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

type Reply = Result<Value, EngineError>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line, already has '\n'
    reply: oneshot::Sender<Reply>,
}

/// An mpv event that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `reason` of an `end-file` event: "eof", "stop", "quit", "error", "redirect".
    pub fn end_file_reason(&self) -> Option<&str> {
        if self.event_name()? != "end-file" {
            return None;
        }
        self.raw.get("reason")?.as_str()
    }
}

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> Result<Value, EngineError> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg).map_err(|e| EngineError::Command {
            command: command.to_string(),
            reason: e.to_string(),
        })?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::Disconnected)?;

        tokio::time::timeout(COMMAND_TIMEOUT, reply_rx)
            .await
            .map_err(|_| EngineError::Timeout {
                operation: "ipc request",
                timeout_ms: COMMAND_TIMEOUT.as_millis(),
            })?
            .map_err(|_| EngineError::Disconnected)?
    }

    /// `data` field of a successful `get_property` reply.
    pub async fn get_property(&self, name: &str) -> Result<Value, EngineError> {
        let mut resp = self.send(json!(["get_property", name])).await?;
        Ok(resp["data"].take())
    }

    pub async fn set_property(&self, name: &str, value: Value) -> Result<(), EngineError> {
        self.send(json!(["set_property", name, value])).await?;
        Ok(())
    }
}

/// Owns the mpv child process.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: navi_proto::platform::mpv_socket_name(),
            process: None,
        }
    }

    fn command(initial_volume: f64) -> anyhow::Result<tokio::process::Command> {
        let mpv_binary = navi_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found (set MPV_PATH or install mpv)"))?;

        let stderr_path = navi_proto::platform::data_dir().join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let mut cmd = tokio::process::Command::new(mpv_binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            .arg("--no-terminal")
            .arg(navi_proto::platform::mpv_socket_arg())
            .arg(format!(
                "--volume={}",
                initial_volume.clamp(0.0, 100.0).round() as i64
            ))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        initial_volume: f64,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        let child = Self::command(initial_volume)?.spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear at {}", socket_path.display());
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        initial_volume: f64,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let child = Self::command(initial_volume)?.spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }

    /// Wait up to `grace` for mpv to exit on its own (after a `quit`
    /// command), then kill it.
    pub async fn shutdown(&mut self, grace: Duration) {
        let Some(mut child) = self.process.take() else {
            return;
        };
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => debug!("mpv: exited with {}", status),
            Ok(Err(e)) => warn!("mpv: wait failed: {}", e),
            Err(_) => {
                warn!("mpv: still running after {:?}, killing", grace);
                let _ = child.kill().await;
            }
        }
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.socket_name);
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }
}

impl Default for MpvDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

/// Classify one line from the socket.
enum Incoming {
    Reply(u64, Reply),
    Event(MpvEvent),
}

fn parse_line(line: &str) -> Option<Incoming> {
    let val: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            debug!("mpv reader: invalid json '{}': {}", line, e);
            return None;
        }
    };

    match val.get("request_id").and_then(|v| v.as_u64()) {
        Some(req_id) => {
            let result = match val["error"].as_str() {
                Some("success") => Ok(val),
                other => Err(EngineError::Command {
                    command: format!("req {}", req_id),
                    reason: other.unwrap_or("unknown error").to_string(),
                }),
            };
            Some(Incoming::Reply(req_id, result))
        }
        None => Some(Incoming::Event(MpvEvent { raw: val })),
    }
}

async fn fail_all(pending: &PendingMap) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(EngineError::Disconnected));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending).await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match parse_line(trimmed) {
                    Some(Incoming::Reply(req_id, result)) => {
                        let mut map = pending.lock().await;
                        match map.remove(&req_id) {
                            Some(tx) => {
                                let _ = tx.send(result);
                            }
                            None => debug!("mpv reader: response for unknown req={}", req_id),
                        }
                    }
                    Some(Incoming::Event(event)) => {
                        debug!("mpv reader: event {}", trimmed);
                        let _ = event_tx.send(event).await;
                    }
                    None => {}
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending).await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register before writing so the reader can match the reply.
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(EngineError::Disconnected));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_file_reason() {
        let ev = MpvEvent {
            raw: json!({"event": "end-file", "reason": "eof", "playlist_entry_id": 1}),
        };
        assert_eq!(ev.event_name(), Some("end-file"));
        assert_eq!(ev.end_file_reason(), Some("eof"));

        let ev = MpvEvent {
            raw: json!({"event": "start-file"}),
        };
        assert_eq!(ev.end_file_reason(), None);
    }

    #[test]
    fn test_parse_reply_and_event_lines() {
        match parse_line(r#"{"data":42.5,"error":"success","request_id":7}"#) {
            Some(Incoming::Reply(7, Ok(v))) => assert_eq!(v["data"], 42.5),
            _ => panic!("expected successful reply"),
        }
        match parse_line(r#"{"error":"property unavailable","request_id":8}"#) {
            Some(Incoming::Reply(8, Err(EngineError::Command { reason, .. }))) => {
                assert_eq!(reason, "property unavailable")
            }
            _ => panic!("expected error reply"),
        }
        assert!(matches!(
            parse_line(r#"{"event":"idle"}"#),
            Some(Incoming::Event(_))
        ));
        assert!(parse_line("not json").is_none());
    }

    #[tokio::test]
    async fn test_handle_round_trip_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client_read, client_write, event_tx);

        // Fake mpv: answer every request with volume 30 and emit one event.
        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let req: Value = serde_json::from_str(&line).unwrap();
                let id = req["request_id"].as_u64().unwrap();
                let reply = format!(
                    "{{\"event\":\"end-file\",\"reason\":\"eof\"}}\n{{\"data\":30.0,\"error\":\"success\",\"request_id\":{}}}\n",
                    id
                );
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let volume = handle.get_property("volume").await.unwrap();
        assert_eq!(volume.as_f64(), Some(30.0));
        let event = event_rx.recv().await.unwrap();
        assert_eq!(event.end_file_reason(), Some("eof"));
    }

    #[tokio::test]
    async fn test_closed_connection_fails_pending() {
        let (client, server) = tokio::io::duplex(4096);
        let (client_read, client_write) = tokio::io::split(client);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(client_read, client_write, event_tx);
        drop(server);

        let err = handle.send(json!(["get_property", "pause"])).await.unwrap_err();
        assert_eq!(err, EngineError::Disconnected);
    }
}
