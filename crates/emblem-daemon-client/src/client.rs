//! Daemon client implementation

use anyhow::{Context, Result};
use emblem_core::{PathStatus, StatusKind};
use emblem_daemon::DaemonPaths;
use emblem_daemon::protocol::{ADD_WATCH, CHECK_STATUS, EXIT, HAS_WATCH, STATS, STATUS};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tracing::debug;

/// Event pushed by the daemon.
#[derive(Debug, Clone)]
pub struct DaemonEvent {
    /// Event name (`WatchAdded`, `StatusChanged` or `StatusChecked`)
    pub event_type: String,
    /// Event-specific data payload
    pub data: Value,
}

impl DaemonEvent {
    /// The `path` field carried by every event.
    pub fn path(&self) -> Option<PathBuf> {
        self.data.get("path").and_then(|v| v.as_str()).map(PathBuf::from)
    }

    /// The reported status of a `StatusChanged` event.
    pub fn status(&self) -> Option<StatusKind> {
        self.data
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// The statuses of a `StatusChecked` event.
    pub fn statuses(&self) -> Option<Vec<PathStatus>> {
        self.data
            .get("statuses")
            .and_then(|v| statuses_from_value(v).ok())
    }
}

/// Result of a `CheckStatus` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckStatusReply {
    /// Sorted by path.
    pub statuses: Vec<PathStatus>,
    pub summary: Option<StatusKind>,
}

#[derive(Deserialize)]
struct WireStatus {
    text_status: StatusKind,
    prop_status: StatusKind,
}

fn statuses_from_value(value: &Value) -> Result<Vec<PathStatus>> {
    let map: BTreeMap<PathBuf, WireStatus> =
        serde_json::from_value(value.clone()).context("malformed status mapping")?;
    Ok(map
        .into_iter()
        .map(|(path, s)| PathStatus::new(path, s.text_status, s.prop_status))
        .collect())
}

/// Socket read half plus any line left half-read by a timed-out poll.
struct LineReader {
    inner: BufReader<tokio::net::unix::OwnedReadHalf>,
    partial: String,
}

impl LineReader {
    /// Next complete line; cancel-safe because partial reads stay buffered.
    async fn next_line(&mut self) -> Result<String> {
        let bytes_read = self.inner.read_line(&mut self.partial).await?;
        if bytes_read == 0 {
            anyhow::bail!("Connection closed by daemon");
        }
        Ok(std::mem::take(&mut self.partial))
    }
}

pub struct DaemonClient {
    reader: Mutex<LineReader>,
    writer: Mutex<tokio::net::unix::OwnedWriteHalf>,
    next_id: AtomicU64,
    /// Optional channel for sending events to callers
    event_tx: Option<mpsc::UnboundedSender<DaemonEvent>>,
}

impl DaemonClient {
    /// Connect to the daemon at the socket named by the user's config
    pub async fn connect() -> Result<Self> {
        Self::connect_to(&DaemonPaths::discover().socket).await
    }

    /// Connect to daemon at a specific socket path
    pub async fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .await
            .with_context(|| format!("failed to connect to {}", path.display()))?;
        let (read, write) = stream.into_split();

        Ok(Self {
            reader: Mutex::new(LineReader {
                inner: BufReader::new(read),
                partial: String::new(),
            }),
            writer: Mutex::new(write),
            next_id: AtomicU64::new(1),
            event_tx: None,
        })
    }

    /// Connect to the daemon at the configured socket path with event handling
    pub async fn connect_with_events() -> Result<(Self, mpsc::UnboundedReceiver<DaemonEvent>)> {
        Self::connect_to_with_events(&DaemonPaths::discover().socket).await
    }

    /// Connect to daemon at a specific socket path with event handling
    ///
    /// Events are read off the socket while a call is waiting for its
    /// response, or by [`DaemonClient::poll_events`] when idle.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let (client, mut events) = DaemonClient::connect_to_with_events(&path).await?;
    /// client.status(Path::new("/home/me/wc/file.txt"), false, false).await?;
    /// client.poll_events(Duration::from_millis(500)).await?;
    /// while let Ok(event) = events.try_recv() {
    ///     println!("{} {:?}", event.event_type, event.path());
    /// }
    /// ```
    pub async fn connect_to_with_events(
        path: &Path,
    ) -> Result<(Self, mpsc::UnboundedReceiver<DaemonEvent>)> {
        let mut client = Self::connect_to(path).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        client.event_tx = Some(tx);
        Ok((client, rx))
    }

    /// Parse one line; events are dispatched and `None` is returned.
    fn dispatch(&self, line: &str) -> Result<Option<Value>> {
        let msg: Value = serde_json::from_str(line)?;

        if msg.get("type").and_then(|t| t.as_str()) == Some("event") {
            if let Some(ref tx) = self.event_tx {
                let event = DaemonEvent {
                    event_type: msg
                        .get("event")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string(),
                    data: msg.get("data").cloned().unwrap_or(Value::Null),
                };
                // Receiver may have been dropped
                let _ = tx.send(event);
            }
            return Ok(None);
        }

        Ok(Some(msg))
    }

    /// Read until an RPC response arrives, dispatching events on the way.
    async fn read_message(&self) -> Result<Value> {
        let mut reader = self.reader.lock().await;
        loop {
            let line = reader.next_line().await?;
            if let Some(msg) = self.dispatch(&line)? {
                return Ok(msg);
            }
        }
    }

    /// Read pushed events for up to `wait` while no call is in flight.
    ///
    /// Returns the number of events dispatched.
    pub async fn poll_events(&self, wait: Duration) -> Result<usize> {
        let mut reader = self.reader.lock().await;
        let deadline = tokio::time::Instant::now() + wait;
        let mut count = 0;
        loop {
            match tokio::time::timeout_at(deadline, reader.next_line()).await {
                Err(_) => return Ok(count),
                Ok(line) => {
                    if let Some(msg) = self.dispatch(&line?)? {
                        debug!("Dropping unexpected response: {}", msg);
                    } else {
                        count += 1;
                    }
                }
            }
        }
    }

    /// Send a JSON-RPC request and get the response
    pub async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let mut req_str = serde_json::to_string(&request)?;
        req_str.push('\n');

        {
            let mut writer = self.writer.lock().await;
            writer.write_all(req_str.as_bytes()).await?;
        }

        let response = self.read_message().await?;

        if let Some(error) = response.get("error") {
            anyhow::bail!("RPC error: {}", error);
        }

        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Whether `path` has been registered through `AddWatch`.
    pub async fn has_watch(&self, path: &Path) -> Result<bool> {
        let result = self
            .call(HAS_WATCH, json!({ "path": path.to_string_lossy() }))
            .await?;
        result.as_bool().context("HasWatch returned a non-boolean")
    }

    pub async fn add_watch(&self, path: &Path) -> Result<()> {
        self.call(ADD_WATCH, json!({ "path": path.to_string_lossy() }))
            .await?;
        Ok(())
    }

    /// Ask for `StatusChanged` events about `path`.
    pub async fn status(&self, path: &Path, invalidate: bool, bypass: bool) -> Result<()> {
        self.call(
            STATUS,
            json!({
                "path": path.to_string_lossy(),
                "invalidate": invalidate,
                "bypass": bypass,
            }),
        )
        .await?;
        Ok(())
    }

    /// Statuses for `path`; a `calculating` placeholder means the real
    /// answer follows as a `StatusChecked` event.
    pub async fn check_status(
        &self,
        path: &Path,
        recurse: bool,
        invalidate: bool,
        summary: bool,
    ) -> Result<CheckStatusReply> {
        let result = self
            .call(
                CHECK_STATUS,
                json!({
                    "path": path.to_string_lossy(),
                    "recurse": recurse,
                    "invalidate": invalidate,
                    "summary": summary,
                }),
            )
            .await?;

        let statuses = statuses_from_value(result.get("statuses").unwrap_or(&Value::Null))?;
        let summary = match result.get("summary") {
            Some(Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value(value.clone())?),
        };
        Ok(CheckStatusReply { statuses, summary })
    }

    /// Checker, cache and watch counters as reported by the daemon.
    pub async fn stats(&self) -> Result<Value> {
        self.call(STATS, json!({})).await
    }

    /// Stop the daemon's monitor and server loop.
    pub async fn exit(&self) -> Result<()> {
        self.call(EXIT, json!({})).await?;
        Ok(())
    }
}
