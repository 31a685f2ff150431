//! Unix socket server for JSON-RPC

use crate::monitor::StatusMonitor;
use crate::protocol::{
    statuses_to_value, EventMessage, Request, RequestId, Response, ADD_WATCH, CHECK_STATUS,
    EXIT, HAS_WATCH, INTERNAL_ERROR, METHOD_NOT_FOUND, PARSE_ERROR, STATS, STATUS,
};
use crate::{optional_bool_param, require_path_param};
use anyhow::Result;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Log internal error details and return a generic error message.
fn internal_error(req_id: Option<RequestId>, err: impl std::fmt::Display) -> Response {
    error!("Internal error: {}", err);
    Response::error(req_id, INTERNAL_ERROR, "Internal server error")
}

/// Daemon server that listens on a Unix socket
pub struct Server {
    listener: UnixListener,
    shutdown_tx: broadcast::Sender<()>,
    monitor: Arc<StatusMonitor>,
}

impl Server {
    /// Bind to a Unix socket path
    pub async fn bind(path: &Path, monitor: Arc<StatusMonitor>) -> Result<Self> {
        // Remove stale socket
        if path.exists() {
            std::fs::remove_file(path)?;
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(path)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        info!("Daemon listening on {:?}", path);
        Ok(Self {
            listener,
            shutdown_tx,
            monitor,
        })
    }

    /// Get a shutdown sender for external shutdown triggers
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the server until shutdown
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, _)) => {
                            let monitor = self.monitor.clone();
                            let shutdown_tx = self.shutdown_tx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, monitor, shutdown_tx).await {
                                    error!("Client error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }
}

async fn handle_client(
    stream: UnixStream,
    monitor: Arc<StatusMonitor>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<()> {
    let (reader, writer) = stream.into_split();
    let writer: Arc<Mutex<OwnedWriteHalf>> = Arc::new(Mutex::new(writer));
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    let mut event_rx = monitor.subscribe();
    let writer_clone = writer.clone();
    let event_cancel = CancellationToken::new();
    let event_cancel_clone = event_cancel.clone();
    let event_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = event_cancel_clone.cancelled() => break,
                result = event_rx.recv() => {
                    match result {
                        Ok(event) => {
                            if let Ok(json) = EventMessage::from(&event).to_json_line() {
                                let mut w = writer_clone.lock().await;
                                if w.write_all(json.as_bytes()).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Event forwarder lagged, dropped {} events", n);
                            continue;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
    });

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            break;
        }

        let (response, exiting) = match serde_json::from_str::<Request>(&line) {
            Ok(req) => {
                let exiting = req.method == EXIT;
                (handle_request(req, &monitor).await, exiting)
            }
            Err(e) => {
                warn!("Parse error: {}", e);
                (Response::error(None, PARSE_ERROR, e.to_string()), false)
            }
        };

        let mut output = serde_json::to_string(&response)?;
        output.push('\n');

        {
            let mut w = writer.lock().await;
            w.write_all(output.as_bytes()).await?;
        }

        if exiting && response.error.is_none() {
            let _ = shutdown_tx.send(());
            break;
        }
    }

    event_cancel.cancel();
    let _ = tokio::time::timeout(std::time::Duration::from_millis(100), event_task).await;

    Ok(())
}

async fn handle_request(req: Request, monitor: &Arc<StatusMonitor>) -> Response {
    debug!(method = %req.method, "handling request");

    match req.method.as_str() {
        HAS_WATCH => handle_has_watch(req, monitor),
        ADD_WATCH => handle_add_watch(req, monitor).await,
        STATUS => handle_status(req, monitor),
        CHECK_STATUS => handle_check_status(req, monitor),
        STATS => handle_stats(req, monitor),
        EXIT => handle_exit(req, monitor).await,
        _ => {
            warn!("Unknown method: {}", req.method);
            Response::error(
                req.id,
                METHOD_NOT_FOUND,
                format!("Unknown method: {}", req.method),
            )
        }
    }
}

fn handle_has_watch(req: Request, monitor: &StatusMonitor) -> Response {
    let path = require_path_param!(req, "path");
    Response::success(req.id, monitor.has_watch(&path))
}

async fn handle_add_watch(req: Request, monitor: &Arc<StatusMonitor>) -> Response {
    let path = require_path_param!(req, "path");
    let monitor = monitor.clone();

    match tokio::task::spawn_blocking(move || monitor.add_watch(&path)).await {
        Ok(Ok(_)) => Response::success(req.id, Value::Null),
        Ok(Err(e)) => internal_error(req.id, e),
        Err(e) => internal_error(req.id, e),
    }
}

fn handle_status(req: Request, monitor: &StatusMonitor) -> Response {
    let path = require_path_param!(req, "path");
    let invalidate = optional_bool_param!(req, "invalidate").unwrap_or(false);
    let bypass = optional_bool_param!(req, "bypass").unwrap_or(false);

    monitor.status(&path, invalidate, bypass);
    Response::success(req.id, Value::Null)
}

fn handle_check_status(req: Request, monitor: &StatusMonitor) -> Response {
    let path = require_path_param!(req, "path");
    let recurse = optional_bool_param!(req, "recurse").unwrap_or(false);
    let invalidate = optional_bool_param!(req, "invalidate").unwrap_or(false);
    let summary = optional_bool_param!(req, "summary").unwrap_or(false);

    let result = monitor.check_status(&path, recurse, invalidate, summary);
    Response::success(
        req.id,
        json!({
            "statuses": statuses_to_value(&result.statuses),
            "summary": result.summary,
        }),
    )
}

fn handle_stats(req: Request, monitor: &StatusMonitor) -> Response {
    match serde_json::to_value(monitor.stats()) {
        Ok(stats) => Response::success(req.id, stats),
        Err(e) => internal_error(req.id, e),
    }
}

async fn handle_exit(req: Request, monitor: &Arc<StatusMonitor>) -> Response {
    let monitor = monitor.clone();
    match tokio::task::spawn_blocking(move || monitor.exit()).await {
        Ok(()) => {
            info!("Exit requested by client");
            Response::success(req.id, Value::Null)
        }
        Err(e) => internal_error(req.id, e),
    }
}
