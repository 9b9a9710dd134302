//! Unix socket server for JSON-RPC.

use crate::protocol::{
    BuildEventMessage, Request, Response, BUILD_FAILED, INTERNAL_ERROR, INVALID_PARAMS,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use crate::registry::ProjectRegistry;
use crate::runner::{BuildRunner, EventSink};
use crate::{require_str_array_param, require_str_param};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Daemon server that listens on a Unix socket.
pub struct Server {
    listener: UnixListener,
    socket_path: PathBuf,
    shutdown_tx: broadcast::Sender<()>,
    registry: Arc<ProjectRegistry>,
    idle_timeout: Option<Duration>,
}

impl Server {
    /// Bind to a Unix socket path.
    pub fn bind(path: &Path) -> Result<Self> {
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
            socket_path: path.to_path_buf(),
            shutdown_tx,
            registry: Arc::new(ProjectRegistry::new()),
            idle_timeout: None,
        })
    }

    /// Exit after this long with no connected clients and no new activity.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Get a shutdown sender for external shutdown triggers.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the server until shutdown.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let active = Arc::new(AtomicUsize::new(0));
        let last_activity = Arc::new(Mutex::new(Instant::now()));

        if let Some(timeout) = self.idle_timeout {
            tokio::spawn(idle_watchdog(
                timeout,
                active.clone(),
                last_activity.clone(),
                self.shutdown_tx.clone(),
            ));
        }

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Daemon shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            *last_activity.lock().unwrap() = Instant::now();
                            active.fetch_add(1, Ordering::SeqCst);
                            let registry = self.registry.clone();
                            let shutdown_tx = self.shutdown_tx.clone();
                            let active = active.clone();
                            let last_activity = last_activity.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, registry, shutdown_tx).await {
                                    debug!("Client connection ended: {e}");
                                }
                                *last_activity.lock().unwrap() = Instant::now();
                                active.fetch_sub(1, Ordering::SeqCst);
                            });
                        }
                        Err(e) => warn!("Accept failed: {e}"),
                    }
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn idle_watchdog(
    timeout: Duration,
    active: Arc<AtomicUsize>,
    last_activity: Arc<Mutex<Instant>>,
    shutdown_tx: broadcast::Sender<()>,
) {
    let tick = Duration::from_millis((timeout.as_millis() as u64 / 4).clamp(10, 1000));
    loop {
        tokio::time::sleep(tick).await;
        let idle_for = last_activity.lock().unwrap().elapsed();
        if active.load(Ordering::SeqCst) == 0 && idle_for >= timeout {
            info!("Idle for {:?}, shutting down", idle_for);
            let _ = shutdown_tx.send(());
            break;
        }
    }
}

async fn handle_client(
    stream: UnixStream,
    registry: Arc<ProjectRegistry>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<()> {
    let (read, mut write) = stream.into_split();
    let mut reader = BufReader::new(read);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let req: Request = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                let resp = Response::error(None, PARSE_ERROR, format!("Malformed request: {e}"));
                write_response(&mut write, &resp).await?;
                continue;
            }
        };

        match req.method.as_str() {
            "ping" => {
                write_response(&mut write, &Response::success(req.id.clone(), "pong")).await?;
            }
            "shutdown" => {
                write_response(
                    &mut write,
                    &Response::success(req.id.clone(), serde_json::Value::Null),
                )
                .await?;
                let _ = shutdown_tx.send(());
                return Ok(());
            }
            "model.get" => {
                let resp = handle_model(&req, &registry).await;
                write_response(&mut write, &resp).await?;
            }
            "build.launch" => {
                let resp = handle_build(&req, &registry, &mut write).await;
                write_response(&mut write, &resp).await?;
            }
            other => {
                let resp = Response::error(
                    req.id.clone(),
                    METHOD_NOT_FOUND,
                    format!("Unknown method: {other}"),
                );
                write_response(&mut write, &resp).await?;
            }
        }
    }
}

async fn handle_model(req: &Request, registry: &ProjectRegistry) -> Response {
    let dir = require_str_param!(req, "project_dir");
    match registry.get_or_load(Path::new(dir)).await {
        Ok(manifest) => match serde_json::to_value(manifest.model()) {
            Ok(model) => Response::success(req.id.clone(), model),
            Err(e) => {
                error!("Model serialization failed: {e}");
                Response::error(req.id.clone(), INTERNAL_ERROR, "Internal server error")
            }
        },
        Err(e) => Response::error(req.id.clone(), INTERNAL_ERROR, format!("{e:#}")),
    }
}

async fn handle_build(
    req: &Request,
    registry: &ProjectRegistry,
    write: &mut OwnedWriteHalf,
) -> Response {
    let dir = require_str_param!(req, "project_dir").to_string();
    let tasks = require_str_array_param!(req, "tasks");
    if tasks.is_empty() {
        return Response::error(req.id.clone(), INVALID_PARAMS, "No tasks requested");
    }

    let manifest = match registry.get_or_load(Path::new(&dir)).await {
        Ok(manifest) => manifest,
        Err(e) => return Response::error(req.id.clone(), INTERNAL_ERROR, format!("{e:#}")),
    };

    let runner = BuildRunner::new(manifest);
    debug!(build_id = %runner.build_id(), "Launching build");
    let mut sink = SocketSink { writer: write };
    match runner.run(&tasks, &mut sink).await {
        Ok(()) => Response::success(req.id.clone(), serde_json::json!({ "status": "success" })),
        Err(e) if e.is_build_failure() => {
            Response::error(req.id.clone(), BUILD_FAILED, e.to_string())
        }
        Err(e) => {
            error!("Event stream failure during build: {e}");
            Response::error(req.id.clone(), INTERNAL_ERROR, "Internal server error")
        }
    }
}

/// Writes build events to the launching client's stream.
struct SocketSink<'a> {
    writer: &'a mut OwnedWriteHalf,
}

#[async_trait]
impl EventSink for SocketSink<'_> {
    async fn emit(&mut self, message: BuildEventMessage) -> Result<()> {
        let line = message.to_json_line()?;
        self.writer.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<()> {
    let line = response.to_json_line()?;
    writer.write_all(line.as_bytes()).await?;
    Ok(())
}
