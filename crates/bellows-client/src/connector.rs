//! Connector: binds a project directory to a daemon session.

use crate::connection::Connection;
use crate::error::ConnectError;
use crate::wire;
use bellows_daemon::lifecycle;
use std::path::PathBuf;

/// Idle timeout handed to daemons this connector spawns.
const SPAWNED_DAEMON_IDLE_SECS: u64 = 3600;

/// Builder for daemon connections.
///
/// ```ignore
/// let connection = Connector::new()
///     .for_project_directory("/path/to/project")
///     .connect()
///     .await?;
/// ```
pub struct Connector {
    project_dir: Option<PathBuf>,
    socket: Option<PathBuf>,
    auto_start: bool,
}

impl Connector {
    pub fn new() -> Self {
        Self {
            project_dir: None,
            socket: None,
            auto_start: true,
        }
    }

    /// The project directory this connection is rooted at. Required.
    pub fn for_project_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Override the daemon socket path (defaults to the runtime directory).
    pub fn socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket = Some(path.into());
        self
    }

    /// Whether to spawn a daemon when none is reachable. Defaults to true;
    /// tests running an in-process server turn this off.
    pub fn auto_start(mut self, enabled: bool) -> Self {
        self.auto_start = enabled;
        self
    }

    /// Open a connection, spawning the daemon if allowed and needed.
    ///
    /// Verifies reachability with a ping round-trip so failures surface
    /// here rather than on the first real operation.
    pub async fn connect(self) -> Result<Connection, ConnectError> {
        let project_dir = self
            .project_dir
            .ok_or(ConnectError::MissingProjectDirectory)?;
        let socket = self.socket.unwrap_or_else(lifecycle::socket_path);

        if self.auto_start {
            lifecycle::ensure_daemon(&socket, Some(SPAWNED_DAEMON_IDLE_SECS))
                .await
                .map_err(|e| ConnectError::DaemonStart(format!("{e:#}")))?;
        }

        match wire::request(&socket, "ping", serde_json::json!({})).await {
            Ok(reply) if reply == "pong" => {}
            Ok(reply) => {
                return Err(ConnectError::Handshake(format!(
                    "unexpected ping reply: {reply}"
                )))
            }
            Err(e) => {
                return Err(ConnectError::Unreachable {
                    socket,
                    message: e.to_string(),
                })
            }
        }

        Ok(Connection::new(project_dir, socket))
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}
