//! Client error taxonomy.
//!
//! No retries happen at this layer; daemon diagnostics are surfaced
//! verbatim and the caller decides on retry policy.

use crate::wire::WireError;
use std::path::PathBuf;
use thiserror::Error;

/// The daemon could not be started or reached.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no project directory configured; call for_project_directory first")]
    MissingProjectDirectory,

    #[error("failed to start build daemon: {0}")]
    DaemonStart(String),

    #[error("build daemon unreachable at {}: {message}", socket.display())]
    Unreachable { socket: PathBuf, message: String },

    #[error("daemon handshake failed: {0}")]
    Handshake(String),
}

/// The daemon could not produce the requested model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("connection to daemon lost: {0}")]
    Connection(String),

    #[error("{0}")]
    Retrieval(String),
}

/// A build launch did not reach a successful terminal state.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no tasks configured; call for_tasks before launching")]
    NoTasks,

    #[error("connection to daemon lost: {0}")]
    Connection(String),

    /// Task resolution or execution failed; the message (and the standard
    /// error sink) describe the cause.
    #[error("{message}")]
    Failure { message: String },
}

impl From<WireError> for ModelError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Rpc { message, .. } => ModelError::Retrieval(message),
            other => ModelError::Connection(other.to_string()),
        }
    }
}

impl From<WireError> for BuildError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::Rpc { message, .. } => BuildError::Failure { message },
            other => BuildError::Connection(other.to_string()),
        }
    }
}
