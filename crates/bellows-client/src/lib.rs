//! Client library for launching builds against the Bellows daemon.
//!
//! The entry point is [`Connector`]: bind a project directory, connect,
//! then fetch a project model or launch tasks through the resulting
//! [`Connection`].
//!
//! ```ignore
//! let connection = Connector::new()
//!     .for_project_directory("/path/to/project")
//!     .connect()
//!     .await?;
//!
//! let model = connection.model().fetch().await?;
//! println!("root project: {}", model.name);
//!
//! connection
//!     .new_build()
//!     .for_tasks([":projects"])
//!     .run()
//!     .await?;
//!
//! connection.close().await;
//! ```
//!
//! Launches run either synchronously (`run().await` blocks until the
//! terminal state) or asynchronously (`run_async(handler)` returns
//! immediately and delivers the outcome to the handler exactly once).
//! Closing a connection waits for every outstanding asynchronous launch
//! to deliver its outcome; after `close` returns there are no dangling
//! callbacks.

mod connection;
mod connector;
mod error;
mod launcher;
mod model;
mod wire;

pub use connection::Connection;
pub use connector::Connector;
pub use error::{BuildError, ConnectError, ModelError};
pub use launcher::{BuildLauncher, OutcomeHandler};
pub use model::ModelBuilder;

// Re-exports from bellows-core for convenience
pub use bellows_core::{OperationType, ProgressEvent, ProjectModel, TaskResult};
