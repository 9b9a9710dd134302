//! A live channel to the build daemon for one project directory.

use crate::launcher::BuildLauncher;
use crate::model::ModelBuilder;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::warn;

/// Open connection to the daemon, rooted at a project directory.
///
/// The connection is owned exclusively by the caller. Releasing it with
/// [`Connection::close`] waits for every asynchronous launch started on
/// it to deliver its terminal outcome; consuming `self` makes issuing
/// operations after release impossible.
pub struct Connection {
    project_dir: PathBuf,
    socket: PathBuf,
    launches: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Connection {
    pub(crate) fn new(project_dir: PathBuf, socket: PathBuf) -> Self {
        Self {
            project_dir,
            socket,
            launches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn project_directory(&self) -> &Path {
        &self.project_dir
    }

    /// Start a model retrieval.
    pub fn model(&self) -> ModelBuilder {
        ModelBuilder::new(self.socket.clone(), self.project_dir.clone())
    }

    /// Start configuring a build launch.
    pub fn new_build(&self) -> BuildLauncher {
        BuildLauncher::new(
            self.socket.clone(),
            self.project_dir.clone(),
            self.launches.clone(),
        )
    }

    /// Release the connection.
    ///
    /// Blocks until all in-flight asynchronous launches have delivered
    /// their terminal callback; after this returns no callback runs.
    pub async fn close(self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut launches = self.launches.lock().unwrap();
            launches.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                if e.is_panic() {
                    warn!("Asynchronous launch panicked: {e}");
                }
            }
        }
    }
}
