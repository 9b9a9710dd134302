//! Project model retrieval.

use crate::error::ModelError;
use crate::wire;
use bellows_core::ProjectModel;
use std::path::PathBuf;

/// Fetches a [`ProjectModel`] snapshot from the daemon.
pub struct ModelBuilder {
    socket: PathBuf,
    project_dir: PathBuf,
}

impl ModelBuilder {
    pub(crate) fn new(socket: PathBuf, project_dir: PathBuf) -> Self {
        Self {
            socket,
            project_dir,
        }
    }

    /// Blocking (awaited) retrieval; a fresh snapshot is built per call.
    pub async fn fetch(&self) -> Result<ProjectModel, ModelError> {
        let params = serde_json::json!({ "project_dir": &self.project_dir });
        let value = wire::request(&self.socket, "model.get", params).await?;
        serde_json::from_value(value)
            .map_err(|e| ModelError::Retrieval(format!("malformed model payload: {e}")))
    }
}
