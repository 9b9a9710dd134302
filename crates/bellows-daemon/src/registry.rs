//! Multi-project manifest registry.
//!
//! Keeps loaded manifests warm across launches, invalidating on manifest
//! file modification time so edited projects are never served stale.

use crate::manifest::{ProjectManifest, MANIFEST_FILE};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::info;

struct CachedProject {
    manifest: Arc<ProjectManifest>,
    modified: SystemTime,
}

/// Caches loaded project manifests per canonical project directory.
pub struct ProjectRegistry {
    projects: RwLock<HashMap<PathBuf, CachedProject>>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
        }
    }

    /// Get the manifest for a project directory, loading or reloading as needed.
    pub async fn get_or_load(&self, dir: &Path) -> Result<Arc<ProjectManifest>> {
        let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let modified = manifest_mtime(&canonical)?;

        {
            let projects = self.projects.read().await;
            if let Some(cached) = projects.get(&canonical) {
                if cached.modified == modified {
                    return Ok(cached.manifest.clone());
                }
            }
        }

        let manifest = Arc::new(ProjectManifest::load(&canonical)?);
        info!("Loaded project '{}' from {:?}", manifest.name, canonical);

        let mut projects = self.projects.write().await;
        projects.insert(
            canonical,
            CachedProject {
                manifest: manifest.clone(),
                modified,
            },
        );
        Ok(manifest)
    }

    /// Number of projects currently cached.
    pub async fn len(&self) -> usize {
        self.projects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.projects.read().await.is_empty()
    }
}

impl Default for ProjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn manifest_mtime(dir: &Path) -> Result<SystemTime> {
    let path = dir.join(MANIFEST_FILE);
    let meta = std::fs::metadata(&path)
        .with_context(|| format!("Not a Bellows project: no {} in {}", MANIFEST_FILE, dir.display()))?;
    meta.modified().context("Manifest mtime unavailable")
}
