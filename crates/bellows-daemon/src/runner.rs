//! Build launch execution.
//!
//! A `BuildRunner` executes one launch: it resolves every requested task
//! path up front, then runs the tasks sequentially, emitting progress and
//! output events through an [`EventSink`]. Resolution failures abort the
//! launch before any progress event is emitted.

use crate::manifest::{ProjectManifest, ResolvedTask, TaskAction, BUILT_IN_TASKS};
use crate::protocol::{BuildEventMessage, OutputStream};
use anyhow::Result;
use async_trait::async_trait;
use bellows_core::{ProgressEvent, TaskResult};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Destination for the event stream of one launch.
///
/// The server implements this over the client's socket; tests collect
/// messages in memory instead of mocking the wire.
#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, message: BuildEventMessage) -> Result<()>;
}

/// Why a launch did not reach a successful terminal state.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Task '{task}' not found in root project '{root}'.")]
    TaskNotFound { task: String, root: String },

    #[error("Execution failed for task '{path}': {detail}.")]
    TaskFailed { path: String, detail: String },

    /// The event stream to the client broke; the build outcome is unknown
    /// to the caller and must not be reported as a build failure.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

impl RunError {
    /// True for failures of the build itself, as opposed to transport loss.
    pub fn is_build_failure(&self) -> bool {
        matches!(self, RunError::TaskNotFound { .. } | RunError::TaskFailed { .. })
    }
}

/// Executes one build launch against a loaded project.
pub struct BuildRunner {
    manifest: Arc<ProjectManifest>,
    build_id: Uuid,
}

impl BuildRunner {
    pub fn new(manifest: Arc<ProjectManifest>) -> Self {
        Self {
            manifest,
            build_id: Uuid::new_v4(),
        }
    }

    pub fn build_id(&self) -> Uuid {
        self.build_id
    }

    /// Run the requested tasks in order, emitting events as they happen.
    pub async fn run(&self, tasks: &[String], sink: &mut dyn EventSink) -> Result<(), RunError> {
        let mut resolved = Vec::with_capacity(tasks.len());
        for task in tasks {
            match self.manifest.resolve(task) {
                Some(r) => resolved.push(r),
                None => {
                    let err = RunError::TaskNotFound {
                        task: task.trim_start_matches(':').to_string(),
                        root: self.manifest.name.clone(),
                    };
                    sink.emit(BuildEventMessage::output(
                        OutputStream::Stderr,
                        format!("{err}\n"),
                    ))
                    .await?;
                    return Err(err);
                }
            }
        }

        info!(build_id = %self.build_id, ?tasks, "Build started");
        sink.emit(BuildEventMessage::progress(&ProgressEvent::build_started()))
            .await?;

        for task in &resolved {
            debug!(build_id = %self.build_id, path = %task.path, "Task started");
            sink.emit(BuildEventMessage::progress(&ProgressEvent::task_started(
                &task.path,
            )))
            .await?;

            if let Some(detail) = self.execute(task, sink).await? {
                sink.emit(BuildEventMessage::progress(&ProgressEvent::task_finished(
                    &task.path,
                    TaskResult::Failed,
                )))
                .await?;
                let err = RunError::TaskFailed {
                    path: task.path.clone(),
                    detail,
                };
                sink.emit(BuildEventMessage::output(
                    OutputStream::Stderr,
                    format!("{err}\n"),
                ))
                .await?;
                sink.emit(BuildEventMessage::progress(&ProgressEvent::build_finished(
                    TaskResult::Failed,
                )))
                .await?;
                warn!(build_id = %self.build_id, "Build failed: {err}");
                return Err(err);
            }

            sink.emit(BuildEventMessage::progress(&ProgressEvent::task_finished(
                &task.path,
                TaskResult::Success,
            )))
            .await?;
        }

        sink.emit(BuildEventMessage::progress(&ProgressEvent::build_finished(
            TaskResult::Success,
        )))
        .await?;
        info!(build_id = %self.build_id, "Build finished");
        Ok(())
    }

    /// Execute one resolved task. `Ok(Some(detail))` marks the task failed.
    async fn execute(
        &self,
        task: &ResolvedTask,
        sink: &mut dyn EventSink,
    ) -> Result<Option<String>, RunError> {
        match &task.action {
            TaskAction::Projects => {
                sink.emit(BuildEventMessage::output(
                    OutputStream::Stdout,
                    self.render_projects(),
                ))
                .await?;
                Ok(None)
            }
            TaskAction::Tasks => {
                sink.emit(BuildEventMessage::output(
                    OutputStream::Stdout,
                    self.render_tasks(),
                ))
                .await?;
                Ok(None)
            }
            // A declared task without a command is a no-op that succeeds.
            TaskAction::Command(None) => Ok(None),
            TaskAction::Command(Some(command)) => self.run_command(command, sink).await,
        }
    }

    async fn run_command(
        &self,
        command: &str,
        sink: &mut dyn EventSink,
    ) -> Result<Option<String>, RunError> {
        let output = match tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.manifest.root_dir)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => return Ok(Some(format!("failed to start command: {e}"))),
        };

        if !output.stdout.is_empty() {
            sink.emit(BuildEventMessage::output(
                OutputStream::Stdout,
                String::from_utf8_lossy(&output.stdout).into_owned(),
            ))
            .await?;
        }
        if !output.stderr.is_empty() {
            sink.emit(BuildEventMessage::output(
                OutputStream::Stderr,
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ))
            .await?;
        }

        if output.status.success() {
            Ok(None)
        } else {
            let status = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            Ok(Some(format!("exit status {status}")))
        }
    }

    fn render_projects(&self) -> String {
        let mut out = format!("Root project '{}'\n", self.manifest.name);
        for sub in self.manifest.subprojects.values() {
            out.push_str(&format!("+--- Project ':{}'\n", sub.name));
        }
        out
    }

    fn render_tasks(&self) -> String {
        let mut out = format!(
            "Tasks runnable from root project '{}'\n",
            self.manifest.name
        );
        out.push_str("--------------------------------------\n");
        for (name, description) in BUILT_IN_TASKS {
            out.push_str(&format!("{name} - {description}\n"));
        }
        for (name, spec) in &self.manifest.tasks {
            match &spec.description {
                Some(description) => out.push_str(&format!("{name} - {description}\n")),
                None => out.push_str(&format!("{name}\n")),
            }
        }
        for sub in self.manifest.subprojects.values() {
            for name in sub.tasks.keys() {
                out.push_str(&format!(":{}:{}\n", sub.name, name));
            }
        }
        out
    }
}
