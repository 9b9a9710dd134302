//! Build launch configuration and execution.

use crate::error::BuildError;
use crate::wire;
use bellows_core::{OperationType, ProgressEvent};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{trace, warn};

/// Receives the terminal outcome of an asynchronous launch.
///
/// Exactly one of the two methods is invoked, exactly once, on a task
/// that is not necessarily the caller's; both consume the handler, so
/// double delivery is unrepresentable. A failed build arrives through
/// [`OutcomeHandler::on_failure`] and is never raised as an error from
/// the launching call.
pub trait OutcomeHandler: Send {
    fn on_complete(self);
    fn on_failure(self, failure: BuildError);
}

/// A oneshot sender works as a handler for callers who prefer awaiting.
impl OutcomeHandler for tokio::sync::oneshot::Sender<Result<(), BuildError>> {
    fn on_complete(self) {
        let _ = self.send(Ok(()));
    }

    fn on_failure(self, failure: BuildError) {
        let _ = self.send(Err(failure));
    }
}

type ProgressCallback = Box<dyn FnMut(&ProgressEvent) + Send>;

/// Configures and launches one build.
///
/// The launch moves Configured → Running → Succeeded/Failed; both run
/// methods consume the launcher, so a launch cannot be reconfigured or
/// reused once running.
pub struct BuildLauncher {
    socket: PathBuf,
    project_dir: PathBuf,
    launches: Arc<Mutex<Vec<JoinHandle<()>>>>,
    tasks: Vec<String>,
    stdout: Option<Box<dyn Write + Send>>,
    stderr: Option<Box<dyn Write + Send>>,
    listeners: Vec<(ProgressCallback, HashSet<OperationType>)>,
}

impl BuildLauncher {
    pub(crate) fn new(
        socket: PathBuf,
        project_dir: PathBuf,
        launches: Arc<Mutex<Vec<JoinHandle<()>>>>,
    ) -> Self {
        Self {
            socket,
            project_dir,
            launches,
            tasks: Vec::new(),
            stdout: None,
            stderr: None,
            listeners: Vec::new(),
        }
    }

    /// Which tasks to run, as colon-qualified paths resolved by the daemon.
    /// Must be called before launching.
    pub fn for_tasks<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tasks = tasks.into_iter().map(Into::into).collect();
        self
    }

    /// Redirect the daemon's standard output stream into a caller-owned sink.
    pub fn standard_output(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stdout = Some(Box::new(sink));
        self
    }

    /// Redirect the daemon's standard error stream into a caller-owned sink.
    pub fn standard_error(mut self, sink: impl Write + Send + 'static) -> Self {
        self.stderr = Some(Box::new(sink));
        self
    }

    /// Register a progress listener for the given operation categories.
    ///
    /// The callback is invoked once per matching event, in emission order,
    /// on the task driving the launch: within `run()` itself for
    /// synchronous launches, on the spawned task for asynchronous ones.
    /// Listeners must not panic; an unwinding listener takes the launch
    /// down with it.
    pub fn add_progress_listener<F, T>(mut self, callback: F, categories: T) -> Self
    where
        F: FnMut(&ProgressEvent) + Send + 'static,
        T: IntoIterator<Item = OperationType>,
    {
        self.listeners
            .push((Box::new(callback), categories.into_iter().collect()));
        self
    }

    /// Launch and block (await) until the terminal state.
    ///
    /// Returns normally only on success; a failed build surfaces as
    /// [`BuildError::Failure`] with the daemon's diagnostic, which is
    /// also written to the standard error sink.
    pub async fn run(mut self) -> Result<(), BuildError> {
        self.execute().await
    }

    /// Launch without blocking; the outcome reaches `handler` exactly once.
    ///
    /// Progress listeners may fire concurrently with the caller's
    /// continuing execution until the terminal callback. The launch is
    /// registered with its connection: closing the connection waits for
    /// the handler to have run.
    pub fn run_async<H>(mut self, handler: H)
    where
        H: OutcomeHandler + 'static,
    {
        let launches = self.launches.clone();
        let handle = tokio::spawn(async move {
            match self.execute().await {
                Ok(()) => handler.on_complete(),
                Err(failure) => handler.on_failure(failure),
            }
        });
        launches.lock().unwrap().push(handle);
    }

    async fn execute(&mut self) -> Result<(), BuildError> {
        if self.tasks.is_empty() {
            return Err(BuildError::NoTasks);
        }

        let socket = self.socket.clone();
        let params = serde_json::json!({
            "project_dir": &self.project_dir,
            "tasks": &self.tasks,
        });

        let result =
            wire::request_streaming(&socket, "build.launch", params, |kind, data| {
                self.dispatch(kind, data)
            })
            .await;
        self.flush_sinks();

        result.map(|_| ()).map_err(BuildError::from)
    }

    fn dispatch(&mut self, kind: &str, data: &serde_json::Value) {
        match kind {
            "progress" => {
                let event: ProgressEvent = match serde_json::from_value(data.clone()) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Dropping malformed progress event: {e}");
                        return;
                    }
                };
                for (callback, categories) in &mut self.listeners {
                    if categories.contains(&event.operation) {
                        callback(&event);
                    }
                }
            }
            "output" => {
                let content = data.get("content").and_then(|v| v.as_str()).unwrap_or("");
                let sink = match data.get("stream").and_then(|v| v.as_str()) {
                    Some("stdout") => self.stdout.as_mut(),
                    Some("stderr") => self.stderr.as_mut(),
                    _ => None,
                };
                if let Some(sink) = sink {
                    if let Err(e) = sink.write_all(content.as_bytes()) {
                        warn!("Output sink write failed: {e}");
                    }
                }
            }
            other => trace!("Ignoring unknown event kind '{other}'"),
        }
    }

    fn flush_sinks(&mut self) {
        for sink in [self.stdout.as_mut(), self.stderr.as_mut()]
            .into_iter()
            .flatten()
        {
            if let Err(e) = sink.flush() {
                warn!("Output sink flush failed: {e}");
            }
        }
    }
}
