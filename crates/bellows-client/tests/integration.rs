//! Integration tests for the client with a real daemon.
//!
//! Each test starts an in-process daemon server on a socket in a temp
//! directory and drives it through the public client API.

use bellows_client::{
    BuildError, ConnectError, Connection, Connector, ModelError, OperationType, OutcomeHandler,
    ProgressEvent,
};
use bellows_daemon::{Server, MANIFEST_FILE};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Test fixture that starts a real daemon server for integration testing
struct TestServer {
    _temp_dir: TempDir,
    socket_path: PathBuf,
    _server_handle: JoinHandle<()>,
    shutdown_handle: tokio::sync::broadcast::Sender<()>,
}

impl TestServer {
    async fn start() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create socket dir");
        let socket_path = temp_dir.path().join("daemon.sock");

        let server = Server::bind(&socket_path).expect("Failed to bind server");
        let shutdown_handle = server.shutdown_handle();

        let server_handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        // Wait for server to be ready
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            _temp_dir: temp_dir,
            socket_path,
            _server_handle: server_handle,
            shutdown_handle,
        }
    }

    async fn connect(&self, project_dir: &Path) -> Connection {
        Connector::new()
            .for_project_directory(project_dir)
            .socket(&self.socket_path)
            .auto_start(false)
            .connect()
            .await
            .expect("Failed to connect")
    }

    async fn shutdown(self) {
        let _ = self.shutdown_handle.send(());
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// A project directory with a manifest covering the test scenarios.
fn sandbox_project() -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create project dir");
    std::fs::write(
        dir.path().join(MANIFEST_FILE),
        r#"
[project]
name = "sandbox"

[tasks.slow]
command = "sleep 0.3"

[tasks.broken]
command = "exit 1"

[subprojects.lib]

[subprojects.lib.tasks.check]
command = "true"
"#,
    )
    .expect("Failed to write manifest");
    dir
}

/// Write sink shared with the test body, like a ByteArrayOutputStream.
#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

type EventLog = Arc<Mutex<Vec<ProgressEvent>>>;

/// Attach a task-filtered progress recorder to a launcher.
fn record_task_events(
    launcher: bellows_client::BuildLauncher,
) -> (bellows_client::BuildLauncher, EventLog) {
    let events: EventLog = Arc::default();
    let log = events.clone();
    let launcher = launcher.add_progress_listener(
        move |event| log.lock().unwrap().push(event.clone()),
        [OperationType::Task],
    );
    (launcher, events)
}

fn display_names(events: &EventLog) -> Vec<String> {
    events
        .lock()
        .unwrap()
        .iter()
        .map(|e| e.display_name.clone())
        .collect()
}

#[derive(Default)]
struct Outcome {
    completed: bool,
    failure: Option<BuildError>,
}

/// Captures the terminal outcome of an asynchronous launch.
#[derive(Clone, Default)]
struct OutcomeCapturingHandler(Arc<Mutex<Outcome>>);

impl OutcomeCapturingHandler {
    fn completed(&self) -> bool {
        self.0.lock().unwrap().completed
    }

    fn failure_message(&self) -> Option<String> {
        self.0.lock().unwrap().failure.as_ref().map(|f| f.to_string())
    }
}

impl OutcomeHandler for OutcomeCapturingHandler {
    fn on_complete(self) {
        self.0.lock().unwrap().completed = true;
    }

    fn on_failure(self, failure: BuildError) {
        self.0.lock().unwrap().failure = Some(failure);
    }
}

#[tokio::test]
async fn test_gets_project_model() {
    let server = TestServer::start().await;
    let project = sandbox_project();

    let connection = server.connect(project.path()).await;
    let model = connection.model().fetch().await.expect("Model fetch failed");
    connection.close().await;

    assert_eq!(model.name, "sandbox");
    assert!(model.parent.is_none());
    assert_eq!(model.path, ":");
    assert!(!model.children.is_empty());
    assert!(!model.tasks.is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_launches_existing_task_synchronously() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();

    let connection = server.connect(project.path()).await;
    let (launcher, events) = record_task_events(
        connection
            .new_build()
            .for_tasks([":projects"])
            .standard_output(stdout.clone())
            .standard_error(stderr.clone()),
    );
    launcher.run().await.expect("Build failed");
    connection.close().await;

    assert_eq!(
        display_names(&events),
        vec!["Task :projects started", "Task :projects SUCCESS"]
    );
    assert!(stdout.contents().contains("Root project 'sandbox'"));
    assert!(stderr.contents().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_launches_existing_task_asynchronously() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let stdout = SharedBuffer::default();
    let stderr = SharedBuffer::default();
    let handler = OutcomeCapturingHandler::default();

    let connection = server.connect(project.path()).await;
    let (launcher, events) = record_task_events(
        connection
            .new_build()
            .for_tasks([":projects"])
            .standard_output(stdout.clone())
            .standard_error(stderr.clone()),
    );
    launcher.run_async(handler.clone());
    // Closing blocks until the in-flight launch delivers its outcome.
    connection.close().await;

    assert!(handler.completed());
    assert!(handler.failure_message().is_none());
    assert_eq!(
        display_names(&events),
        vec!["Task :projects started", "Task :projects SUCCESS"]
    );
    assert!(stdout.contents().contains("Root project 'sandbox'"));
    assert!(stderr.contents().is_empty());

    server.shutdown().await;
}

#[tokio::test]
async fn test_launches_subproject_task() {
    let server = TestServer::start().await;
    let project = sandbox_project();

    let connection = server.connect(project.path()).await;
    let (launcher, events) = record_task_events(connection.new_build().for_tasks([":lib:check"]));
    launcher.run().await.expect("Build failed");
    connection.close().await;

    assert_eq!(
        display_names(&events),
        vec!["Task :lib:check started", "Task :lib:check SUCCESS"]
    );

    server.shutdown().await;
}

#[tokio::test]
async fn test_fails_when_launching_nonexistent_task_synchronously() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let stderr = SharedBuffer::default();

    let connection = server.connect(project.path()).await;
    let (launcher, events) = record_task_events(
        connection
            .new_build()
            .for_tasks([":foobar"])
            .standard_error(stderr.clone()),
    );
    let result = launcher.run().await;
    connection.close().await;

    match result {
        Err(BuildError::Failure { message }) => {
            assert!(message.contains("Task 'foobar' not found in root project 'sandbox'."));
        }
        other => panic!("Expected build failure, got {other:?}"),
    }
    assert!(display_names(&events).is_empty());
    assert!(stderr
        .contents()
        .contains("Task 'foobar' not found in root project 'sandbox'."));

    server.shutdown().await;
}

#[tokio::test]
async fn test_notifies_of_failure_when_launching_nonexistent_task_asynchronously() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let stderr = SharedBuffer::default();
    let handler = OutcomeCapturingHandler::default();

    let connection = server.connect(project.path()).await;
    let (launcher, events) = record_task_events(
        connection
            .new_build()
            .for_tasks([":foobar"])
            .standard_error(stderr.clone()),
    );
    launcher.run_async(handler.clone());
    connection.close().await;

    assert!(!handler.completed());
    let failure = handler.failure_message().expect("on_failure not invoked");
    assert!(failure.contains("Task 'foobar' not found in root project 'sandbox'."));
    assert!(display_names(&events).is_empty());
    assert!(stderr
        .contents()
        .contains("Task 'foobar' not found in root project 'sandbox'."));

    server.shutdown().await;
}

#[tokio::test]
async fn test_failing_command_task_fails_the_build() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let stderr = SharedBuffer::default();

    let connection = server.connect(project.path()).await;
    let (launcher, events) = record_task_events(
        connection
            .new_build()
            .for_tasks(["broken"])
            .standard_error(stderr.clone()),
    );
    let result = launcher.run().await;
    connection.close().await;

    assert!(matches!(result, Err(BuildError::Failure { .. })));
    assert_eq!(
        display_names(&events),
        vec!["Task :broken started", "Task :broken FAILED"]
    );
    assert!(stderr
        .contents()
        .contains("Execution failed for task ':broken'"));

    server.shutdown().await;
}

#[tokio::test]
async fn test_repeated_launch_is_idempotent() {
    let server = TestServer::start().await;
    let project = sandbox_project();

    for _ in 0..2 {
        let stderr = SharedBuffer::default();
        let connection = server.connect(project.path()).await;
        let (launcher, events) = record_task_events(
            connection
                .new_build()
                .for_tasks([":projects"])
                .standard_error(stderr.clone()),
        );
        launcher.run().await.expect("Build failed");
        connection.close().await;

        assert_eq!(
            display_names(&events),
            vec!["Task :projects started", "Task :projects SUCCESS"]
        );
        assert!(stderr.contents().is_empty());
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_close_blocks_until_async_launch_completes() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let handler = OutcomeCapturingHandler::default();

    let connection = server.connect(project.path()).await;
    connection
        .new_build()
        .for_tasks(["slow"])
        .run_async(handler.clone());

    let started = Instant::now();
    connection.close().await;

    // The slow task sleeps 300ms; close must not return before its outcome.
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert!(handler.completed());

    server.shutdown().await;
}

#[tokio::test]
async fn test_multiple_async_launches_on_one_connection() {
    let server = TestServer::start().await;
    let project = sandbox_project();
    let first = OutcomeCapturingHandler::default();
    let second = OutcomeCapturingHandler::default();

    let connection = server.connect(project.path()).await;
    connection
        .new_build()
        .for_tasks(["slow"])
        .run_async(first.clone());
    connection
        .new_build()
        .for_tasks([":projects"])
        .run_async(second.clone());
    connection.close().await;

    assert!(first.completed());
    assert!(second.completed());

    server.shutdown().await;
}

#[tokio::test]
async fn test_oneshot_sender_as_outcome_handler() {
    let server = TestServer::start().await;
    let project = sandbox_project();

    let connection = server.connect(project.path()).await;
    let (tx, rx) = tokio::sync::oneshot::channel();
    connection
        .new_build()
        .for_tasks([":projects"])
        .run_async(tx);

    let outcome = rx.await.expect("Outcome channel dropped");
    assert!(outcome.is_ok());
    connection.close().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_launch_without_tasks_is_rejected() {
    let server = TestServer::start().await;
    let project = sandbox_project();

    let connection = server.connect(project.path()).await;
    let result = connection.new_build().run().await;
    connection.close().await;

    assert!(matches!(result, Err(BuildError::NoTasks)));

    server.shutdown().await;
}

#[tokio::test]
async fn test_model_retrieval_fails_without_manifest() {
    let server = TestServer::start().await;
    let project = tempfile::tempdir().unwrap();

    let connection = server.connect(project.path()).await;
    let result = connection.model().fetch().await;
    connection.close().await;

    match result {
        Err(ModelError::Retrieval(message)) => {
            assert!(message.contains("Not a Bellows project"));
        }
        other => panic!("Expected retrieval error, got {other:?}"),
    }

    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_fails_without_daemon() {
    let temp_dir = tempfile::tempdir().unwrap();
    let socket_path = temp_dir.path().join("nonexistent.sock");

    let result = Connector::new()
        .for_project_directory(temp_dir.path())
        .socket(&socket_path)
        .auto_start(false)
        .connect()
        .await;

    assert!(matches!(result, Err(ConnectError::Unreachable { .. })));
}

#[tokio::test]
async fn test_build_level_events_delivered_when_subscribed() {
    let server = TestServer::start().await;
    let project = sandbox_project();

    let connection = server.connect(project.path()).await;
    let all_events: EventLog = Arc::default();
    let log = all_events.clone();
    let launcher = connection
        .new_build()
        .for_tasks([":projects"])
        .add_progress_listener(
            move |event| log.lock().unwrap().push(event.clone()),
            [OperationType::Task, OperationType::Generic],
        );
    launcher.run().await.expect("Build failed");
    connection.close().await;

    // With both categories subscribed, the build-level events bracket the
    // task-level pair.
    assert_eq!(
        display_names(&all_events),
        vec![
            "Build started",
            "Task :projects started",
            "Task :projects SUCCESS",
            "Build SUCCESS",
        ]
    );

    server.shutdown().await;
}
