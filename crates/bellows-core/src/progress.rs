//! Progress event vocabulary.
//!
//! The daemon emits one event per operation state transition; clients
//! filter by [`OperationType`] category. Display names are the stable,
//! user-facing contract: `Task :path started`, `Task :path SUCCESS`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of the operation a progress event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// A single task transitioning state.
    Task,
    /// Build-level operations wrapping the task sequence.
    Generic,
}

/// Terminal result of a task or build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskResult {
    Success,
    Failed,
}

impl TaskResult {
    fn label(self) -> &'static str {
        match self {
            TaskResult::Success => "SUCCESS",
            TaskResult::Failed => "FAILED",
        }
    }
}

/// An ordered, timestamped notification of an operation state change.
///
/// Events for a given launch arrive in emission order; the terminal
/// build outcome is always delivered after the last progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub display_name: String,
    pub operation: OperationType,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    fn new(display_name: String, operation: OperationType) -> Self {
        Self {
            display_name,
            operation,
            timestamp: Utc::now(),
        }
    }

    /// `Task <path> started`
    pub fn task_started(path: &str) -> Self {
        Self::new(format!("Task {path} started"), OperationType::Task)
    }

    /// `Task <path> SUCCESS` / `Task <path> FAILED`
    pub fn task_finished(path: &str, result: TaskResult) -> Self {
        Self::new(
            format!("Task {path} {}", result.label()),
            OperationType::Task,
        )
    }

    /// `Build started`
    pub fn build_started() -> Self {
        Self::new("Build started".to_string(), OperationType::Generic)
    }

    /// `Build SUCCESS` / `Build FAILED`
    pub fn build_finished(result: TaskResult) -> Self {
        Self::new(
            format!("Build {}", result.label()),
            OperationType::Generic,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_event_display_names() {
        assert_eq!(
            ProgressEvent::task_started(":projects").display_name,
            "Task :projects started"
        );
        assert_eq!(
            ProgressEvent::task_finished(":projects", TaskResult::Success).display_name,
            "Task :projects SUCCESS"
        );
        assert_eq!(
            ProgressEvent::task_finished(":lib:check", TaskResult::Failed).display_name,
            "Task :lib:check FAILED"
        );
    }

    #[test]
    fn test_build_event_category() {
        assert_eq!(
            ProgressEvent::build_started().operation,
            OperationType::Generic
        );
        assert_eq!(
            ProgressEvent::build_finished(TaskResult::Success).display_name,
            "Build SUCCESS"
        );
    }

    #[test]
    fn test_operation_type_serializes_lowercase() {
        let event = ProgressEvent::task_started(":a");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "task");
        let back: ProgressEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.operation, OperationType::Task);
    }
}
