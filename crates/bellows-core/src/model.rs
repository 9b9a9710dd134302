//! Project model snapshot types.

use serde::{Deserialize, Serialize};

/// Read-only snapshot of a project as seen by the daemon.
///
/// A model is built once per retrieval request and never mutated after.
/// The root project has `parent == None` and `path == ":"`; every child
/// carries the colon-qualified path of its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectModel {
    /// Human-readable project name from the manifest.
    pub name: String,
    /// Colon-qualified path (`:` for the root, `:lib` for a child).
    pub path: String,
    /// Path of the parent project, `None` for the root.
    pub parent: Option<String>,
    /// Child project snapshots, ordered by name.
    pub children: Vec<ProjectModel>,
    /// Names of the tasks launchable on this project.
    pub tasks: Vec<String>,
}

impl ProjectModel {
    /// True for the root of a model tree.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Look up a direct child by name.
    pub fn child(&self, name: &str) -> Option<&ProjectModel> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProjectModel {
        ProjectModel {
            name: "demo".to_string(),
            path: ":".to_string(),
            parent: None,
            children: vec![ProjectModel {
                name: "lib".to_string(),
                path: ":lib".to_string(),
                parent: Some(":".to_string()),
                children: vec![],
                tasks: vec!["check".to_string()],
            }],
            tasks: vec!["projects".to_string(), "tasks".to_string()],
        }
    }

    #[test]
    fn test_root_has_no_parent() {
        let model = sample();
        assert!(model.is_root());
        assert_eq!(model.path, ":");
    }

    #[test]
    fn test_child_lookup() {
        let model = sample();
        let lib = model.child("lib").expect("child should exist");
        assert_eq!(lib.path, ":lib");
        assert_eq!(lib.parent.as_deref(), Some(":"));
        assert!(model.child("missing").is_none());
    }

    #[test]
    fn test_round_trips_through_json() {
        let model = sample();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["parent"], serde_json::Value::Null);
        let back: ProjectModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }
}
