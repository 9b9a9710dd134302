//! Project manifest loading and task resolution.
//!
//! A project directory is defined by a `bellows.toml` manifest naming the
//! root project, its tasks and one level of subprojects. Task paths are
//! colon-qualified (`:compile`, `:lib:check`); a bare name resolves
//! against the root project.

use anyhow::{bail, Context, Result};
use bellows_core::{ProjectModel, ROOT_PATH};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Manifest file name looked up in the project directory.
pub const MANIFEST_FILE: &str = "bellows.toml";

/// Tasks every root project has, independent of the manifest.
pub const BUILT_IN_TASKS: &[(&str, &str)] = &[
    ("projects", "Displays the projects hierarchy."),
    ("tasks", "Displays the runnable tasks."),
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManifest {
    project: RawProject,
    #[serde(default)]
    tasks: BTreeMap<String, RawTask>,
    #[serde(default)]
    subprojects: BTreeMap<String, RawSubproject>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawProject {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTask {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    command: Option<String>,
}

// No nested `subprojects` field: deeper nesting is rejected at parse time.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSubproject {
    #[serde(default)]
    tasks: BTreeMap<String, RawTask>,
}

/// A task declared in the manifest.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub description: Option<String>,
    /// Shell command run via `sh -c`; a task without one just succeeds.
    pub command: Option<String>,
}

/// A direct child of the root project.
#[derive(Debug, Clone)]
pub struct Subproject {
    pub name: String,
    pub tasks: BTreeMap<String, TaskSpec>,
}

/// Loaded, validated project definition for one directory.
#[derive(Debug, Clone)]
pub struct ProjectManifest {
    pub root_dir: PathBuf,
    pub name: String,
    pub tasks: BTreeMap<String, TaskSpec>,
    pub subprojects: BTreeMap<String, Subproject>,
}

/// What a resolved task path executes.
#[derive(Debug, Clone)]
pub enum TaskAction {
    /// Built-in: print the project hierarchy.
    Projects,
    /// Built-in: print the runnable tasks.
    Tasks,
    /// Manifest task with an optional shell command.
    Command(Option<String>),
}

/// A task path resolved against the project tree.
#[derive(Debug, Clone)]
pub struct ResolvedTask {
    /// Canonical colon-qualified path (`:compile`, `:lib:check`).
    pub path: String,
    pub action: TaskAction,
}

impl ProjectManifest {
    /// Load and validate the manifest from a project directory.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Not a Bellows project: no {} in {}", MANIFEST_FILE, dir.display()))?;
        let raw: RawManifest = toml::from_str(&text)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;

        validate_name("project", &raw.project.name)?;
        for (name, _) in &raw.tasks {
            validate_name("task", name)?;
            if BUILT_IN_TASKS.iter().any(|(builtin, _)| *builtin == name.as_str()) {
                bail!("Task name '{name}' is reserved for a built-in task");
            }
        }
        let mut subprojects = BTreeMap::new();
        for (name, sub) in raw.subprojects {
            validate_name("subproject", &name)?;
            for (task, _) in &sub.tasks {
                validate_name("task", task)?;
            }
            let tasks = sub
                .tasks
                .into_iter()
                .map(|(task, spec)| (task, spec.into_task()))
                .collect();
            subprojects.insert(name.clone(), Subproject { name, tasks });
        }

        Ok(Self {
            root_dir: dir.to_path_buf(),
            name: raw.project.name,
            tasks: raw
                .tasks
                .into_iter()
                .map(|(name, spec)| (name, spec.into_task()))
                .collect(),
            subprojects,
        })
    }

    /// Build an immutable model snapshot of the project tree.
    pub fn model(&self) -> ProjectModel {
        let mut tasks: Vec<String> = BUILT_IN_TASKS
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        tasks.extend(self.tasks.keys().cloned());

        let children = self
            .subprojects
            .values()
            .map(|sub| ProjectModel {
                name: sub.name.clone(),
                path: format!(":{}", sub.name),
                parent: Some(ROOT_PATH.to_string()),
                children: Vec::new(),
                tasks: sub.tasks.keys().cloned().collect(),
            })
            .collect();

        ProjectModel {
            name: self.name.clone(),
            path: ROOT_PATH.to_string(),
            parent: None,
            children,
            tasks,
        }
    }

    /// Resolve a requested task name against the project tree.
    ///
    /// `projects` and `:projects` address the root equally; `:lib:check`
    /// addresses a subproject task. Returns `None` when nothing matches.
    pub fn resolve(&self, request: &str) -> Option<ResolvedTask> {
        let trimmed = request.strip_prefix(':').unwrap_or(request);
        if trimmed.is_empty() {
            return None;
        }
        let segments: Vec<&str> = trimmed.split(':').collect();
        match segments.as_slice() {
            [name] => {
                if *name == "projects" {
                    return Some(ResolvedTask {
                        path: ":projects".to_string(),
                        action: TaskAction::Projects,
                    });
                }
                if *name == "tasks" {
                    return Some(ResolvedTask {
                        path: ":tasks".to_string(),
                        action: TaskAction::Tasks,
                    });
                }
                self.tasks.get(*name).map(|spec| ResolvedTask {
                    path: format!(":{name}"),
                    action: TaskAction::Command(spec.command.clone()),
                })
            }
            [sub, name] => {
                let subproject = self.subprojects.get(*sub)?;
                subproject.tasks.get(*name).map(|spec| ResolvedTask {
                    path: format!(":{sub}:{name}"),
                    action: TaskAction::Command(spec.command.clone()),
                })
            }
            _ => None,
        }
    }
}

impl RawTask {
    fn into_task(self) -> TaskSpec {
        TaskSpec {
            description: self.description,
            command: self.command,
        }
    }
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        bail!("Empty {kind} name in manifest");
    }
    if name.contains(':') || name.chars().any(char::is_whitespace) {
        bail!("Invalid {kind} name '{name}': colons and whitespace are not allowed");
    }
    Ok(())
}
