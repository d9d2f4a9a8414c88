//! Simulation tasks and their on-disk form.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AgentError, Result};

/// What the agent is asked to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Write the review a given user would leave for a given item.
    #[default]
    #[serde(alias = "user_behavior_simulation")]
    Simulation,
    #[serde(alias = "recommendation_task")]
    Recommendation,
}

/// One unit of work: a user and the item they review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub user_id: String,
    pub item_id: String,
    #[serde(rename = "type", default)]
    pub kind: TaskKind,
}

impl Task {
    pub fn simulation(user_id: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            kind: TaskKind::Simulation,
        }
    }
}

/// Load every `task_<n>.json` in `dir`, ordered by `n`.
///
/// Other files are ignored.
pub fn load_tasks(dir: impl AsRef<Path>) -> Result<Vec<Task>> {
    let dir = dir.as_ref();
    let mut numbered: Vec<(u64, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(dir).map_err(|e| dataset_error(dir, e))? {
        let path = entry?.path();
        let Some(n) = task_number(&path) else {
            continue;
        };
        numbered.push((n, path));
    }
    numbered.sort_by_key(|(n, _)| *n);

    let tasks = numbered
        .into_iter()
        .map(|(_, path)| {
            let text = std::fs::read_to_string(&path).map_err(|e| dataset_error(&path, e))?;
            debug!(path = %path.display(), "loaded task");
            serde_json::from_str(&text).map_err(|e| dataset_error(&path, e))
        })
        .collect::<Result<Vec<Task>>>()?;

    info!(dir = %dir.display(), count = tasks.len(), "tasks loaded");
    Ok(tasks)
}

fn task_number(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("task_")?.strip_suffix(".json")?.parse().ok()
}

fn dataset_error(path: &Path, err: impl std::fmt::Display) -> AgentError {
    AgentError::Dataset {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_kind_defaults_and_aliases() {
        let t: Task = serde_json::from_str(r#"{"user_id":"u","item_id":"i"}"#).unwrap();
        assert_eq!(t.kind, TaskKind::Simulation);

        let t: Task = serde_json::from_str(
            r#"{"type":"user_behavior_simulation","user_id":"u","item_id":"i"}"#,
        )
        .unwrap();
        assert_eq!(t, Task::simulation("u", "i"));
    }

    #[test]
    fn loads_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        for n in [10, 2, 1] {
            std::fs::write(
                dir.path().join(format!("task_{n}.json")),
                format!(r#"{{"user_id":"u{n}","item_id":"i{n}"}}"#),
            )
            .unwrap();
        }
        std::fs::write(dir.path().join("README.md"), "ignored").unwrap();

        let tasks = load_tasks(dir.path()).unwrap();
        let users: Vec<&str> = tasks.iter().map(|t| t.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2", "u10"]);
    }

    #[test]
    fn malformed_task_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("task_0.json"), "{").unwrap();
        let err = load_tasks(dir.path()).unwrap_err();
        assert!(err.to_string().contains("task_0.json"));
    }
}
