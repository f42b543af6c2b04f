use crate::error::{OrchestratorError, Result};

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static FRAME_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>[^/]+(?:/[^/]+)*)/(?P<task_type>[^/]+)/(?P<task_id>[^/]+)/(?P<file>[^/]+)$")
        .expect("frame path pattern is valid")
});

/// A decoded `<prefix>/<taskType>/<taskID>/<file>` object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePath {
    pub prefix: String,
    pub task_type: String,
    pub task_id: String,
    pub file: String,
}

impl FramePath {
    pub fn parse(path: &str) -> Result<Self> {
        let trimmed = path.trim_start_matches('/');
        let caps = FRAME_PATH
            .captures(trimmed)
            .ok_or_else(|| OrchestratorError::InvalidObjectPath(path.to_string()))?;

        Ok(Self {
            prefix: caps["prefix"].to_string(),
            task_type: caps["task_type"].to_string(),
            task_id: caps["task_id"].to_string(),
            file: caps["file"].to_string(),
        })
    }

    /// Same task type, task id and file under a different prefix.
    pub fn rebase(&self, prefix: &str) -> Self {
        Self {
            prefix: prefix.trim_matches('/').to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for FramePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.prefix, self.task_type, self.task_id, self.file
        )
    }
}

/// The task id segment of `path`.
pub fn task_id_from_path(path: &str) -> Result<String> {
    FramePath::parse(path).map(|p| p.task_id)
}

/// A job-carried task id that disagrees with the one in its object path.
///
/// Not an error: the path-derived id is persisted and this is logged and counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub object_path: String,
    pub carried_task_id: String,
    pub path_task_id: String,
}

impl ConsistencyWarning {
    /// `None` when the ids agree.
    pub fn check(object_path: &str, carried_task_id: &str, path_task_id: &str) -> Option<Self> {
        (carried_task_id != path_task_id).then(|| Self {
            object_path: object_path.to_string(),
            carried_task_id: carried_task_id.to_string(),
            path_task_id: path_task_id.to_string(),
        })
    }
}

impl fmt::Display for ConsistencyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "task_id mismatch for {}: carried '{}', path says '{}'",
            self.object_path, self.carried_task_id, self.path_task_id
        )
    }
}
