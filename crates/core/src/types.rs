use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Job identifiers are opaque strings assigned by the cluster scheduler.
pub type JobId = String;

/// Project identifiers are opaque strings owned by the persistence layer.
pub type ProjectId = String;

/// The project a job is submitted under.
///
/// `root` is the project directory on the shared filesystem. Every output
/// path handed to the cluster is expressed relative to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub project_id: ProjectId,
    pub root: PathBuf,
}

impl ProjectContext {
    pub fn new(project_id: impl Into<ProjectId>, root: impl Into<PathBuf>) -> Self {
        Self {
            project_id: project_id.into(),
            root: root.into(),
        }
    }
}

/// The user on whose behalf a job is submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub id: String,
    pub username: String,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
        }
    }
}
