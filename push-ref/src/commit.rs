use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Identity, Revision};

/// A commit as supplied by the repository service.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Commit {
    pub id: Revision,

    #[serde(default)]
    pub parent_ids: Vec<Revision>,

    pub message: String,
    pub author: Identity,
    pub authored_date: DateTime<Utc>,

    /// The paths this commit changed relative to its first parent.
    #[serde(default)]
    pub changed_paths: Vec<PathChange>,
}

impl Commit {
    /// The first line of the commit message.
    pub fn title(&self) -> &str {
        self.message.lines().next().unwrap_or_default().trim_end()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// Returns true if the commit touched `path`, on either side of a rename.
    pub fn touches(&self, path: &str) -> bool {
        self.changed_paths.iter().any(|change| {
            change.new_path.as_deref() == Some(path) || change.old_path.as_deref() == Some(path)
        })
    }

    /// Iterates over the paths this commit changed, in the form used by push
    /// payloads.
    pub fn paths_by_operation(&self, operation: PathOperation) -> impl Iterator<Item = &str> {
        self.changed_paths
            .iter()
            .filter(move |change| change.operation == operation)
            .filter_map(|change| change.path())
    }
}

/// The kind of change made to a single path.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PathOperation {
    Added,
    Modified,
    Deleted,
    Renamed,
}

/// A path level change between two revisions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PathChange {
    pub operation: PathOperation,

    #[serde(default)]
    pub old_path: Option<String>,

    #[serde(default)]
    pub new_path: Option<String>,
}

impl PathChange {
    pub fn added<S: Into<String>>(path: S) -> Self {
        Self {
            operation: PathOperation::Added,
            old_path: None,
            new_path: Some(path.into()),
        }
    }

    pub fn modified<S: Into<String>>(path: S) -> Self {
        let path = path.into();
        Self {
            operation: PathOperation::Modified,
            old_path: Some(path.clone()),
            new_path: Some(path),
        }
    }

    pub fn deleted<S: Into<String>>(path: S) -> Self {
        Self {
            operation: PathOperation::Deleted,
            old_path: Some(path.into()),
            new_path: None,
        }
    }

    pub fn renamed<F: Into<String>, T: Into<String>>(from: F, to: T) -> Self {
        Self {
            operation: PathOperation::Renamed,
            old_path: Some(from.into()),
            new_path: Some(to.into()),
        }
    }

    /// The path that exists after the change, or the removed path for
    /// deletions.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or_else(|| self.old_path.as_deref())
    }
}
