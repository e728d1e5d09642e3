use std::fmt::Display;

use chrono::{DateTime, Utc};
use push_ref::{ActorId, Identity, ProjectId, PushOptions, RefType, Revision};
use serde::{Deserialize, Serialize};

/// The kind of push a payload describes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Push,
    TagPush,
}

impl From<RefType> for ObjectKind {
    fn from(ref_type: RefType) -> Self {
        match ref_type {
            RefType::Branch => ObjectKind::Push,
            RefType::Tag => ObjectKind::TagPush,
        }
    }
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Push => write!(f, "push"),
            ObjectKind::TagPush => write!(f, "tag_push"),
        }
    }
}

/// The canonical description of one reference change.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PushEventPayload {
    pub object_kind: ObjectKind,
    pub event_name: ObjectKind,

    /// The old revision, or the blank revision for created refs.
    pub before: String,

    /// The new revision, or the blank revision for removed refs.
    pub after: String,

    #[serde(rename = "ref")]
    pub full_ref: String,

    pub checkout_sha: Option<Revision>,
    pub message: Option<String>,

    pub user_id: ActorId,
    pub user_name: String,
    pub user_username: String,
    pub user_email: String,

    pub project_id: ProjectId,
    pub project: ProjectData,

    /// Oldest first.
    pub commits: Vec<CommitData>,
    pub total_commits_count: usize,

    pub push_options: PushOptions,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectData {
    pub id: ProjectId,
    pub path_with_namespace: String,
    pub default_branch: Option<String>,
    pub ci_config_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CommitData {
    pub id: Revision,
    pub message: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub author: Identity,
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}
