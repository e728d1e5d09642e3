use std::{collections::HashSet, convert::TryFrom};

use derive_more::{Display, From, FromStr, Into};
use serde::{Deserialize, Serialize};

use crate::{Error, PushOptions, ReferenceChange};

/// The CI configuration file used when a project does not override it.
pub const DEFAULT_CI_CONFIG_PATH: &str = ".gitlab-ci.yml";

#[derive(
    Debug, Clone, Copy, Deserialize, Serialize, Display, From, FromStr, Into, Hash, PartialEq, Eq,
    PartialOrd, Ord,
)]
pub struct ProjectId(u64);

#[derive(
    Debug, Clone, Copy, Deserialize, Serialize, Display, From, FromStr, Into, Hash, PartialEq, Eq,
    PartialOrd, Ord,
)]
pub struct ActorId(u64);

/// The user who pushed.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Actor {
    pub id: ActorId,
    pub username: String,
    pub name: String,
    pub email: String,
}

/// The project that owns the pushed repository.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub path_with_namespace: String,

    /// `None` until the first branch is pushed to an empty repository.
    #[serde(default)]
    pub default_branch: Option<String>,

    #[serde(default)]
    pub ci_config_path: Option<String>,

    /// The project this one was forked from, if any.
    #[serde(default)]
    pub fork_source: Option<ProjectId>,
}

impl Project {
    pub fn ci_config_path(&self) -> &str {
        self.ci_config_path
            .as_deref()
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_CI_CONFIG_PATH)
    }

    /// Returns true if `branch` is the default branch. A project without a
    /// default branch treats every branch as its default, since the first
    /// branch pushed will become it.
    pub fn is_default_branch(&self, branch: &str) -> bool {
        match &self.default_branch {
            Some(default_branch) => default_branch == branch,
            None => true,
        }
    }
}

/// Request scoped context carried into log lines.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PushContext {
    #[serde(default)]
    pub correlation_id: String,
}

/// A single push: who pushed, where, and which refs moved.
///
/// Built once at the ingestion boundary. Sequence indices are unique within a
/// push; this is checked on construction and deserialisation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "RawPush")]
pub struct Push {
    pub actor: Actor,
    pub project: Project,
    pub changes: Vec<ReferenceChange>,

    #[serde(default)]
    pub push_options: PushOptions,

    #[serde(default)]
    pub context: PushContext,
}

impl Push {
    pub fn new(
        actor: Actor,
        project: Project,
        changes: Vec<ReferenceChange>,
        push_options: PushOptions,
        context: PushContext,
    ) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        for change in changes.iter() {
            if !seen.insert(change.index()) {
                return Err(Error::DuplicateIndex(change.index()));
            }
        }

        Ok(Self {
            actor,
            project,
            changes,
            push_options,
            context,
        })
    }

    /// The changes in sequence index order.
    pub fn ordered_changes(&self) -> Vec<&ReferenceChange> {
        let mut changes: Vec<&ReferenceChange> = self.changes.iter().collect();
        changes.sort_by_key(|change| change.index());
        changes
    }
}

#[derive(Deserialize)]
struct RawPush {
    actor: Actor,
    project: Project,
    changes: Vec<ReferenceChange>,
    #[serde(default)]
    push_options: PushOptions,
    #[serde(default)]
    context: PushContext,
}

impl TryFrom<RawPush> for Push {
    type Error = Error;

    fn try_from(raw: RawPush) -> Result<Self, Self::Error> {
        Self::new(
            raw.actor,
            raw.project,
            raw.changes,
            raw.push_options,
            raw.context,
        )
    }
}
