use std::fmt::Display;

use async_trait::async_trait;
use push_ref::ProjectId;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A repository that accumulates pushes and needs periodic maintenance.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HousekeepingTarget {
    Project(ProjectId),
    Wiki(ProjectId),
}

impl HousekeepingTarget {
    /// The key of the lease that serialises maintenance of this repository.
    pub fn lease_key(&self) -> String {
        match self {
            HousekeepingTarget::Project(id) => format!("project_housekeeping:{}", id),
            HousekeepingTarget::Wiki(id) => format!("wiki_housekeeping:{}", id),
        }
    }
}

impl Display for HousekeepingTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HousekeepingTarget::Project(id) => write!(f, "project {}", id),
            HousekeepingTarget::Wiki(id) => write!(f, "wiki {}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HousekeepingTask {
    IncrementalRepack,
    FullRepack,
    Gc,
}

#[async_trait]
pub trait HousekeepingStore: Send + Sync {
    /// Increments the push counter and returns the new value.
    async fn increment_push_count(&self, target: HousekeepingTarget) -> Result<u64, Error>;

    async fn reset_push_count(&self, target: HousekeepingTarget) -> Result<(), Error>;

    async fn execute(
        &self,
        target: HousekeepingTarget,
        task: HousekeepingTask,
    ) -> Result<(), Error>;
}
