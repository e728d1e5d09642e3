use async_trait::async_trait;
use push_ref::ProjectId;

use crate::Error;

/// An issue tracker integration that mirrors branches and commits.
///
/// Only the lookup is synchronous: syncing and removal happen through the
/// [`Job::SyncIssueTrackerBranch`](crate::Job::SyncIssueTrackerBranch) and
/// [`Job::RemoveIssueTrackerBranch`](crate::Job::RemoveIssueTrackerBranch)
/// jobs.
#[async_trait]
pub trait IssueTrackerSync: Send + Sync {
    /// Returns true if the tracker already knows the branch by an issue key.
    async fn has_issue_keys(&self, project: ProjectId, branch: &str) -> Result<bool, Error>;
}
