use std::collections::HashSet;

use async_trait::async_trait;
use git_push_hooks_services::{Error, IssueTrackerSync};
use push_ref::ProjectId;

/// An issue tracker that knows a fixed set of branches by issue key.
#[derive(Debug, Clone, Default)]
pub struct IssueTracker {
    keyed_branches: HashSet<String>,
}

impl IssueTracker {
    pub fn new<I, S>(keyed_branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keyed_branches: keyed_branches.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl IssueTrackerSync for IssueTracker {
    async fn has_issue_keys(&self, _project: ProjectId, branch: &str) -> Result<bool, Error> {
        Ok(self.keyed_branches.contains(branch))
    }
}
