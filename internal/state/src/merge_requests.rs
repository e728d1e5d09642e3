use std::collections::HashSet;

use async_trait::async_trait;
use git_push_hooks_services::{Error, MergeRequestIndex};
use push_ref::ProjectId;

/// The branches with open merge requests, shared by every project.
#[derive(Debug, Clone, Default)]
pub struct MergeRequests {
    branches: HashSet<String>,
}

impl MergeRequests {
    pub fn new<I, S>(branches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            branches: branches.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl MergeRequestIndex for MergeRequests {
    async fn open_merge_request_branches(
        &self,
        _project: ProjectId,
        branches: &[String],
    ) -> Result<HashSet<String>, Error> {
        Ok(branches
            .iter()
            .filter(|branch| self.branches.contains(*branch))
            .cloned()
            .collect())
    }
}
