use std::collections::HashSet;

use async_trait::async_trait;
use push_ref::ProjectId;

use crate::Error;

#[async_trait]
pub trait MergeRequestIndex: Send + Sync {
    /// Filters `branches` down to those that are the source or target of an
    /// open merge request in the project.
    async fn open_merge_request_branches(
        &self,
        project: ProjectId,
        branches: &[String],
    ) -> Result<HashSet<String>, Error>;
}
