use std::fmt::Display;

use async_trait::async_trait;
use push_ref::{Commit, PathChange, Revision, Tag};
use serde::{Deserialize, Serialize};

use crate::Error;

/// Read access to the project repository.
#[async_trait]
pub trait RepositoryService: Send + Sync {
    /// Up to `limit` commits reachable from `revision`, newest first.
    async fn commits_since(&self, revision: &Revision, limit: usize)
        -> Result<Vec<Commit>, Error>;

    /// Commits reachable from `to` but not from `from`, oldest first.
    ///
    /// `from` is anything the repository can resolve to a commit, including a
    /// branch name. When more than `limit` commits qualify, the newest `limit`
    /// are returned.
    async fn commits_between(
        &self,
        from: &str,
        to: &Revision,
        limit: usize,
    ) -> Result<Vec<Commit>, Error>;

    /// Counts the commits reachable from `to` but not from `from`; every
    /// commit reachable from `to` when `from` is `None`.
    async fn commit_count_between(&self, from: Option<&str>, to: &Revision)
        -> Result<usize, Error>;

    /// The path level changes between two revisions. When `from` is `None`
    /// every path in `to` is reported as added.
    async fn raw_diffs_between(
        &self,
        from: Option<&Revision>,
        to: &Revision,
    ) -> Result<Vec<PathChange>, Error>;

    async fn find_tag(&self, name: &str) -> Result<Option<Tag>, Error>;

    async fn branch_exists(&self, name: &str) -> Result<bool, Error>;

    /// Filters `ids` down to commits that carry a signature of any kind.
    async fn signable_commit_ids(&self, ids: &[Revision]) -> Result<Vec<Revision>, Error>;

    /// Filters `ids` down to commits present in this repository.
    async fn existing_commit_ids(&self, ids: &[Revision]) -> Result<Vec<Revision>, Error>;
}

/// Cached data kept alongside a repository that a push may make stale.
#[async_trait]
pub trait RepositoryCache: Send + Sync {
    async fn after_push_commit(&self, branch: &str) -> Result<(), Error>;

    /// `expire_cache` forces eviction of everything derived from the branch
    /// list rather than refreshing it.
    async fn after_create_branch(&self, expire_cache: bool) -> Result<(), Error>;

    async fn after_remove_branch(&self, expire_cache: bool) -> Result<(), Error>;

    /// Copies the attributes file from the given ref into the repository's
    /// info directory.
    async fn copy_gitattributes(&self, full_ref: &str) -> Result<(), Error>;
}

/// Well known files whose cached renderings are invalidated when a push to
/// the default branch changes them.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    Avatar,
    Changelog,
    Contributing,
    GitlabCi,
    Gitignore,
    IssueTemplate,
    License,
    MergeRequestTemplate,
    Readme,
    RouteMap,
}

impl Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileType::Avatar => "avatar",
            FileType::Changelog => "changelog",
            FileType::Contributing => "contributing",
            FileType::GitlabCi => "gitlab_ci",
            FileType::Gitignore => "gitignore",
            FileType::IssueTemplate => "issue_template",
            FileType::License => "license",
            FileType::MergeRequestTemplate => "merge_request_template",
            FileType::Readme => "readme",
            FileType::RouteMap => "route_map",
        };
        write!(f, "{}", name)
    }
}
