use push_ref::{Commit, Revision};

/// The maximum number of commits processed per reference change.
pub const PROCESS_COMMIT_LIMIT: usize = 100;

/// The commits considered for a single reference change, oldest first.
///
/// Repository queries for a window ask for one commit more than the limit:
/// receiving that extra commit is how overflow is detected without ever
/// counting the full range.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitWindow {
    commits: Vec<Commit>,
    overflow: bool,
}

impl CommitWindow {
    /// The number of commits to request from the repository.
    pub const THRESHOLD: usize = PROCESS_COMMIT_LIMIT + 1;

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(commit: Commit) -> Self {
        Self {
            commits: vec![commit],
            overflow: false,
        }
    }

    /// Builds a window from commits in oldest first order, keeping the newest
    /// [`PROCESS_COMMIT_LIMIT`] commits.
    pub fn from_oldest_first(mut commits: Vec<Commit>) -> Self {
        let overflow = commits.len() > PROCESS_COMMIT_LIMIT;
        if overflow {
            commits.drain(..commits.len() - PROCESS_COMMIT_LIMIT);
        }

        Self { commits, overflow }
    }

    /// Builds a window from commits in newest first order, as returned by a
    /// log walk from a tip.
    pub fn from_newest_first(mut commits: Vec<Commit>) -> Self {
        commits.reverse();
        Self::from_oldest_first(commits)
    }

    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    /// The newest commit in the window.
    pub fn latest(&self) -> Option<&Commit> {
        self.commits.last()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }

    /// Returns true if the repository had more commits than the window holds.
    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    pub fn ids(&self) -> Vec<Revision> {
        self.commits.iter().map(|commit| commit.id.clone()).collect()
    }
}
