//! In-memory implementations of the `git-push-hooks-services` collaborators.
//!
//! These back the test suites and the `push-replay` binary. State is shared
//! behind `Arc`s, so cloning a collaborator yields a handle onto the same
//! state.

use std::sync::Arc;

use git_push_hooks_services::{IssueTrackerSync, JobQueue, RepositoryService, Services};
use serde::{Deserialize, Serialize};

mod housekeeping;
pub use self::housekeeping::Housekeeping;

mod issue_tracker;
pub use self::issue_tracker::IssueTracker;

mod lease;
pub use self::lease::Leases;

mod merge_requests;
pub use self::merge_requests::MergeRequests;

mod recorder;
pub use self::recorder::{CacheOperation, Effect, Recorder, Surface};

mod repository;
pub use self::repository::{InMemoryRepository, RepositoryFixture};

mod signatures;
pub use self::signatures::{Signatures, SignaturesFixture};

mod wiki;
pub use self::wiki::{Wiki, WikiEvent, WikiFixture};

/// Everything a project looks like outside of the push itself.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Environment {
    #[serde(default)]
    pub repository: RepositoryFixture,

    #[serde(default)]
    pub fork_upstream: Option<RepositoryFixture>,

    /// Branches that are the source or target of an open merge request.
    #[serde(default)]
    pub merge_request_branches: Vec<String>,

    /// Present when the project has an issue tracker integration; lists the
    /// branches the tracker knows by issue key.
    #[serde(default)]
    pub issue_tracker: Option<Vec<String>>,

    #[serde(default)]
    pub signatures: SignaturesFixture,
}

/// Handles onto the in-memory state behind a [`Services`] bundle.
#[derive(Debug, Clone)]
pub struct State {
    pub repository: InMemoryRepository,
    pub recorder: Recorder,
    pub housekeeping: Housekeeping,
    pub leases: Leases,
}

impl Environment {
    /// Builds the collaborators for this environment. Jobs go to the given
    /// queue; every other effect is captured by the returned [`Recorder`].
    pub fn services(&self, recorder: Recorder, jobs: Arc<dyn JobQueue>) -> (Services, State) {
        let state = State {
            repository: InMemoryRepository::from_fixture(self.repository.clone()),
            recorder,
            housekeeping: Housekeeping::new(),
            leases: Leases::new(),
        };

        let services = Services {
            repository: Arc::new(state.repository.clone()),
            fork_upstream: self.fork_upstream.clone().map(|fixture| {
                Arc::new(InMemoryRepository::from_fixture(fixture)) as Arc<dyn RepositoryService>
            }),
            cache: Arc::new(state.recorder.clone()),
            events: Arc::new(state.recorder.clone()),
            hooks: Arc::new(state.recorder.clone()),
            jobs,
            pipelines: Arc::new(state.recorder.clone()),
            issue_tracker: self.issue_tracker.clone().map(|branches| {
                Arc::new(IssueTracker::new(branches))
                    as Arc<dyn IssueTrackerSync>
            }),
            signatures: self.signatures.stores(),
            merge_requests: Arc::new(MergeRequests::new(self.merge_request_branches.clone())),
            housekeeping: Arc::new(state.housekeeping.clone()),
            leases: Arc::new(state.leases.clone()),
        };

        (services, state)
    }
}
