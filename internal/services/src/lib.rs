//! Interfaces to everything a push has effects on, plus a channel backed job
//! queue.
//!
//! Each collaborator is an object safe trait so that the processors can be
//! driven by production services and by the in-memory implementations in
//! `git-push-hooks-state` alike.

use std::sync::Arc;

mod error;
pub use self::error::Error;

mod events;
pub use self::events::{EventSink, TrackingAttributes};

mod hooks;
pub use self::hooks::{HookDispatcher, HookName};

mod housekeeping;
pub use self::housekeeping::{HousekeepingStore, HousekeepingTarget, HousekeepingTask};

mod issue_tracker;
pub use self::issue_tracker::IssueTrackerSync;

mod lease;
pub use self::lease::MutualExclusionLease;

mod merge_requests;
pub use self::merge_requests::MergeRequestIndex;

mod pipeline;
pub use self::pipeline::{
    PipelineEngine, PipelineRequest, PipelineResponse, PipelineVariable, SanitizedPipelineRequest,
};

pub mod queue;
pub use self::queue::{Job, JobQueue, QueuedJob};

mod repository;
pub use self::repository::{FileType, RepositoryCache, RepositoryService};

mod signatures;
pub use self::signatures::{SignatureKind, SignatureStore, SignatureStores};

mod wiki;
pub use self::wiki::{WikiAction, WikiPage, WikiPageMeta, WikiStore};

/// The collaborators a project push is processed against.
#[derive(Clone)]
pub struct Services {
    pub repository: Arc<dyn RepositoryService>,

    /// The repository of the project this one was forked from, if any.
    pub fork_upstream: Option<Arc<dyn RepositoryService>>,

    pub cache: Arc<dyn RepositoryCache>,
    pub events: Arc<dyn EventSink>,
    pub hooks: Arc<dyn HookDispatcher>,
    pub jobs: Arc<dyn JobQueue>,
    pub pipelines: Arc<dyn PipelineEngine>,

    /// `None` when the project has no issue tracker integration.
    pub issue_tracker: Option<Arc<dyn IssueTrackerSync>>,

    pub signatures: SignatureStores,
    pub merge_requests: Arc<dyn MergeRequestIndex>,
    pub housekeeping: Arc<dyn HousekeepingStore>,
    pub leases: Arc<dyn MutualExclusionLease>,
}
